//! Shared execution state for one build run.
//!
//! The orchestrator creates one [`StateBag`] per run and hands it to every
//! step. Well-known collaborators are typed fields; everything steps publish
//! for each other goes through the [`ContextBag`].

mod bag;

pub use bag::ContextBag;

use crate::cancellation::CancellationToken;
use crate::config::Config;
use crate::provider::{InstanceRecord, ProviderClient, SourceImage};
use crate::ui::Ui;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Key of the published instance record.
pub const KEY_INSTANCE: &str = "instance";
/// Key of the error that halted the build.
pub const KEY_ERROR: &str = "error";
/// Key of the security group bound by an earlier step.
pub const KEY_SECURITY_GROUP_ID: &str = "security_group_id";
/// Key of the VPC bound by an earlier step.
pub const KEY_VPC_ID: &str = "vpc_id";
/// Key of the subnet bound by an earlier step.
pub const KEY_SUBNET_ID: &str = "subnet_id";

/// State shared by the steps of one build run.
pub struct StateBag {
    run_id: Uuid,
    client: Arc<dyn ProviderClient>,
    ui: Arc<dyn Ui>,
    config: RwLock<Config>,
    source_image: SourceImage,
    cancellation: Arc<CancellationToken>,
    halted: AtomicBool,
    /// Values published by steps.
    pub data: ContextBag,
}

impl StateBag {
    /// Creates the state for a new run.
    #[must_use]
    pub fn new(
        client: Arc<dyn ProviderClient>,
        ui: Arc<dyn Ui>,
        config: Config,
        source_image: SourceImage,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            client,
            ui,
            config: RwLock::new(config),
            source_image,
            cancellation: Arc::new(CancellationToken::new()),
            halted: AtomicBool::new(false),
            data: ContextBag::new(),
        }
    }

    /// Uses an orchestrator-owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// Overrides the run id.
    #[must_use]
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    /// Sets a string binding such as [`KEY_VPC_ID`].
    #[must_use]
    pub fn with_binding(self, key: &str, value: impl Into<String>) -> Self {
        self.data.put(key, serde_json::Value::String(value.into()));
        self
    }

    /// Identifies this run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The provider client.
    #[must_use]
    pub fn client(&self) -> &dyn ProviderClient {
        self.client.as_ref()
    }

    /// The UI sink.
    #[must_use]
    pub fn ui(&self) -> &dyn Ui {
        self.ui.as_ref()
    }

    /// A snapshot of the run configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    /// Mutates the run configuration in place.
    pub fn update_config(&self, update: impl FnOnce(&mut Config)) {
        update(&mut self.config.write());
    }

    /// The image being built from.
    #[must_use]
    pub fn source_image(&self) -> &SourceImage {
        &self.source_image
    }

    /// The run's cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancellation
    }

    /// Returns true if the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns true if a step halted the run.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Records the error that halts the run.
    pub fn halt(&self, error: &str) {
        self.data.put(KEY_ERROR, serde_json::Value::String(error.to_string()));
        self.halted.store(true, Ordering::SeqCst);
    }

    /// The halting error, if any.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.data.get_str(KEY_ERROR)
    }

    /// Publishes the instance record for later steps.
    pub fn publish_instance(&self, record: &InstanceRecord) -> Result<(), serde_json::Error> {
        self.data.put_as(KEY_INSTANCE, record)
    }

    /// The published instance record, if any.
    #[must_use]
    pub fn instance(&self) -> Option<InstanceRecord> {
        self.data.get_as(KEY_INSTANCE).and_then(Result::ok)
    }
}

impl std::fmt::Debug for StateBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateBag")
            .field("run_id", &self.run_id)
            .field("source_image", &self.source_image)
            .field("cancelled", &self.is_cancelled())
            .field("halted", &self.is_halted())
            .field("keys", &self.data.keys())
            .finish_non_exhaustive()
    }
}
