//! The create-instance step.

use super::policies::LifecyclePolicies;
use super::provision::Provisioner;
use super::step::{Step, StepAction};
use super::teardown::{Teardown, TeardownReason, TeardownReport};
use crate::cancellation::CancellationToken;
use crate::errors::ProvisionError;
use crate::observability::lifecycle_span;
use crate::state::StateBag;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

/// An instance created by this step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedInstance {
    /// Provider id.
    pub id: String,
    /// Run that created it.
    pub run_id: Uuid,
}

/// Creates the build instance and removes it again on cleanup.
pub struct CreateInstanceStep {
    policies: LifecyclePolicies,
    rng: Box<dyn RngCore + Send + Sync>,
    created: Option<CreatedInstance>,
    torn_down: bool,
    cleanup_token: Arc<CancellationToken>,
}

impl Default for CreateInstanceStep {
    fn default() -> Self {
        Self::new()
    }
}

impl CreateInstanceStep {
    /// Creates a step with the default wait budgets and an entropy-seeded RNG.
    #[must_use]
    pub fn new() -> Self {
        Self {
            policies: LifecyclePolicies::default(),
            rng: Box::new(StdRng::from_entropy()),
            created: None,
            torn_down: false,
            cleanup_token: Arc::new(CancellationToken::new()),
        }
    }

    /// Overrides the wait budgets.
    #[must_use]
    pub fn with_policies(mut self, policies: LifecyclePolicies) -> Self {
        self.policies = policies;
        self
    }

    /// Uses `rng` for password generation.
    #[must_use]
    pub fn with_rng(mut self, rng: impl RngCore + Send + Sync + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// The wait budgets in use.
    #[must_use]
    pub fn policies(&self) -> &LifecyclePolicies {
        &self.policies
    }

    /// The instance created by [`run`](Step::run), if any.
    #[must_use]
    pub fn created(&self) -> Option<&CreatedInstance> {
        self.created.as_ref()
    }

    /// The id of the created instance, if any.
    #[must_use]
    pub fn instance_id(&self) -> Option<&str> {
        self.created.as_ref().map(|c| c.id.as_str())
    }

    /// The token that aborts a running cleanup.
    ///
    /// Separate from the build's token, which is usually already cancelled
    /// when cleanup starts.
    #[must_use]
    pub fn cleanup_token(&self) -> Arc<CancellationToken> {
        Arc::clone(&self.cleanup_token)
    }
}

impl fmt::Debug for CreateInstanceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateInstanceStep")
            .field("policies", &self.policies)
            .field("created", &self.created)
            .field("torn_down", &self.torn_down)
            .field("cleanup_token", &self.cleanup_token)
            .finish_non_exhaustive()
    }
}

fn halt(state: &StateBag, err: &ProvisionError) -> StepAction {
    let message = err.to_string();
    error!(run_id = %state.run_id(), error = %message, "Step halted");
    state.ui().error(&message);
    state.halt(&message);
    StepAction::Halt
}

#[async_trait]
impl Step for CreateInstanceStep {
    fn name(&self) -> &str {
        "create_instance"
    }

    async fn run(&mut self, state: &StateBag) -> StepAction {
        if let Some(created) = &self.created {
            return halt(state, &ProvisionError::AlreadyCreated(created.id.clone()));
        }

        let mut provisioner = Provisioner::new(state, &self.policies, &mut *self.rng);
        let result = provisioner
            .run()
            .instrument(lifecycle_span(state.run_id(), "provision"))
            .await;
        if let Some(id) = provisioner.into_instance_id() {
            self.created = Some(CreatedInstance { id, run_id: state.run_id() });
        }

        match result {
            Ok(record) => {
                info!(run_id = %state.run_id(), instance_id = %record.id, "Instance ready");
                StepAction::Continue
            }
            Err(err) => halt(state, &err),
        }
    }

    async fn cleanup(&mut self, state: &StateBag) -> Option<TeardownReport> {
        if self.torn_down {
            return None;
        }
        let created = self.created.as_ref()?;
        if created.run_id != state.run_id() {
            warn!(
                instance_id = %created.id,
                created_in = %created.run_id,
                run_id = %state.run_id(),
                "Skipping teardown of an instance from another run"
            );
            return None;
        }

        let reason = if state.is_cancelled() || state.is_halted() {
            TeardownReason::Aborted
        } else {
            TeardownReason::Completed
        };
        let report = Teardown::new(
            state.client(),
            state.ui(),
            &created.id,
            &self.policies,
            &self.cleanup_token,
        )
        .run(reason)
        .instrument(lifecycle_span(state.run_id(), "teardown"))
        .await;
        self.torn_down = true;
        Some(report)
    }
}
