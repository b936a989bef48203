//! The forward path: create the instance and wait until it is usable.

use super::classify::{fatal_reason, Verdict, WaitPhase};
use super::policies::LifecyclePolicies;
use super::request::build_create_request;
use super::wait::wait_for;
use crate::errors::{ProvisionError, RetryError};
use crate::provider::InstanceRecord;
use crate::state::{StateBag, KEY_INSTANCE};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Phases of the forward path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionPhase {
    /// Issue the create call.
    Create,
    /// Poll until `Running`.
    WaitRunning,
    /// Re-read and publish the record.
    Refresh,
    /// Poll until the boot disk is `Normal`.
    WaitBootDisk,
    /// The instance is usable.
    Done,
}

impl fmt::Display for ProvisionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::WaitRunning => write!(f, "wait_running"),
            Self::Refresh => write!(f, "refresh"),
            Self::WaitBootDisk => write!(f, "wait_boot_disk"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Converts a failed wait into the error that halts the step.
pub(crate) fn wait_error(id: &str, phase: WaitPhase, err: RetryError<Verdict>) -> ProvisionError {
    let id = id.to_string();
    match err {
        RetryError::Cancelled { reason } => ProvisionError::Cancelled { id, reason },
        RetryError::Exhausted { attempts, last } => ProvisionError::WaitExhausted {
            what: phase.target(&id),
            id,
            attempts,
            last: last.to_string(),
        },
        RetryError::Fatal(Verdict::FatalStatus(status)) => ProvisionError::FatalStatus {
            reason: fatal_reason(&status),
            id,
            status,
        },
        RetryError::Fatal(Verdict::ProviderFailure(source)) => ProvisionError::Wait {
            what: phase.target(&id),
            id,
            source,
        },
        RetryError::Fatal(verdict) => ProvisionError::WaitExhausted {
            what: phase.target(&id),
            id,
            attempts: 0,
            last: verdict.to_string(),
        },
    }
}

/// Drives the forward path for one run.
///
/// The instance id is kept even when a later phase fails, so the caller
/// can still clean up.
pub(crate) struct Provisioner<'a, R: ?Sized> {
    state: &'a StateBag,
    policies: &'a LifecyclePolicies,
    rng: &'a mut R,
    instance_id: Option<String>,
    record: Option<InstanceRecord>,
}

impl<'a, R: Rng + ?Sized> Provisioner<'a, R> {
    pub(crate) fn new(state: &'a StateBag, policies: &'a LifecyclePolicies, rng: &'a mut R) -> Self {
        Self {
            state,
            policies,
            rng,
            instance_id: None,
            record: None,
        }
    }

    /// The created instance id, if the create call succeeded.
    pub(crate) fn into_instance_id(self) -> Option<String> {
        self.instance_id
    }

    pub(crate) async fn run(&mut self) -> Result<InstanceRecord, ProvisionError> {
        let mut phase = ProvisionPhase::Create;
        loop {
            let next = self.advance(phase).await?;
            info!(
                run_id = %self.state.run_id(),
                instance_id = self.instance_id.as_deref().unwrap_or_default(),
                from = %phase,
                to = %next,
                "Provision phase complete"
            );
            if next == ProvisionPhase::Done {
                return self.record.take().ok_or_else(|| ProvisionError::State {
                    key: KEY_INSTANCE.to_string(),
                    reason: "no record was read".to_string(),
                });
            }
            phase = next;
        }
    }

    fn id(&self) -> Result<String, ProvisionError> {
        self.instance_id.clone().ok_or_else(|| ProvisionError::State {
            key: "instance_id".to_string(),
            reason: "no instance was created".to_string(),
        })
    }

    async fn advance(&mut self, phase: ProvisionPhase) -> Result<ProvisionPhase, ProvisionError> {
        let state = self.state;
        match phase {
            ProvisionPhase::Create => {
                state.ui().say("Creating Instance...");
                let request = build_create_request(state, &mut *self.rng)?;
                let id = state
                    .client()
                    .create_instance(&request)
                    .await
                    .map_err(ProvisionError::Create)?;
                info!(instance_id = %id, zone = %request.zone, "Instance created");
                self.instance_id = Some(id);
                Ok(ProvisionPhase::WaitRunning)
            }
            ProvisionPhase::WaitRunning => {
                let id = self.id()?;
                wait_for(
                    state.client(),
                    &id,
                    WaitPhase::Running,
                    &self.policies.running,
                    state.cancellation(),
                )
                .await
                .map_err(|e| wait_error(&id, WaitPhase::Running, e))?;
                state.ui().message(&format!("Creating instance {id:?} complete"));
                Ok(ProvisionPhase::Refresh)
            }
            ProvisionPhase::Refresh => {
                let id = self.id()?;
                let record = state
                    .client()
                    .describe_instance(&id)
                    .await
                    .map_err(|source| ProvisionError::Read { id: id.clone(), source })?;
                state.publish_instance(&record).map_err(|e| ProvisionError::State {
                    key: KEY_INSTANCE.to_string(),
                    reason: e.to_string(),
                })?;
                let next = if record.boot_disk_status.is_normal() {
                    ProvisionPhase::Done
                } else {
                    ProvisionPhase::WaitBootDisk
                };
                self.record = Some(record);
                Ok(next)
            }
            ProvisionPhase::WaitBootDisk => {
                let id = self.id()?;
                let disk_type = state.config().boot_disk_type;
                state.ui().say("Waiting for boot disk of instance initialized");
                if disk_type.is_slow_to_initialize() {
                    state.ui().message(&format!(
                        "Warning: It takes around 10 mins for boot disk initialization when `boot_disk_type` is {:?}",
                        disk_type.as_str()
                    ));
                }
                wait_for(
                    state.client(),
                    &id,
                    WaitPhase::BootDisk,
                    &self.policies.boot_disk,
                    state.cancellation(),
                )
                .await
                .map_err(|e| wait_error(&id, WaitPhase::BootDisk, e))?;
                state
                    .ui()
                    .message(&format!("Waiting for boot disk of instance {id:?} initialized complete"));
                Ok(ProvisionPhase::Done)
            }
            ProvisionPhase::Done => Ok(ProvisionPhase::Done),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::config::BootDiskType;
    use crate::errors::ProviderError;
    use crate::provider::{BootDiskStatus, InstanceStatus};
    use crate::testing::{linux_image, state_with, test_config, test_state, ScriptedProvider};
    use crate::ui::UiLevel;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;
    use std::time::Duration;

    fn running() -> Result<InstanceRecord, ProviderError> {
        Ok(InstanceRecord::new("uhost-1", InstanceStatus::Running))
    }

    fn initializing_disk() -> Result<InstanceRecord, ProviderError> {
        Ok(InstanceRecord::new("uhost-1", InstanceStatus::Running)
            .with_boot_disk_status(BootDiskStatus::Initializing))
    }

    async fn provision(state: &StateBag) -> (Result<InstanceRecord, ProvisionError>, Option<String>) {
        let policies = LifecyclePolicies::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut provisioner = Provisioner::new(state, &policies, &mut rng);
        let result = provisioner.run().await;
        (result, provisioner.into_instance_id())
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_a_few_polls() {
        let provider = Arc::new(ScriptedProvider::new().with_describes([
            Ok(InstanceRecord::new("uhost-1", InstanceStatus::Initializing)),
            Ok(InstanceRecord::new("uhost-1", InstanceStatus::Starting)),
            running(),
        ]));
        let (state, ui) = test_state(provider.clone());

        let (result, id) = provision(&state).await;

        assert_eq!(result.unwrap().status, InstanceStatus::Running);
        assert_eq!(id.as_deref(), Some("uhost-1"));
        // Three polls plus the refresh.
        assert_eq!(provider.describe_count(), 4);
        assert_eq!(state.instance().unwrap().id, "uhost-1");
        assert!(ui.contains(r#"Creating instance "uhost-1" complete"#));
        assert!(!ui.contains("boot disk"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_status_stops_after_one_poll() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_describes([Ok(InstanceRecord::new("uhost-1", InstanceStatus::InstallFail))]),
        );
        let (state, _) = test_state(provider.clone());

        let (result, id) = provision(&state).await;

        let err = result.unwrap_err();
        assert!(matches!(err, ProvisionError::FatalStatus { reason: "install failed", .. }));
        assert_eq!(provider.describe_count(), 1);
        assert_eq!(id.as_deref(), Some("uhost-1"));
        assert!(state.instance().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_boot_disk_wait_on_local_disk() {
        let provider = Arc::new(ScriptedProvider::new().with_describes([
            running(),
            initializing_disk(),
            initializing_disk(),
            running(),
        ]));
        let config = test_config().with_boot_disk_type(BootDiskType::LocalNormal);
        let (state, ui) = state_with(provider.clone(), config, linux_image());

        let (result, _) = provision(&state).await;

        assert!(result.is_ok());
        assert_eq!(provider.describe_count(), 4);
        assert!(ui.contains("Waiting for boot disk of instance initialized"));
        assert!(ui.contains(r#"`boot_disk_type` is "local_normal""#));
        assert!(ui.contains(r#"Waiting for boot disk of instance "uhost-1" initialized complete"#));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cloud_disk_has_no_slow_disk_warning() {
        let provider = Arc::new(ScriptedProvider::new().with_describes([
            running(),
            initializing_disk(),
            running(),
        ]));
        let (state, ui) = test_state(provider.clone());

        let (result, _) = provision(&state).await;

        assert!(result.is_ok());
        assert!(!ui.contains("10 mins"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_failure_records_nothing() {
        let provider = Arc::new(
            ScriptedProvider::new().with_create(Err(ProviderError::Api { code: 230, message: "quota".into() })),
        );
        let (state, ui) = test_state(provider.clone());

        let (result, id) = provision(&state).await;

        assert!(matches!(result, Err(ProvisionError::Create(_))));
        assert_eq!(id, None);
        assert_eq!(provider.describe_count(), 0);
        assert_eq!(ui.lines_at(UiLevel::Say), vec!["Creating Instance...".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_running_exhausts_budget() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_describes([Ok(InstanceRecord::new("uhost-1", InstanceStatus::Starting))]),
        );
        let (state, _) = test_state(provider.clone());

        let (result, id) = provision(&state).await;

        match result.unwrap_err() {
            ProvisionError::WaitExhausted { attempts, what, .. } => {
                assert_eq!(attempts, 20);
                assert_eq!(what, r#"instance "uhost-1" to become available"#);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(provider.describe_count(), 20);
        assert_eq!(id.as_deref(), Some("uhost-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_boot_disk_wait_exhausts_budget() {
        let provider = Arc::new(ScriptedProvider::new().with_describes([running(), initializing_disk()]));
        let (state, _) = test_state(provider.clone());

        let (result, id) = provision(&state).await;

        match result.unwrap_err() {
            ProvisionError::WaitExhausted { attempts, what, .. } => {
                assert_eq!(attempts, 200);
                assert_eq!(what, r#"boot disk of instance "uhost-1" initialized"#);
            }
            other => panic!("unexpected error {other:?}"),
        }
        // One poll for Running, the refresh, then the full boot disk budget.
        assert_eq!(provider.describe_count(), 202);
        assert_eq!(id.as_deref(), Some("uhost-1"));
        let published = state.instance().unwrap();
        assert_eq!(published.boot_disk_status, BootDiskStatus::Initializing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_failure_is_a_read_error() {
        let provider = Arc::new(ScriptedProvider::new().with_describes([
            running(),
            Err(ProviderError::Transport("reset".into())),
        ]));
        let (state, _) = test_state(provider.clone());

        let (result, _) = provision(&state).await;

        assert!(matches!(result, Err(ProvisionError::Read { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_mid_wait() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_describes([Ok(InstanceRecord::new("uhost-1", InstanceStatus::Starting))]),
        );
        let token = Arc::new(CancellationToken::new());
        let (state, _) = test_state(provider.clone());
        let state = state.with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            token.cancel("interrupted");
        });
        let started = tokio::time::Instant::now();
        let (result, _) = provision(&state).await;
        canceller.await.unwrap();

        let err = result.unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(provider.describe_count() <= 2);
    }

    #[test]
    fn test_wait_error_mapping() {
        let err = wait_error(
            "uhost-1",
            WaitPhase::Running,
            RetryError::Fatal(Verdict::ProviderFailure(ProviderError::Transport("reset".into()))),
        );
        assert_eq!(
            err.to_string(),
            r#"Error on waiting for instance "uhost-1" to become available: transport error: reset"#
        );

        let err = wait_error("uhost-1", WaitPhase::BootDisk, RetryError::Cancelled { reason: "ctrl-c".into() });
        assert!(err.is_cancelled());
    }
}
