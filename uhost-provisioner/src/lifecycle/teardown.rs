//! Best-effort removal of the build instance.
//!
//! Teardown walks [`TeardownPhase`] from `Inspect` to `Done`. Every failure
//! is reported to the UI and ends the walk with
//! [`TeardownOutcome::Abandoned`]; nothing is ever returned as an error.

use super::classify::WaitPhase;
use super::policies::LifecyclePolicies;
use super::wait::wait_for;
use crate::cancellation::CancellationToken;
use crate::provider::{InstanceStatus, ProviderClient};
use crate::ui::Ui;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Phases of the teardown walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownPhase {
    /// Describe the instance.
    Inspect,
    /// Request a stop.
    Stop,
    /// Poll until `Stopped`.
    WaitStopped,
    /// Terminate, releasing disks and EIP.
    Terminate,
    /// Poll until the instance is gone.
    WaitDeleted,
    /// The instance is gone.
    Done,
}

impl fmt::Display for TeardownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inspect => write!(f, "inspect"),
            Self::Stop => write!(f, "stop"),
            Self::WaitStopped => write!(f, "wait_stopped"),
            Self::Terminate => write!(f, "terminate"),
            Self::WaitDeleted => write!(f, "wait_deleted"),
            Self::Done => write!(f, "done"),
        }
    }
}

impl TeardownPhase {
    fn failure_message(self, id: &str, error: &str) -> String {
        match self {
            Self::Inspect => format!("Error on reading instance when deleting {id:?}, {error}"),
            Self::Stop => format!("Error on stopping instance when deleting {id:?}, {error}"),
            Self::WaitStopped => {
                format!("Error on waiting for stopping instance when deleting {id:?}, {error}")
            }
            Self::Terminate => format!("Error on deleting instance {id:?}, {error}"),
            Self::WaitDeleted | Self::Done => {
                format!("Error on waiting for instance {id:?} to be deleted: {error}")
            }
        }
    }
}

/// Why teardown is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownReason {
    /// The build was cancelled or a step halted it.
    Aborted,
    /// The build finished normally.
    Completed,
}

impl TeardownReason {
    /// The UI headline for this reason.
    #[must_use]
    pub fn headline(self) -> &'static str {
        match self {
            Self::Aborted => "Deleting instance because of cancellation or error...",
            Self::Completed => "Deleting instance...",
        }
    }
}

/// How teardown ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TeardownOutcome {
    /// The instance was already gone when inspected.
    AlreadyGone,
    /// The instance was terminated and has disappeared.
    Deleted,
    /// Teardown gave up; the instance may still exist.
    Abandoned {
        /// Phase that failed.
        phase: TeardownPhase,
        /// What went wrong.
        error: String,
    },
}

impl TeardownOutcome {
    /// Returns true if the instance is known to be gone.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::AlreadyGone | Self::Deleted)
    }
}

/// Summary of one teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownReport {
    /// Instance that was torn down.
    pub instance_id: String,
    /// Why teardown ran.
    pub reason: TeardownReason,
    /// How it ended.
    pub outcome: TeardownOutcome,
    /// Phases entered, in order.
    pub phases: Vec<TeardownPhase>,
    /// When teardown finished.
    pub finished_at: DateTime<Utc>,
}

impl TeardownReport {
    /// The last phase entered.
    #[must_use]
    pub fn final_phase(&self) -> Option<TeardownPhase> {
        self.phases.last().copied()
    }
}

/// Drives the teardown walk for one instance.
pub(crate) struct Teardown<'a> {
    client: &'a dyn ProviderClient,
    ui: &'a dyn Ui,
    id: &'a str,
    policies: &'a LifecyclePolicies,
    token: &'a CancellationToken,
    phases: Vec<TeardownPhase>,
}

impl<'a> Teardown<'a> {
    pub(crate) fn new(
        client: &'a dyn ProviderClient,
        ui: &'a dyn Ui,
        id: &'a str,
        policies: &'a LifecyclePolicies,
        token: &'a CancellationToken,
    ) -> Self {
        Self {
            client,
            ui,
            id,
            policies,
            token,
            phases: Vec::new(),
        }
    }

    pub(crate) async fn run(mut self, reason: TeardownReason) -> TeardownReport {
        self.ui.say(reason.headline());
        info!(instance_id = self.id, ?reason, "Tearing down instance");

        let mut phase = TeardownPhase::Inspect;
        let outcome = loop {
            self.phases.push(phase);
            match self.step(phase).await {
                Ok(Some(next)) => phase = next,
                Ok(None) => break TeardownOutcome::AlreadyGone,
                Err(error) => break self.abandon(phase, error),
            }
            if phase == TeardownPhase::Done {
                self.phases.push(phase);
                self.ui.message(&format!("Deleting instance {:?} complete", self.id));
                info!(instance_id = self.id, "Instance deleted");
                break TeardownOutcome::Deleted;
            }
        };

        TeardownReport {
            instance_id: self.id.to_string(),
            reason,
            outcome,
            phases: self.phases,
            finished_at: Utc::now(),
        }
    }

    /// Performs one phase and returns the next, or `None` if the instance
    /// was already gone.
    async fn step(&self, phase: TeardownPhase) -> Result<Option<TeardownPhase>, String> {
        let id = self.id;
        let next = match phase {
            TeardownPhase::Inspect => match self.client.describe_instance(id).await {
                Ok(record) if record.status == InstanceStatus::Stopped => TeardownPhase::Terminate,
                Ok(_) => TeardownPhase::Stop,
                Err(err) if err.is_not_found() => {
                    info!(instance_id = id, "Instance already gone");
                    return Ok(None);
                }
                Err(err) => return Err(err.to_string()),
            },
            TeardownPhase::Stop => {
                self.client.stop_instance(id).await.map_err(|e| e.to_string())?;
                TeardownPhase::WaitStopped
            }
            TeardownPhase::WaitStopped => {
                self.wait(WaitPhase::Stopped).await?;
                TeardownPhase::Terminate
            }
            TeardownPhase::Terminate => {
                self.client
                    .terminate_instance(id, true, true)
                    .await
                    .map_err(|e| e.to_string())?;
                TeardownPhase::WaitDeleted
            }
            TeardownPhase::WaitDeleted => {
                self.wait(WaitPhase::Deleted).await?;
                TeardownPhase::Done
            }
            TeardownPhase::Done => TeardownPhase::Done,
        };
        info!(instance_id = id, from = %phase, to = %next, "Teardown phase complete");
        Ok(Some(next))
    }

    async fn wait(&self, phase: WaitPhase) -> Result<(), String> {
        wait_for(self.client, self.id, phase, self.policies.for_phase(phase), self.token)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    fn abandon(&self, phase: TeardownPhase, error: String) -> TeardownOutcome {
        let message = phase.failure_message(self.id, &error);
        warn!(instance_id = self.id, %phase, error = %error, "Teardown abandoned");
        self.ui.error(&message);
        TeardownOutcome::Abandoned { phase, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use crate::provider::InstanceRecord;
    use crate::testing::{ProviderCall, ScriptedProvider};
    use crate::ui::{CollectingUi, UiLevel};
    use pretty_assertions::assert_eq;

    fn record(status: InstanceStatus) -> Result<InstanceRecord, ProviderError> {
        Ok(InstanceRecord::new("uhost-1", status))
    }

    fn gone() -> Result<InstanceRecord, ProviderError> {
        Err(ProviderError::instance_not_found("uhost-1"))
    }

    async fn tear_down(provider: &ScriptedProvider, ui: &CollectingUi, reason: TeardownReason) -> TeardownReport {
        let policies = LifecyclePolicies::default();
        let token = CancellationToken::new();
        Teardown::new(provider, ui, "uhost-1", &policies, &token).run(reason).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_instance_is_stopped_then_terminated() {
        let provider = ScriptedProvider::new().with_describes([
            record(InstanceStatus::Running),
            record(InstanceStatus::Stopping),
            record(InstanceStatus::Stopped),
            record(InstanceStatus::Stopped),
            gone(),
        ]);
        let ui = CollectingUi::new();

        let report = tear_down(&provider, &ui, TeardownReason::Completed).await;

        assert_eq!(report.outcome, TeardownOutcome::Deleted);
        assert_eq!(
            report.phases,
            vec![
                TeardownPhase::Inspect,
                TeardownPhase::Stop,
                TeardownPhase::WaitStopped,
                TeardownPhase::Terminate,
                TeardownPhase::WaitDeleted,
                TeardownPhase::Done,
            ]
        );
        assert_eq!(
            provider.call_kinds(),
            vec!["describe", "stop", "describe", "describe", "terminate", "describe", "describe"]
        );
        assert!(provider.calls().contains(&ProviderCall::Terminate {
            id: "uhost-1".into(),
            release_udisk: true,
            release_eip: true,
        }));
        assert_eq!(ui.lines_at(UiLevel::Say), vec!["Deleting instance...".to_string()]);
        assert!(ui.contains(r#"Deleting instance "uhost-1" complete"#));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_instance_skips_stop() {
        let provider = ScriptedProvider::new().with_describes([record(InstanceStatus::Stopped), gone()]);
        let ui = CollectingUi::new();

        let report = tear_down(&provider, &ui, TeardownReason::Aborted).await;

        assert!(report.outcome.is_clean());
        assert_eq!(provider.stop_count(), 0);
        assert_eq!(provider.terminate_count(), 1);
        assert!(ui.contains("Deleting instance because of cancellation or error..."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_instance_is_already_gone() {
        let provider = ScriptedProvider::new();
        let ui = CollectingUi::new();

        let report = tear_down(&provider, &ui, TeardownReason::Completed).await;

        assert_eq!(report.outcome, TeardownOutcome::AlreadyGone);
        assert_eq!(report.final_phase(), Some(TeardownPhase::Inspect));
        assert_eq!(provider.call_kinds(), vec!["describe"]);
        assert!(ui.lines_at(UiLevel::Error).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inspect_error_abandons_without_retry() {
        let provider =
            ScriptedProvider::new().with_describes([Err(ProviderError::Transport("timeout".into()))]);
        let ui = CollectingUi::new();

        let report = tear_down(&provider, &ui, TeardownReason::Completed).await;

        assert!(matches!(
            report.outcome,
            TeardownOutcome::Abandoned { phase: TeardownPhase::Inspect, .. }
        ));
        assert_eq!(provider.describe_count(), 1);
        assert!(ui.contains(r#"Error on reading instance when deleting "uhost-1""#));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_failure_abandons() {
        let provider = ScriptedProvider::new()
            .with_describes([record(InstanceStatus::Running)])
            .with_stop(Err(ProviderError::Api { code: 8010, message: "busy".into() }));
        let ui = CollectingUi::new();

        let report = tear_down(&provider, &ui, TeardownReason::Completed).await;

        assert!(matches!(report.outcome, TeardownOutcome::Abandoned { phase: TeardownPhase::Stop, .. }));
        assert_eq!(provider.terminate_count(), 0);
        assert!(ui.contains("Error on stopping instance"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_stopping_exhausts_wait() {
        let provider = ScriptedProvider::new().with_describes([record(InstanceStatus::Stopping)]);
        let ui = CollectingUi::new();

        let report = tear_down(&provider, &ui, TeardownReason::Completed).await;

        assert!(matches!(
            report.outcome,
            TeardownOutcome::Abandoned { phase: TeardownPhase::WaitStopped, .. }
        ));
        // One inspect plus the full stop budget.
        assert_eq!(provider.describe_count(), 31);
        assert_eq!(provider.terminate_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminate_failure_abandons() {
        let provider = ScriptedProvider::new()
            .with_describes([record(InstanceStatus::Stopped)])
            .with_terminate(Err(ProviderError::Transport("reset".into())));
        let ui = CollectingUi::new();

        let report = tear_down(&provider, &ui, TeardownReason::Completed).await;

        assert!(matches!(
            report.outcome,
            TeardownOutcome::Abandoned { phase: TeardownPhase::Terminate, .. }
        ));
        assert!(ui.contains(r#"Error on deleting instance "uhost-1""#));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_wait_retries_through_errors() {
        let provider = ScriptedProvider::new().with_describes([
            record(InstanceStatus::Stopped),
            Err(ProviderError::Transport("timeout".into())),
            record(InstanceStatus::Stopped),
            gone(),
        ]);
        let ui = CollectingUi::new();

        let report = tear_down(&provider, &ui, TeardownReason::Completed).await;

        assert_eq!(report.outcome, TeardownOutcome::Deleted);
        assert_eq!(provider.describe_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_wait_exhausts_budget() {
        let provider = ScriptedProvider::new().with_describes([record(InstanceStatus::Stopped)]);
        let ui = CollectingUi::new();

        let report = tear_down(&provider, &ui, TeardownReason::Completed).await;

        match &report.outcome {
            TeardownOutcome::Abandoned { phase, error } => {
                assert_eq!(*phase, TeardownPhase::WaitDeleted);
                assert!(error.contains("30 attempts"), "{error}");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        // One inspect plus the full delete budget.
        assert_eq!(provider.describe_count(), 31);
        assert_eq!(provider.terminate_count(), 1);
        let errors = ui.lines_at(UiLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains(r#"Error on waiting for instance "uhost-1" to be deleted"#));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_teardown_is_abandoned() {
        let provider = ScriptedProvider::new().with_describes([record(InstanceStatus::Stopping)]);
        let ui = CollectingUi::new();
        let policies = LifecyclePolicies::default();
        let token = CancellationToken::new();
        token.cancel("shutdown");

        let report = Teardown::new(&provider, &ui, "uhost-1", &policies, &token)
            .run(TeardownReason::Aborted)
            .await;

        match report.outcome {
            TeardownOutcome::Abandoned { phase, error } => {
                assert_eq!(phase, TeardownPhase::WaitStopped);
                assert!(error.contains("shutdown"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_report_serializes_outcome_kind() {
        let report = TeardownReport {
            instance_id: "uhost-1".into(),
            reason: TeardownReason::Completed,
            outcome: TeardownOutcome::AlreadyGone,
            phases: vec![TeardownPhase::Inspect],
            finished_at: Utc::now(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"]["kind"], "already_gone");
        assert_eq!(json["phases"][0], "inspect");
    }
}
