//! Per-phase interpretation of provider observations.

use crate::errors::ProviderError;
use crate::provider::{InstanceRecord, InstanceStatus};
use std::fmt;

/// The wait phases of the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitPhase {
    /// A new instance should reach `Running`.
    Running,
    /// The boot disk should reach `Normal`.
    BootDisk,
    /// A stopping instance should reach `Stopped`.
    Stopped,
    /// A terminated instance should disappear.
    Deleted,
}

/// How a single observation is judged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The phase's target was reached.
    Ready,
    /// Expected intermediate state; poll again.
    NotYet(String),
    /// The instance reached a status it will not leave.
    FatalStatus(InstanceStatus),
    /// The provider call failed in a way polling will not fix.
    ProviderFailure(ProviderError),
}

impl Verdict {
    /// Returns true if another attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotYet(_))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("ready"),
            Self::NotYet(detail) => f.write_str(detail),
            Self::FatalStatus(status) => write!(f, "{} ({status})", fatal_reason(status)),
            Self::ProviderFailure(err) => write!(f, "{err}"),
        }
    }
}

/// Explains a fatal status.
#[must_use]
pub fn fatal_reason(status: &InstanceStatus) -> &'static str {
    match status {
        InstanceStatus::ResizeFail => "resizing instance failed",
        InstanceStatus::InstallFail => "install failed",
        _ => "instance failed",
    }
}

impl WaitPhase {
    /// Describes what is being waited on for instance `id`, for messages.
    #[must_use]
    pub fn target(&self, id: &str) -> String {
        match self {
            Self::Running => format!("instance {id:?} to become available"),
            Self::BootDisk => format!("boot disk of instance {id:?} initialized"),
            Self::Stopped => format!("stopping instance when deleting {id:?}"),
            Self::Deleted => format!("instance {id:?} to be deleted"),
        }
    }

    /// Judges one describe result for this phase.
    #[must_use]
    pub fn classify(&self, observation: &Result<InstanceRecord, ProviderError>) -> Verdict {
        match (self, observation) {
            (Self::Running, Ok(record)) if record.status.is_fatal() => {
                Verdict::FatalStatus(record.status.clone())
            }
            (Self::Running, Ok(record)) if record.status == InstanceStatus::Running => Verdict::Ready,
            (Self::Running, Ok(record)) => {
                Verdict::NotYet(format!("instance {:?} is {}", record.id, record.status))
            }
            (Self::Running, Err(err)) if err.is_not_found() => {
                Verdict::NotYet("instance is not visible yet".to_string())
            }

            (Self::BootDisk, Ok(record)) if record.boot_disk_status.is_normal() => Verdict::Ready,
            (Self::BootDisk, Ok(record)) => Verdict::NotYet(format!(
                "boot disk of instance {:?} is {}",
                record.id, record.boot_disk_status
            )),

            (Self::Stopped, Ok(record)) if record.status == InstanceStatus::Stopped => Verdict::Ready,
            (Self::Stopped, Ok(record)) => {
                Verdict::NotYet(format!("instance {:?} is {}", record.id, record.status))
            }

            // Absence is the goal here; anything else means keep polling.
            (Self::Deleted, Err(err)) if err.is_not_found() => Verdict::Ready,
            (Self::Deleted, Ok(record)) => Verdict::NotYet(format!(
                "instance {:?} still exists ({})",
                record.id, record.status
            )),
            (Self::Deleted, Err(err)) => Verdict::NotYet(err.to_string()),

            (_, Err(err)) => Verdict::ProviderFailure(err.clone()),
        }
    }
}
