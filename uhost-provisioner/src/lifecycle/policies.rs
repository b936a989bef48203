//! Polling budgets for every wait phase.

use super::classify::WaitPhase;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};

/// The retry policy used by each wait phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecyclePolicies {
    /// Waiting for `Running` after create.
    pub running: RetryPolicy,
    /// Waiting for the boot disk to become `Normal`.
    pub boot_disk: RetryPolicy,
    /// Waiting for `Stopped` during teardown.
    pub stopped: RetryPolicy,
    /// Waiting for the instance to disappear during teardown.
    pub deleted: RetryPolicy,
}

impl Default for LifecyclePolicies {
    fn default() -> Self {
        Self {
            running: RetryPolicy::wait_running(),
            boot_disk: RetryPolicy::wait_boot_disk(),
            stopped: RetryPolicy::wait_stopped(),
            deleted: RetryPolicy::wait_deleted(),
        }
    }
}

impl LifecyclePolicies {
    /// Returns the policy for `phase`.
    #[must_use]
    pub fn for_phase(&self, phase: WaitPhase) -> &RetryPolicy {
        match phase {
            WaitPhase::Running => &self.running,
            WaitPhase::BootDisk => &self.boot_disk,
            WaitPhase::Stopped => &self.stopped,
            WaitPhase::Deleted => &self.deleted,
        }
    }

    /// Replaces the policy for `phase`.
    #[must_use]
    pub fn with_policy(mut self, phase: WaitPhase, policy: RetryPolicy) -> Self {
        match phase {
            WaitPhase::Running => self.running = policy,
            WaitPhase::BootDisk => self.boot_disk = policy,
            WaitPhase::Stopped => self.stopped = policy,
            WaitPhase::Deleted => self.deleted = policy,
        }
        self
    }
}
