//! Retry policies with capped exponential backoff.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a polling loop.
///
/// The delay slept after the n-th failed attempt (1-indexed) is
/// `min(initial_delay * multiplier^(n-1), max_delay)`. There is no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first one.
    pub max_attempts: usize,
    /// Delay after the first failed attempt, in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay cap, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor applied per attempt.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            initial_delay_ms: 2_000,
            max_delay_ms: 6_000,
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Creates the default policy (the instance-running wait).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waiting for a freshly created instance to report `Running`.
    #[must_use]
    pub fn wait_running() -> Self {
        Self::default()
    }

    /// Waiting for the boot disk to finish initialising.
    ///
    /// Local disks take around ten minutes.
    #[must_use]
    pub fn wait_boot_disk() -> Self {
        Self {
            max_attempts: 200,
            initial_delay_ms: 2_000,
            max_delay_ms: 12_000,
            multiplier: 2,
        }
    }

    /// Waiting for a stopped instance during teardown.
    #[must_use]
    pub fn wait_stopped() -> Self {
        Self {
            max_attempts: 30,
            ..Self::default()
        }
    }

    /// Waiting for a terminated instance to disappear.
    #[must_use]
    pub fn wait_deleted() -> Self {
        Self::wait_stopped()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay_ms(mut self, delay: u64) -> Self {
        self.initial_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the multiplier.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Attempt budget, never below one.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.max_attempts.max(1)
    }

    /// Returns the delay to sleep after failed attempt `attempt` (1-indexed).
    #[must_use]
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let factor = u64::from(self.multiplier).saturating_pow(exponent);
        let delay = self.initial_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// State tracking for a single polling loop.
#[derive(Debug, Default)]
pub struct RetryState {
    /// Attempts made so far.
    pub attempt: usize,
}

impl RetryState {
    /// Starts before the first attempt.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the start of another attempt.
    pub fn begin_attempt(&mut self) {
        self.attempt += 1;
    }

    /// Returns true if no attempts remain.
    #[must_use]
    pub fn is_exhausted(&self, policy: &RetryPolicy) -> bool {
        self.attempt >= policy.attempts()
    }
}

/// What the polling loop does after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the delay, then poll again.
    Retry(Duration),
    /// The attempt budget is spent.
    GiveUp,
    /// The failure is final; polling again will not help.
    NotRetryable,
}

/// Decides what to do after a failed attempt.
#[must_use]
pub fn should_retry(state: &RetryState, policy: &RetryPolicy, retryable: bool) -> RetryDecision {
    if !retryable {
        return RetryDecision::NotRetryable;
    }
    if state.is_exhausted(policy) {
        return RetryDecision::GiveUp;
    }
    RetryDecision::Retry(policy.delay_for(state.attempt))
}
