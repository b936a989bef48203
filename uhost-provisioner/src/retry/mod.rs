//! Bounded polling with capped exponential backoff.
//!
//! This module provides:
//! - [`RetryPolicy`] with the documented per-phase budgets
//! - [`with_retry`], a cancellable polling loop

mod policy;
mod runner;

pub use policy::{should_retry, RetryDecision, RetryPolicy, RetryState};
pub use runner::with_retry;
