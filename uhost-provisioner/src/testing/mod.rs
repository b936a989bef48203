//! Testing utilities for the lifecycle step.
//!
//! This module provides:
//! - A scripted in-memory provider
//! - State bag fixtures

mod fixtures;
mod mocks;

pub use fixtures::{linux_image, state_with, test_config, test_state};
pub use mocks::{ProviderCall, ScriptedProvider};
