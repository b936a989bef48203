//! Step trait and step actions.

use super::teardown::TeardownReport;
use crate::state::StateBag;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the orchestrator should do after a step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Proceed to the next step.
    Continue,
    /// Stop the build; the reason is in the state bag under `error`.
    Halt,
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::Halt => write!(f, "halt"),
        }
    }
}

/// A unit of a build with a forward action and a compensating cleanup.
///
/// The orchestrator calls [`run`](Step::run) once and, whatever the
/// outcome, [`cleanup`](Step::cleanup) when the build unwinds.
#[async_trait]
pub trait Step: Send + Sync + fmt::Debug {
    /// Returns the name of the step.
    fn name(&self) -> &str;

    /// Executes the step.
    async fn run(&mut self, state: &StateBag) -> StepAction;

    /// Undoes whatever [`run`](Step::run) created.
    ///
    /// Returns `None` when there was nothing to undo. Never fails.
    async fn cleanup(&mut self, state: &StateBag) -> Option<TeardownReport>;
}
