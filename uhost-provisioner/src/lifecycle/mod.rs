//! Instance lifecycle: create, wait until usable, tear down.
//!
//! This module provides:
//! - [`CreateInstanceStep`], the [`Step`] the orchestrator drives
//! - The forward path ([`ProvisionPhase`]) and the reverse path ([`TeardownPhase`])
//! - Per-phase interpretation of describe results ([`WaitPhase`], [`Verdict`])
//! - Create request assembly

mod classify;
mod create_instance;
mod policies;
mod provision;
mod request;
mod step;
mod teardown;
mod wait;

pub use classify::{fatal_reason, Verdict, WaitPhase};
pub use create_instance::{CreateInstanceStep, CreatedInstance};
pub use policies::LifecyclePolicies;
pub use provision::ProvisionPhase;
pub use request::{build_create_request, eip_operator, CHARGE_TYPE, EIP_BANDWIDTH_MBPS, EIP_PAY_MODE, LOGIN_MODE};
pub use step::{Step, StepAction};
pub use teardown::{TeardownOutcome, TeardownPhase, TeardownReason, TeardownReport};
