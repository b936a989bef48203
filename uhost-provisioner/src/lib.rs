//! # UHost Provisioner
//!
//! The instance lifecycle step of a machine image builder for UCloud UHost.
//!
//! The step creates one build instance and waits until it is usable, then
//! removes it again when the build unwinds:
//!
//! - **Forward path**: create, wait for `Running`, refresh and publish the
//!   record, wait for the boot disk to initialise
//! - **Reverse path**: inspect, stop, wait for `Stopped`, terminate with
//!   disks and EIP, wait until the instance is gone
//! - **Bounded polling**: capped exponential backoff, cancellable mid-wait
//! - **Best-effort cleanup**: teardown reports problems, it never fails
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use uhost_provisioner::prelude::*;
//!
//! let state = StateBag::new(client, Arc::new(LoggingUi::new()), config, image);
//! let mut step = CreateInstanceStep::new();
//!
//! if step.run(&state).await == StepAction::Continue {
//!     // ... provision and capture the image
//! }
//! let report = step.cleanup(&state).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod observability;
pub mod password;
pub mod provider;
pub mod retry;
pub mod state;
pub mod testing;
pub mod ui;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{BootDiskType, CommConfig, Config, InstanceType};
    pub use crate::errors::{ConfigError, ProviderError, ProvisionError, RetryError};
    pub use crate::lifecycle::{
        CreateInstanceStep, LifecyclePolicies, ProvisionPhase, Step, StepAction,
        TeardownOutcome, TeardownPhase, TeardownReason, TeardownReport, WaitPhase,
    };
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::provider::{
        BootDiskStatus, CreateInstanceRequest, InstanceRecord, InstanceStatus, OsType,
        ProviderClient, SourceImage,
    };
    pub use crate::retry::{with_retry, RetryPolicy};
    pub use crate::state::StateBag;
    pub use crate::ui::{LoggingUi, NoOpUi, Ui};
}
