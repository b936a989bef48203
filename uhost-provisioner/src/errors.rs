//! Error types for the provisioning step.
//!
//! Forward-path failures surface as [`ProvisionError`] and halt the build.
//! Teardown failures never become errors: they are recorded in a
//! [`TeardownReport`](crate::lifecycle::TeardownReport) instead.

use crate::provider::InstanceStatus;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a [`ProviderClient`](crate::provider::ProviderClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The requested resource does not exist (or no longer exists).
    #[error("the {resource} {id:?} is not found")]
    NotFound {
        /// Kind of resource, e.g. "instance".
        resource: String,
        /// Provider id that was looked up.
        id: String,
    },

    /// The provider API answered with a non-zero return code.
    #[error("api error {code}: {message}")]
    Api {
        /// Provider return code.
        code: i64,
        /// Provider message.
        message: String,
    },

    /// The request never got a usable answer.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ProviderError {
    /// Creates a not-found error for an instance id.
    #[must_use]
    pub fn instance_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: "instance".to_string(),
            id: id.into(),
        }
    }

    /// Returns true if the error means the resource is absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Outcome of a polling loop that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError<E> {
    /// The operation failed with an error classified as non-retryable.
    #[error("{0}")]
    Fatal(E),

    /// Every attempt failed with a retryable error.
    #[error("retry budget exhausted after {attempts} attempts: {last}")]
    Exhausted {
        /// Number of attempts made.
        attempts: usize,
        /// The error of the final attempt.
        last: E,
    },

    /// The wait was cancelled from outside.
    #[error("cancelled: {reason}")]
    Cancelled {
        /// Cancellation reason reported by the token.
        reason: String,
    },
}

impl<E> RetryError<E> {
    /// Returns true if the retry budget ran out.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Returns true if the wait was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field was empty.
    #[error("{0} should be set")]
    Missing(&'static str),

    /// The instance type string could not be parsed.
    #[error("invalid instance_type {value:?}: {reason}")]
    InstanceType {
        /// Raw value.
        value: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The boot disk type is not one the provider knows.
    #[error("invalid boot_disk_type {0:?}, expected one of local_normal, local_ssd, cloud_ssd, cloud_normal")]
    BootDiskType(String),

    /// The configuration document could not be decoded.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that halt the provisioning step.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The create call was rejected.
    #[error("Error on creating instance: {0}")]
    Create(#[source] ProviderError),

    /// The provider reported a status the instance cannot recover from.
    #[error("Error on waiting for instance {id:?} to become available: {reason} (status {status})")]
    FatalStatus {
        /// Instance id.
        id: String,
        /// Status the instance reached.
        status: InstanceStatus,
        /// Human readable reason.
        reason: &'static str,
    },

    /// A wait phase used up its budget.
    #[error("Error on waiting for {what}: gave up after {attempts} attempts ({last})")]
    WaitExhausted {
        /// Instance id.
        id: String,
        /// What was being waited on.
        what: String,
        /// Attempts made.
        attempts: usize,
        /// Last observation.
        last: String,
    },

    /// A wait phase failed with a provider error.
    #[error("Error on waiting for {what}: {source}")]
    Wait {
        /// Instance id.
        id: String,
        /// What was being waited on.
        what: String,
        /// Underlying provider error.
        #[source]
        source: ProviderError,
    },

    /// The build was cancelled during a wait.
    #[error("Waiting for instance {id:?} was cancelled: {reason}")]
    Cancelled {
        /// Instance id.
        id: String,
        /// Cancellation reason.
        reason: String,
    },

    /// Re-reading the instance record failed.
    #[error("Error on reading instance when creating {id:?}: {source}")]
    Read {
        /// Instance id.
        id: String,
        /// Underlying provider error.
        #[source]
        source: ProviderError,
    },

    /// The run configuration is unusable.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A required state entry is missing or malformed.
    #[error("state entry {key:?} is unusable: {reason}")]
    State {
        /// State bag key.
        key: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The step already created an instance in this run.
    #[error("instance {0:?} was already created by this step")]
    AlreadyCreated(String),
}

impl ProvisionError {
    /// Returns true if the failure was caused by cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Formats a delay for log lines.
pub(crate) fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}
