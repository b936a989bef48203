//! The cloud provider collaborator.
//!
//! Transport and authentication live outside this crate; the step only
//! needs the four calls of [`ProviderClient`].

mod types;

pub use types::{
    BootDiskStatus, CreateInstanceRequest, DiskSpec, EipSpec, InstanceRecord, InstanceStatus,
    NetworkInterfaceSpec, OsType, SourceImage,
};

use crate::errors::ProviderError;
use async_trait::async_trait;

/// Calls the lifecycle step makes against the UHost API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Creates an instance and returns its id.
    async fn create_instance(&self, request: &CreateInstanceRequest) -> Result<String, ProviderError>;

    /// Describes an instance.
    ///
    /// Returns [`ProviderError::NotFound`] when the instance does not exist.
    async fn describe_instance(&self, id: &str) -> Result<InstanceRecord, ProviderError>;

    /// Requests a stop.
    async fn stop_instance(&self, id: &str) -> Result<(), ProviderError>;

    /// Terminates an instance, optionally releasing its disks and EIP with it.
    async fn terminate_instance(
        &self,
        id: &str,
        release_udisk: bool,
        release_eip: bool,
    ) -> Result<(), ProviderError>;
}
