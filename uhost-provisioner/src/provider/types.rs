//! Provider data types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status reported by the provider for an instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstanceStatus {
    /// Being allocated.
    Initializing,
    /// Booting.
    Starting,
    /// Installing the image.
    Installing,
    /// Up and usable.
    Running,
    /// Shutting down.
    Stopping,
    /// Shut down.
    Stopped,
    /// Rebooting.
    Rebooting,
    /// Changing size.
    Resizing,
    /// Image installation failed. Terminal.
    InstallFail,
    /// Resize failed. Terminal.
    ResizeFail,
    /// Any status this crate does not know about.
    Other(String),
}

impl InstanceStatus {
    /// Wire spelling used by the provider.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Initializing => "Initializing",
            Self::Starting => "Starting",
            Self::Installing => "Installing",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
            Self::Rebooting => "Rebooting",
            Self::Resizing => "Resizing",
            Self::InstallFail => "Install Fail",
            Self::ResizeFail => "ResizeFail",
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Returns true for statuses the instance never leaves on its own.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InstallFail | Self::ResizeFail)
    }
}

impl From<&str> for InstanceStatus {
    fn from(raw: &str) -> Self {
        match raw {
            "Initializing" => Self::Initializing,
            "Starting" => Self::Starting,
            "Installing" => Self::Installing,
            "Running" => Self::Running,
            "Stopping" => Self::Stopping,
            "Stopped" => Self::Stopped,
            "Rebooting" => Self::Rebooting,
            "Resizing" => Self::Resizing,
            "Install Fail" => Self::InstallFail,
            "ResizeFail" => Self::ResizeFail,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for InstanceStatus {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<InstanceStatus> for String {
    fn from(status: InstanceStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Readiness of the boot disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BootDiskStatus {
    /// Ready for use.
    Normal,
    /// Still being prepared.
    Initializing,
    /// Unknown status, treated as not ready.
    Other(String),
}

impl BootDiskStatus {
    /// Wire spelling used by the provider.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Normal => "Normal",
            Self::Initializing => "Initializing",
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Returns true once the disk is usable.
    #[must_use]
    pub fn is_normal(&self) -> bool {
        matches!(self, Self::Normal)
    }
}

impl From<String> for BootDiskStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "Normal" => Self::Normal,
            "Initializing" => Self::Initializing,
            _ => Self::Other(raw),
        }
    }
}

impl From<BootDiskStatus> for String {
    fn from(status: BootDiskStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for BootDiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operating system family of an image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OsType {
    /// Linux distributions.
    Linux,
    /// Windows Server.
    Windows,
    /// Any other family, e.g. `FreeBSD`.
    Other(String),
}

impl OsType {
    /// Wire spelling used by the provider.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Linux => "Linux",
            Self::Windows => "Windows",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

impl From<String> for OsType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "Linux" => Self::Linux,
            "Windows" => Self::Windows,
            _ => Self::Other(raw),
        }
    }
}

impl From<OsType> for String {
    fn from(os_type: OsType) -> Self {
        os_type.as_str().to_string()
    }
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The image the instance boots from, resolved by an earlier build step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceImage {
    /// Image id.
    pub image_id: String,
    /// OS family.
    pub os_type: OsType,
    /// Size of the image in GB, used as the boot disk size.
    pub image_size_gb: u32,
}

impl SourceImage {
    /// Returns true for Linux images.
    #[must_use]
    pub fn is_linux(&self) -> bool {
        self.os_type == OsType::Linux
    }
}

/// An instance as described by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Provider id.
    pub id: String,
    /// Instance name.
    #[serde(default)]
    pub name: String,
    /// Zone the instance lives in.
    #[serde(default)]
    pub zone: String,
    /// Lifecycle status.
    pub status: InstanceStatus,
    /// Boot disk readiness.
    pub boot_disk_status: BootDiskStatus,
    /// Private address, once assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ip: Option<String>,
    /// Public address, when an EIP is bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
}

impl InstanceRecord {
    /// Creates a record with the given status and a ready boot disk.
    #[must_use]
    pub fn new(id: impl Into<String>, status: InstanceStatus) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            zone: String::new(),
            status,
            boot_disk_status: BootDiskStatus::Normal,
            private_ip: None,
            public_ip: None,
        }
    }

    /// Sets the boot disk status.
    #[must_use]
    pub fn with_boot_disk_status(mut self, status: BootDiskStatus) -> Self {
        self.boot_disk_status = status;
        self
    }

    /// Sets the public address.
    #[must_use]
    pub fn with_public_ip(mut self, ip: impl Into<String>) -> Self {
        self.public_ip = Some(ip.into());
        self
    }
}

/// A disk attached at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskSpec {
    /// Whether this is the boot disk.
    pub is_boot: bool,
    /// Size in GB.
    pub size_gb: u32,
    /// Provider disk type, e.g. `CLOUD_SSD`.
    pub disk_type: String,
}

/// Elastic IP attached through a network interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EipSpec {
    /// Bandwidth in Mbps.
    pub bandwidth_mbps: u32,
    /// Billing mode, e.g. `Traffic`.
    pub pay_mode: String,
    /// Line operator, `Bgp` or `International`.
    pub operator_name: String,
}

/// A network interface requested at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterfaceSpec {
    /// EIP bound to the interface.
    pub eip: EipSpec,
}

/// Parameters of the create call. Built once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInstanceRequest {
    /// Region.
    pub region: String,
    /// Availability zone.
    pub zone: String,
    /// Instance name.
    pub name: String,
    /// Virtual CPUs.
    pub cpu: u32,
    /// Memory in MiB.
    pub memory_mb: u32,
    /// Boot image.
    pub image_id: String,
    /// Login mode, always `Password`.
    pub login_mode: String,
    /// Login password.
    pub password: String,
    /// Billing mode, always `Dynamic`.
    pub charge_type: String,
    /// Security group bound by an earlier step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group_id: Option<String>,
    /// VPC bound by an earlier step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    /// Subnet bound by an earlier step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    /// Disks, boot disk first.
    pub disks: Vec<DiskSpec>,
    /// Public network interfaces; empty for private-only instances.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_interfaces: Vec<NetworkInterfaceSpec>,
}
