//! Run configuration for the instance step.

use crate::errors::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

/// Configuration for the communicator that later connects to the instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommConfig {
    /// Login user.
    #[serde(default = "default_ssh_username")]
    pub ssh_username: String,
    /// Login password. Filled in by the step when it generates one.
    #[serde(default)]
    pub ssh_password: Option<String>,
    /// SSH port.
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
}

fn default_ssh_username() -> String {
    "root".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

impl Default for CommConfig {
    fn default() -> Self {
        Self {
            ssh_username: default_ssh_username(),
            ssh_password: None,
            ssh_port: default_ssh_port(),
        }
    }
}

impl CommConfig {
    /// Returns the configured password, treating an empty string as unset.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.ssh_password.as_deref().filter(|p| !p.is_empty())
    }
}

/// Boot disk types accepted by the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BootDiskType {
    /// Local HDD.
    LocalNormal,
    /// Local SSD.
    LocalSsd,
    /// Cloud SSD (default).
    CloudSsd,
    /// Cloud HDD.
    CloudNormal,
}

impl Default for BootDiskType {
    fn default() -> Self {
        Self::CloudSsd
    }
}

impl BootDiskType {
    /// Configuration spelling, e.g. `local_ssd`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalNormal => "local_normal",
            Self::LocalSsd => "local_ssd",
            Self::CloudSsd => "cloud_ssd",
            Self::CloudNormal => "cloud_normal",
        }
    }

    /// Disk type identifier expected by the provider API.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::LocalNormal => "LOCAL_NORMAL",
            Self::LocalSsd => "LOCAL_SSD",
            Self::CloudSsd => "CLOUD_SSD",
            Self::CloudNormal => "CLOUD_NORMAL",
        }
    }

    /// Local disks take around ten minutes to initialise.
    #[must_use]
    pub fn is_slow_to_initialize(&self) -> bool {
        matches!(self, Self::LocalNormal | Self::LocalSsd)
    }
}

impl fmt::Display for BootDiskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BootDiskType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local_normal" => Ok(Self::LocalNormal),
            "local_ssd" => Ok(Self::LocalSsd),
            "cloud_ssd" => Ok(Self::CloudSsd),
            "cloud_normal" => Ok(Self::CloudNormal),
            other => Err(ConfigError::BootDiskType(other.to_string())),
        }
    }
}

impl TryFrom<String> for BootDiskType {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BootDiskType> for String {
    fn from(value: BootDiskType) -> Self {
        value.as_str().to_string()
    }
}

/// CPU and memory sizing resolved from an instance type such as `n-basic-2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceType {
    /// Virtual CPUs.
    pub cpu: u32,
    /// Memory in MiB.
    pub memory_mb: u32,
}

fn instance_type_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^n-(highcpu|basic|standard|highmem|customized)-(\d+)(?:-(\d+))?$")
            .unwrap_or_else(|e| unreachable!("static pattern is valid: {e}"))
    })
}

impl FromStr for InstanceType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InstanceType {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let caps = instance_type_pattern()
            .captures(s)
            .ok_or_else(|| invalid("expected n-<highcpu|basic|standard|highmem>-<cpu> or n-customized-<cpu>-<memory>"))?;

        let cpu: u32 = caps[2].parse().map_err(|_| invalid("cpu is not a number"))?;
        if !(1..=32).contains(&cpu) {
            return Err(invalid("expected cpu between 1 and 32"));
        }

        let memory_gb = match (&caps[1], caps.get(3)) {
            ("customized", Some(mem)) => {
                let memory: u32 = mem.as_str().parse().map_err(|_| invalid("memory is not a number"))?;
                if !(1..=128).contains(&memory) {
                    return Err(invalid("expected memory between 1 and 128 GB"));
                }
                if cpu > memory * 2 || memory > cpu * 12 {
                    return Err(invalid("the ratio of cpu to memory should be between 2:1 and 1:12"));
                }
                memory
            }
            ("customized", None) => return Err(invalid("customized instance type needs a memory size")),
            (_, Some(_)) => return Err(invalid("only customized instance types take a memory size")),
            ("highcpu", None) => cpu,
            ("basic", None) => cpu * 2,
            ("standard", None) => cpu * 4,
            (_, None) => cpu * 8,
        };

        Ok(Self {
            cpu,
            memory_mb: memory_gb * 1024,
        })
    }
}

/// Configuration for creating the build instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Region, e.g. `cn-bj2`.
    pub region: String,
    /// Availability zone, e.g. `cn-bj2-02`.
    pub zone: String,
    /// Instance type, e.g. `n-basic-2`.
    pub instance_type: String,
    /// Name given to the instance.
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
    /// Boot disk type.
    #[serde(default)]
    pub boot_disk_type: BootDiskType,
    /// Image the instance boots from.
    pub source_image_id: String,
    /// Skip the public EIP and connect over the private address.
    #[serde(default)]
    pub use_private_ip: bool,
    /// Communicator settings.
    #[serde(default)]
    pub comm: CommConfig,
}

fn default_instance_name() -> String {
    format!("uhost-builder-{}", chrono::Utc::now().format("%Y%m%d%H%M%S"))
}

impl Config {
    /// Creates a configuration with the required fields and defaults elsewhere.
    #[must_use]
    pub fn new(
        region: impl Into<String>,
        zone: impl Into<String>,
        instance_type: impl Into<String>,
        source_image_id: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            zone: zone.into(),
            instance_type: instance_type.into(),
            instance_name: default_instance_name(),
            boot_disk_type: BootDiskType::default(),
            source_image_id: source_image_id.into(),
            use_private_ip: false,
            comm: CommConfig::default(),
        }
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Sets the instance name.
    #[must_use]
    pub fn with_instance_name(mut self, name: impl Into<String>) -> Self {
        self.instance_name = name.into();
        self
    }

    /// Sets the boot disk type.
    #[must_use]
    pub fn with_boot_disk_type(mut self, disk_type: BootDiskType) -> Self {
        self.boot_disk_type = disk_type;
        self
    }

    /// Sets whether to skip the public EIP.
    #[must_use]
    pub fn with_private_ip(mut self, use_private_ip: bool) -> Self {
        self.use_private_ip = use_private_ip;
        self
    }

    /// Sets the SSH password.
    #[must_use]
    pub fn with_ssh_password(mut self, password: impl Into<String>) -> Self {
        self.comm.ssh_password = Some(password.into());
        self
    }

    /// Checks required fields and the instance type.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region.is_empty() {
            return Err(ConfigError::Missing("region"));
        }
        if self.zone.is_empty() {
            return Err(ConfigError::Missing("availability_zone"));
        }
        if self.source_image_id.is_empty() {
            return Err(ConfigError::Missing("source_image_id"));
        }
        if self.instance_name.is_empty() {
            return Err(ConfigError::Missing("instance_name"));
        }
        self.parsed_instance_type().map(|_| ())
    }

    /// Resolves the instance type into CPU and memory.
    pub fn parsed_instance_type(&self) -> Result<InstanceType, ConfigError> {
        self.instance_type.parse()
    }
}
