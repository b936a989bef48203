//! Builds the create request from configuration and shared state.

use crate::errors::ProvisionError;
use crate::password::resolve_password;
use crate::provider::{CreateInstanceRequest, DiskSpec, EipSpec, NetworkInterfaceSpec};
use crate::state::{StateBag, KEY_SECURITY_GROUP_ID, KEY_SUBNET_ID, KEY_VPC_ID};
use rand::Rng;
use tracing::debug;

/// Login mode sent with every create request.
pub const LOGIN_MODE: &str = "Password";
/// Charge type sent with every create request.
pub const CHARGE_TYPE: &str = "Dynamic";
/// EIP bandwidth in Mbps.
pub const EIP_BANDWIDTH_MBPS: u32 = 30;
/// EIP pay mode.
pub const EIP_PAY_MODE: &str = "Traffic";

/// Picks the EIP line for a region: `Bgp` in mainland China, otherwise
/// `International`.
#[must_use]
pub fn eip_operator(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "Bgp"
    } else {
        "International"
    }
}

fn binding(state: &StateBag, key: &str) -> Result<Option<String>, ProvisionError> {
    match state.data.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(value)) if value.is_empty() => Ok(None),
        Some(serde_json::Value::String(value)) => Ok(Some(value)),
        Some(other) => Err(ProvisionError::State {
            key: key.to_string(),
            reason: format!("expected a string, found {other}"),
        }),
    }
}

/// Builds the create request for this run.
///
/// A generated password is written back into the run configuration so the
/// communicator can log in with it.
pub fn build_create_request<R: Rng + ?Sized>(
    state: &StateBag,
    rng: &mut R,
) -> Result<CreateInstanceRequest, ProvisionError> {
    let config = state.config();
    let instance_type = config.parsed_instance_type()?;
    let image = state.source_image();

    let password = resolve_password(image, config.comm.password(), rng);
    if password.generated {
        debug!(image_id = %image.image_id, "Generated login password");
        let value = password.value.clone();
        state.update_config(|c| c.comm.ssh_password = Some(value));
    }

    let network_interfaces = if config.use_private_ip {
        Vec::new()
    } else {
        vec![NetworkInterfaceSpec {
            eip: EipSpec {
                bandwidth_mbps: EIP_BANDWIDTH_MBPS,
                pay_mode: EIP_PAY_MODE.to_string(),
                operator_name: eip_operator(&config.region).to_string(),
            },
        }]
    };

    Ok(CreateInstanceRequest {
        region: config.region.clone(),
        zone: config.zone.clone(),
        name: config.instance_name.clone(),
        cpu: instance_type.cpu,
        memory_mb: instance_type.memory_mb,
        image_id: config.source_image_id.clone(),
        login_mode: LOGIN_MODE.to_string(),
        password: password.value,
        charge_type: CHARGE_TYPE.to_string(),
        security_group_id: binding(state, KEY_SECURITY_GROUP_ID)?,
        vpc_id: binding(state, KEY_VPC_ID)?,
        subnet_id: binding(state, KEY_SUBNET_ID)?,
        disks: vec![DiskSpec {
            is_boot: true,
            size_gb: image.image_size_gb,
            disk_type: config.boot_disk_type.provider_name().to_string(),
        }],
        network_interfaces,
    })
}
