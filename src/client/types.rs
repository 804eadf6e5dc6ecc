//! Wire model for the provider's compute, network, and identity services.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle states reported by the provider for a compute instance.
///
/// The provider owns this enumeration and may extend it; unrecognised values
/// deserialise to [`LifecycleState::Other`] so state reads never fail on
/// enum growth.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// Instance resources are being allocated.
    Provisioning,
    /// Instance is powering on.
    Starting,
    /// Instance is up.
    Running,
    /// Instance is powering off.
    Stopping,
    /// Instance is powered off.
    Stopped,
    /// Instance is being deleted.
    Terminating,
    /// Instance has been deleted.
    Terminated,
    /// A custom image is being captured from the instance.
    CreatingImage,
    /// Any state this crate does not recognise.
    #[serde(other)]
    Other,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Provisioning => "PROVISIONING",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
            Self::Terminating => "TERMINATING",
            Self::Terminated => "TERMINATED",
            Self::CreatingImage => "CREATING_IMAGE",
            Self::Other => "OTHER",
        };
        f.write_str(label)
    }
}

/// Power actions accepted by the instance-action endpoint.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InstanceAction {
    /// Power the instance on.
    Start,
    /// Power the instance off gracefully.
    Stop,
}

impl InstanceAction {
    /// Wire value expected by the provider.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Stop => "STOP",
        }
    }

    /// Lifecycle state the action converges to.
    #[must_use]
    pub const fn target_state(self) -> LifecycleState {
        match self {
            Self::Start => LifecycleState::Running,
            Self::Stop => LifecycleState::Stopped,
        }
    }
}

/// A compute instance as reported by the provider.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    /// Opaque instance identifier.
    pub id: String,
    /// Current lifecycle state.
    pub lifecycle_state: LifecycleState,
    /// Display name assigned at launch.
    #[serde(default)]
    pub display_name: Option<String>,
}

/// One boot image in a compartment.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// Opaque image identifier.
    pub id: String,
    /// Human-readable image name.
    pub display_name: String,
    /// Creation timestamp; list responses are sorted on this, descending.
    pub time_created: DateTime<Utc>,
}

/// One page of an image listing plus the continuation token, if any.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImagePage {
    /// Images on this page, most recently created first.
    pub items: Vec<Image>,
    /// Opaque token for the next page; `None` when this is the last page.
    pub next_page: Option<String>,
}

/// An availability domain visible in a compartment.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityDomain {
    /// Fully-qualified domain name, for example `Uocm:PHX-AD-1`.
    pub name: String,
}

/// A VNIC attachment record linking an instance to a VNIC.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VnicAttachment {
    /// Identifier of the attached VNIC; absent while attaching.
    #[serde(default)]
    pub vnic_id: Option<String>,
}

/// A virtual network interface card.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vnic {
    /// Public IP address, when one is assigned.
    #[serde(default)]
    pub public_ip: Option<String>,
    /// Private IP address inside the subnet.
    #[serde(default)]
    pub private_ip: Option<String>,
}

/// Details of the primary VNIC created with an instance.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVnicDetails {
    /// Subnet the VNIC is created in.
    pub subnet_id: String,
    /// Whether a public IP is assigned; provider default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assign_public_ip: Option<bool>,
}

/// Image-based boot source for a launch request.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSourceDetails {
    /// Discriminator; always `image` for this driver.
    pub source_type: String,
    /// Resolved image identifier.
    pub image_id: String,
    /// Boot volume size override in gigabytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_volume_size_in_g_bs: Option<i64>,
}

/// Compute-agent configuration for a launch request.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Disables the monitoring plugin on the instance.
    pub is_monitoring_disabled: bool,
}

/// Fully-resolved launch payload submitted to the compute service.
///
/// All lookups (image, availability domain) happen before this is built;
/// the payload itself is submitted exactly once.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchDetails {
    /// Fully-qualified availability domain.
    pub availability_domain: String,
    /// Compartment in which the instance is created.
    pub compartment_id: String,
    /// Compute shape.
    pub shape: String,
    /// Display name for the instance.
    pub display_name: String,
    /// Primary VNIC parameters.
    pub create_vnic_details: CreateVnicDetails,
    /// Instance metadata: `ssh_authorized_keys` and base64 `user_data`.
    pub metadata: BTreeMap<String, String>,
    /// Boot source.
    pub source_details: InstanceSourceDetails,
    /// Fault domain pin, used on rover devices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault_domain: Option<String>,
    /// Compute-agent overrides, used on rover devices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_config: Option<AgentConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_state_parses_known_values() {
        let state: LifecycleState = serde_json::from_str("\"CREATING_IMAGE\"")
            .expect("known state should deserialise");
        assert_eq!(state, LifecycleState::CreatingImage);
    }

    #[test]
    fn lifecycle_state_folds_unknown_values() {
        let state: LifecycleState =
            serde_json::from_str("\"MIGRATING\"").expect("unknown state should deserialise");
        assert_eq!(state, LifecycleState::Other);
    }

    #[test]
    fn launch_details_serialises_camel_case() {
        let details = LaunchDetails {
            availability_domain: String::from("Uocm:PHX-AD-1"),
            compartment_id: String::from("ocid1.compartment.oc1..aaaa"),
            shape: String::from("VM.Standard2.1"),
            display_name: String::from("node-1"),
            create_vnic_details: CreateVnicDetails {
                subnet_id: String::from("ocid1.subnet.oc1..bbbb"),
                assign_public_ip: None,
            },
            metadata: BTreeMap::new(),
            source_details: InstanceSourceDetails {
                source_type: String::from("image"),
                image_id: String::from("ocid1.image.oc1..cccc"),
                boot_volume_size_in_g_bs: None,
            },
            fault_domain: None,
            agent_config: None,
        };
        let value = serde_json::to_value(&details).expect("details should serialise");
        assert_eq!(
            value
                .get("availabilityDomain")
                .and_then(serde_json::Value::as_str),
            Some("Uocm:PHX-AD-1")
        );
        assert_eq!(
            value
                .get("createVnicDetails")
                .and_then(|vnic| vnic.get("subnetId"))
                .and_then(serde_json::Value::as_str),
            Some("ocid1.subnet.oc1..bbbb")
        );
        assert!(value.get("faultDomain").is_none());
    }

    #[test]
    fn instance_action_wire_values() {
        assert_eq!(InstanceAction::Start.as_str(), "START");
        assert_eq!(InstanceAction::Stop.as_str(), "STOP");
        assert_eq!(
            InstanceAction::Stop.target_state(),
            LifecycleState::Stopped
        );
    }
}
