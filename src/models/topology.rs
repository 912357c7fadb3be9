use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Pod lifecycle. The engine moves a pod to `Created` and `Updated`;
/// later states belong to the configuration pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PodState {
    #[default]
    Unknown,
    Created,
    Updated,
    CablingDone,
    DeviceConfigDone,
    ZtpConfigDone,
    Deployed,
    Completed,
}

impl PodState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PodState::Unknown => "unknown",
            PodState::Created => "created",
            PodState::Updated => "updated",
            PodState::CablingDone => "cablingDone",
            PodState::DeviceConfigDone => "deviceConfigDone",
            PodState::ZtpConfigDone => "ztpConfigDone",
            PodState::Deployed => "deployed",
            PodState::Completed => "completed",
        }
    }
}

impl FromStr for PodState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(PodState::Unknown),
            "created" => Ok(PodState::Created),
            "updated" => Ok(PodState::Updated),
            "cablingDone" => Ok(PodState::CablingDone),
            "deviceConfigDone" => Ok(PodState::DeviceConfigDone),
            "ztpConfigDone" => Ok(PodState::ZtpConfigDone),
            "deployed" => Ok(PodState::Deployed),
            "completed" => Ok(PodState::Completed),
            other => Err(format!("unknown pod state: {}", other)),
        }
    }
}

/// PodSpec is the declarative fabric blueprint supplied by the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    pub name: String,
    pub spine_count: u32,
    pub leaf_count: u32,
    pub spine_device_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_type: Option<String>,
    pub loopback_prefix: String,
    pub vlan_prefix: String,
    pub inter_connect_prefix: String,
    pub management_prefix: String,
    #[serde(default, rename = "managementStartingIP", skip_serializing_if = "Option::is_none")]
    pub management_start_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_mask: Option<u8>,
    pub host_or_vm_count_per_leaf: u32,
    #[serde(rename = "spineAS")]
    pub spine_as: u32,
    #[serde(rename = "leafAS")]
    pub leaf_as: u32,
}

/// Pod is a provisioned fabric blueprint together with its allocation results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    pub id: String,
    pub name: String,
    pub spine_count: u32,
    pub leaf_count: u32,
    pub spine_device_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topology_type: Option<String>,
    pub loopback_prefix: String,
    pub vlan_prefix: String,
    pub inter_connect_prefix: String,
    pub management_prefix: String,
    #[serde(rename = "managementStartingIP", skip_serializing_if = "Option::is_none")]
    pub management_start_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_mask: Option<u8>,
    pub host_or_vm_count_per_leaf: u32,
    #[serde(rename = "spineAS")]
    pub spine_as: u32,
    #[serde(rename = "leafAS")]
    pub leaf_as: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocated_loopback_block: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocated_irb_block: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocated_inter_connect_block: Option<String>,
    #[serde(rename = "allocatedSpineAS", skip_serializing_if = "Option::is_none")]
    pub allocated_spine_as: Option<u32>,
    #[serde(rename = "allocatedLeafAS", skip_serializing_if = "Option::is_none")]
    pub allocated_leaf_as: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory_data: Option<String>,
    pub state: PodState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pod {
    /// Build an unallocated pod from its blueprint
    pub fn from_spec(spec: &PodSpec) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: spec.name.clone(),
            spine_count: spec.spine_count,
            leaf_count: spec.leaf_count,
            spine_device_type: spec.spine_device_type.clone(),
            topology_type: spec.topology_type.clone(),
            loopback_prefix: spec.loopback_prefix.clone(),
            vlan_prefix: spec.vlan_prefix.clone(),
            inter_connect_prefix: spec.inter_connect_prefix.clone(),
            management_prefix: spec.management_prefix.clone(),
            management_start_ip: spec.management_start_ip.clone(),
            management_mask: spec.management_mask,
            host_or_vm_count_per_leaf: spec.host_or_vm_count_per_leaf,
            spine_as: spec.spine_as,
            leaf_as: spec.leaf_as,
            allocated_loopback_block: None,
            allocated_irb_block: None,
            allocated_inter_connect_block: None,
            allocated_spine_as: None,
            allocated_leaf_as: None,
            inventory_data: None,
            state: PodState::Unknown,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply the mutable subset of a blueprint.
    /// Capacity and device type are frozen at creation and are not part of the patch.
    pub fn apply_patch(&mut self, patch: &PodPatch) -> PatchEffect {
        let mut effect = PatchEffect::default();

        if let Some(name) = &patch.name {
            if *name != self.name {
                self.name = name.clone();
                effect.changed = true;
            }
        }

        macro_rules! addressing {
            ($field:ident) => {
                if let Some(value) = &patch.$field {
                    if *value != self.$field {
                        self.$field = value.clone();
                        effect.changed = true;
                        effect.addressing_changed = true;
                    }
                }
            };
        }
        addressing!(loopback_prefix);
        addressing!(vlan_prefix);
        addressing!(inter_connect_prefix);
        addressing!(management_prefix);
        addressing!(management_start_ip);
        addressing!(management_mask);
        addressing!(host_or_vm_count_per_leaf);
        addressing!(spine_as);
        addressing!(leaf_as);

        if effect.changed {
            self.updated_at = Utc::now();
        }
        effect
    }
}

/// PodPatch lists exactly the pod fields that may change after creation.
/// `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PodPatch {
    pub name: Option<String>,
    pub loopback_prefix: Option<String>,
    pub vlan_prefix: Option<String>,
    pub inter_connect_prefix: Option<String>,
    pub management_prefix: Option<String>,
    pub management_start_ip: Option<Option<String>>,
    pub management_mask: Option<Option<u8>>,
    pub host_or_vm_count_per_leaf: Option<u32>,
    pub spine_as: Option<u32>,
    pub leaf_as: Option<u32>,
}

impl PodPatch {
    /// Patch carrying every mutable field of a blueprint
    pub fn from_spec(spec: &PodSpec) -> Self {
        Self {
            name: Some(spec.name.clone()),
            loopback_prefix: Some(spec.loopback_prefix.clone()),
            vlan_prefix: Some(spec.vlan_prefix.clone()),
            inter_connect_prefix: Some(spec.inter_connect_prefix.clone()),
            management_prefix: Some(spec.management_prefix.clone()),
            management_start_ip: Some(spec.management_start_ip.clone()),
            management_mask: Some(spec.management_mask),
            host_or_vm_count_per_leaf: Some(spec.host_or_vm_count_per_leaf),
            spine_as: Some(spec.spine_as),
            leaf_as: Some(spec.leaf_as),
        }
    }
}

/// What a patch did to its target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchEffect {
    pub changed: bool,
    /// A prefix, host count or AS base changed; allocations must be redone
    pub addressing_changed: bool,
}

/// PodRequest is the document accepted by the runner: blueprint plus inventory
#[derive(Debug, Clone, Deserialize)]
pub struct PodRequest {
    pub pod: PodSpec,
    #[serde(default)]
    pub inventory: super::Inventory,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_spec;

    #[test]
    fn test_spec_deserializes_camel_case() {
        let json = r#"{
            "name": "labPod",
            "spineCount": 2,
            "leafCount": 3,
            "spineDeviceType": "qfx5100-24q-2p",
            "loopbackPrefix": "10.0.0.0/24",
            "vlanPrefix": "172.16.0.0/20",
            "interConnectPrefix": "192.168.0.0/24",
            "managementPrefix": "192.168.48.216/24",
            "managementStartingIP": "192.168.48.220",
            "hostOrVmCountPerLeaf": 100,
            "spineAS": 100,
            "leafAS": 200
        }"#;
        let spec: PodSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.leaf_count, 3);
        assert_eq!(spec.management_start_ip.as_deref(), Some("192.168.48.220"));
        assert_eq!(spec.management_mask, None);
        assert_eq!(spec.topology_type, None);
    }

    #[test]
    fn test_pod_state_round_trips_as_str() {
        for state in [
            PodState::Unknown,
            PodState::Created,
            PodState::Updated,
            PodState::CablingDone,
            PodState::DeviceConfigDone,
            PodState::ZtpConfigDone,
            PodState::Deployed,
            PodState::Completed,
        ] {
            assert_eq!(state.as_str().parse::<PodState>().unwrap(), state);
        }
        assert!("bogus".parse::<PodState>().is_err());
    }

    #[test]
    fn test_identical_patch_changes_nothing() {
        let spec = sample_spec();
        let mut pod = Pod::from_spec(&spec);
        let before = pod.clone();
        let effect = pod.apply_patch(&PodPatch::from_spec(&spec));
        assert_eq!(effect, PatchEffect::default());
        assert_eq!(pod, before);
    }

    #[test]
    fn test_patch_flags_addressing_changes() {
        let spec = sample_spec();
        let mut pod = Pod::from_spec(&spec);

        let mut renamed = spec.clone();
        renamed.name = "pod1-renamed".to_string();
        let effect = pod.apply_patch(&PodPatch::from_spec(&renamed));
        assert!(effect.changed);
        assert!(!effect.addressing_changed);
        assert_eq!(pod.name, "pod1-renamed");

        let mut readdressed = renamed.clone();
        readdressed.leaf_as = 300;
        let effect = pod.apply_patch(&PodPatch::from_spec(&readdressed));
        assert!(effect.addressing_changed);
        assert_eq!(pod.leaf_as, 300);
    }
}
