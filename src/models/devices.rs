use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ProvisionError, ProvisionResult};
use crate::utils;

/// Fabric role of a switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    Spine,
    Leaf,
}

impl DeviceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceRole::Spine => "spine",
            DeviceRole::Leaf => "leaf",
        }
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spine" => Ok(DeviceRole::Spine),
            "leaf" => Ok(DeviceRole::Leaf),
            other => Err(format!("unknown device role: {}", other)),
        }
    }
}

/// Whether a device is still being provisioned or has been handed to deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStatus {
    #[default]
    Provision,
    Deploy,
}

impl DeployStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployStatus::Provision => "provision",
            DeployStatus::Deploy => "deploy",
        }
    }
}

impl FromStr for DeployStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provision" => Ok(DeployStatus::Provision),
            "deploy" => Ok(DeployStatus::Deploy),
            other => Err(format!("unknown deploy status: {}", other)),
        }
    }
}

/// Device represents a spine or leaf switch of a pod
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub name: String,
    pub role: DeviceRole,
    /// `None` until the family is known (pending auto-discovery)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn: Option<u32>,
    pub deploy_status: DeployStatus,
}

impl Device {
    pub fn new(name: &str, role: DeviceRole, family: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            role,
            family,
            mac_address: None,
            serial_number: None,
            username: None,
            password: None,
            management_ip: None,
            asn: None,
            deploy_status: DeployStatus::default(),
        }
    }

    /// Apply inventory-driven changes.
    ///
    /// Family only moves unknown -> known; an absent family keeps the known one,
    /// and swapping one known family for another is rejected.
    pub fn apply_patch(&mut self, patch: &DevicePatch) -> ProvisionResult<DeviceChange> {
        let mut change = DeviceChange::default();

        if let Some(family) = &patch.family {
            match &self.family {
                None => {
                    self.family = Some(family.clone());
                    change.changed = true;
                    change.family_discovered = true;
                }
                Some(current) if current != family => {
                    return Err(ProvisionError::config(format!(
                        "device '{}': family change from {} to {} is not supported",
                        self.name, current, family
                    )));
                }
                Some(_) => {}
            }
        }

        if let Some(status) = patch.deploy_status {
            if status != self.deploy_status {
                change.deploy_to_provision =
                    self.deploy_status == DeployStatus::Deploy && status == DeployStatus::Provision;
                self.deploy_status = status;
                change.changed = true;
            }
        }

        macro_rules! replace {
            ($field:ident) => {
                if let Some(value) = &patch.$field {
                    if self.$field.as_ref() != Some(value) {
                        self.$field = Some(value.clone());
                        change.changed = true;
                    }
                }
            };
        }
        replace!(mac_address);
        replace!(serial_number);
        replace!(username);
        replace!(password);

        if let Some(name) = &patch.name {
            if *name != self.name {
                self.name = name.clone();
                change.changed = true;
            }
        }

        Ok(change)
    }
}

/// DevicePatch enumerates the device fields an inventory update may touch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DevicePatch {
    pub name: Option<String>,
    pub family: Option<String>,
    pub mac_address: Option<String>,
    pub serial_number: Option<String>,
    pub deploy_status: Option<DeployStatus>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl DevicePatch {
    /// Build a patch from an inventory entry. The name is only carried when the
    /// entry was matched by id, otherwise the name is the match key itself.
    pub fn from_inventory(entry: &super::InventoryDevice, matched_by_id: bool) -> Self {
        Self {
            name: if matched_by_id { Some(entry.name.clone()) } else { None },
            family: entry.family.clone(),
            mac_address: entry.mac_address.as_deref().map(utils::normalize_mac),
            serial_number: entry.serial_number.clone(),
            deploy_status: entry.deploy_status,
            username: entry.username.clone(),
            password: entry.password.clone(),
        }
    }
}

/// What a device patch did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceChange {
    pub changed: bool,
    /// Family went from unknown to known; interfaces need renaming
    pub family_discovered: bool,
    pub deploy_to_provision: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_discovery_is_one_way() {
        let mut leaf = Device::new("leaf-1", DeviceRole::Leaf, None);
        let change = leaf
            .apply_patch(&DevicePatch {
                family: Some("qfx5100-48s-6q".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert!(change.family_discovered);
        assert_eq!(leaf.family.as_deref(), Some("qfx5100-48s-6q"));

        // absent family keeps the known one
        let change = leaf.apply_patch(&DevicePatch::default()).unwrap();
        assert!(!change.changed);
        assert_eq!(leaf.family.as_deref(), Some("qfx5100-48s-6q"));

        let err = leaf
            .apply_patch(&DevicePatch {
                family: Some("ex4300-48p".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Configuration(_)));
    }

    #[test]
    fn test_deploy_to_provision_is_reported() {
        let mut leaf = Device::new("leaf-1", DeviceRole::Leaf, None);
        leaf.deploy_status = DeployStatus::Deploy;
        let change = leaf
            .apply_patch(&DevicePatch {
                deploy_status: Some(DeployStatus::Provision),
                ..Default::default()
            })
            .unwrap();
        assert!(change.deploy_to_provision);
        assert_eq!(leaf.deploy_status, DeployStatus::Provision);
    }

    #[test]
    fn test_patch_from_inventory_normalizes_mac() {
        let entry = super::super::InventoryDevice {
            name: "leaf-1".to_string(),
            mac_address: Some("00-1C-73-AA-BB-CC".to_string()),
            ..Default::default()
        };
        let patch = DevicePatch::from_inventory(&entry, false);
        assert_eq!(patch.mac_address.as_deref(), Some("00:1c:73:aa:bb:cc"));
        assert_eq!(patch.name, None);

        let patch = DevicePatch::from_inventory(&entry, true);
        assert_eq!(patch.name.as_deref(), Some("leaf-1"));
    }
}
