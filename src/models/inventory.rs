use serde::{Deserialize, Serialize};

use super::{DeployStatus, DeviceRole};

/// One switch as declared by the operator. An absent `family` means the
/// family will be discovered later.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryDevice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_status: Option<DeployStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Inventory payload: `{ "spines": [...], "leafs": [...] }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub spines: Vec<InventoryDevice>,
    #[serde(default)]
    pub leafs: Vec<InventoryDevice>,
}

impl Inventory {
    pub fn device_count(&self) -> usize {
        self.spines.len() + self.leafs.len()
    }

    pub fn by_role(&self, role: DeviceRole) -> &[InventoryDevice] {
        match role {
            DeviceRole::Spine => &self.spines,
            DeviceRole::Leaf => &self.leafs,
        }
    }
}
