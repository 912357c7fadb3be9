use crate::catalog::DeviceSkuCatalog;
use crate::models::{Inventory, InventoryDevice, PodSpec};

/// Two spines, two leaves, 254 hosts per leaf. Shared by the unit tests.
pub fn sample_spec() -> PodSpec {
    PodSpec {
        name: "pod1".to_string(),
        spine_count: 2,
        leaf_count: 2,
        spine_device_type: "qfx5100-24q-2p".to_string(),
        topology_type: None,
        loopback_prefix: "10.0.0.0/21".to_string(),
        vlan_prefix: "172.16.0.0/21".to_string(),
        inter_connect_prefix: "192.168.0.0/21".to_string(),
        management_prefix: "172.32.22.0/24".to_string(),
        management_start_ip: None,
        management_mask: None,
        host_or_vm_count_per_leaf: 254,
        spine_as: 100,
        leaf_as: 200,
    }
}

/// Inventory matching [`sample_spec`]. Leaf families are left for discovery.
pub fn sample_inventory() -> Inventory {
    let device = |name: &str| InventoryDevice {
        name: name.to_string(),
        ..Default::default()
    };
    Inventory {
        spines: vec![device("spine-1"), device("spine-2")],
        leafs: vec![device("leaf-1"), device("leaf-2")],
    }
}

pub fn catalog() -> DeviceSkuCatalog {
    DeviceSkuCatalog::builtin().expect("builtin catalog parses")
}
