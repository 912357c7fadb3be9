pub mod addressing;
pub mod asn;
pub mod links;
pub mod ports;
pub mod reconciler;
pub mod snapshot;
pub mod validator;

use std::sync::Arc;

use crate::catalog::DeviceSkuCatalog;
use crate::error::ProvisionResult;
use crate::models::{Inventory, Pod, PodPatch, PodSpec, PodState};
use crate::topology::Fabric;

/// Engine knobs taken from the runtime configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineSettings {
    /// Leaves receive their management address from DHCP later
    pub staged_ztp: bool,
    /// MTU stamped on inter-switch units
    pub fabric_mtu: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Result of a successful engine pass. `fabric.changes()` lists what this pass did.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub fabric: Fabric,
    pub outcome: ReconcileOutcome,
}

/// Validates a request, reconciles the inventory, cables the mesh, then runs
/// the address and ASN allocators. Works on a private copy of the fabric and
/// only returns it when every step succeeded.
#[derive(Clone)]
pub struct Engine {
    catalog: Arc<DeviceSkuCatalog>,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(catalog: Arc<DeviceSkuCatalog>, settings: EngineSettings) -> Self {
        Self { catalog, settings }
    }

    /// Build a brand-new pod from a blueprint and its inventory
    pub fn provision(&self, spec: &PodSpec, inventory: &Inventory) -> ProvisionResult<Fabric> {
        validator::validate(spec, inventory, &self.catalog).inspect_err(|e| {
            tracing::warn!("Pod {}: validation failed: {}", spec.name, e);
        })?;

        let mut fabric = Fabric::new(Pod::from_spec(spec));
        self.first_apply(&mut fabric, inventory)?;
        Ok(fabric)
    }

    /// Apply a blueprint and inventory to an existing pod.
    ///
    /// A pod without devices is provisioned from scratch. Otherwise the
    /// inventory is diffed against the stored snapshot; an identical
    /// inventory with unchanged pod fields is a no-op with an empty journal.
    pub fn reconcile(&self, current: &Fabric, spec: &PodSpec, inventory: &Inventory) -> ProvisionResult<Reconciled> {
        if !current.has_devices() {
            validator::validate(spec, inventory, &self.catalog).inspect_err(|e| {
                tracing::warn!("Pod {}: validation failed: {}", spec.name, e);
            })?;
            // nothing allocated yet, so the whole blueprint may change
            let mut pod = Pod::from_spec(spec);
            pod.id = current.pod().id.clone();
            pod.created_at = current.pod().created_at;
            let mut fabric = Fabric::new(pod);
            self.first_apply(&mut fabric, inventory)?;
            return Ok(Reconciled {
                fabric,
                outcome: ReconcileOutcome::Created,
            });
        }

        validator::validate_update(current.pod(), spec, inventory, &self.catalog).inspect_err(|e| {
            tracing::warn!("Pod {}: validation failed: {}", current.pod().name, e);
        })?;

        let mut fabric = current.clone();
        fabric.take_changes();

        let new_json = snapshot::to_json(inventory)?;
        let inventory_changed = match fabric.pod().inventory_data.as_deref() {
            Some(stored) => snapshot::decode(stored)? != new_json,
            None => true,
        };

        let effect = fabric.apply_pod_patch(&PodPatch::from_spec(spec));
        if !inventory_changed && !effect.changed {
            tracing::info!("Pod {}: inventory and pod unchanged, nothing to do", fabric.pod().name);
            return Ok(Reconciled {
                fabric,
                outcome: ReconcileOutcome::Unchanged,
            });
        }

        if inventory_changed {
            let discovered = reconciler::update_devices(&mut fabric, inventory, &self.settings)?;
            for device in discovered {
                reconciler::fix_interface_names(&mut fabric, &self.catalog, device)?;
            }
        }
        if effect.addressing_changed {
            tracing::info!("Pod {}: addressing changed, re-allocating", fabric.pod().name);
            self.allocate(&mut fabric)?;
        }

        fabric.set_inventory_data(snapshot::encode(&new_json)?);
        fabric.set_pod_state(PodState::Updated);
        fabric.check_invariants()?;

        tracing::info!(
            "Pod {}: updated ({} changes)",
            fabric.pod().name,
            fabric.changes().len()
        );
        Ok(Reconciled {
            fabric,
            outcome: ReconcileOutcome::Updated,
        })
    }

    fn first_apply(&self, fabric: &mut Fabric, inventory: &Inventory) -> ProvisionResult<()> {
        reconciler::create_devices(fabric, inventory, &self.catalog)?;
        links::synthesize(fabric)?;
        self.allocate(fabric)?;

        let json = snapshot::to_json(inventory)?;
        fabric.set_inventory_data(snapshot::encode(&json)?);
        fabric.set_pod_state(PodState::Created);
        fabric.check_invariants()?;

        let pod = fabric.pod();
        tracing::info!(
            "Pod {}: provisioned {} spines, {} leaves (loopback {}, irb {}, interconnect {})",
            pod.name,
            pod.spine_count,
            pod.leaf_count,
            pod.allocated_loopback_block.as_deref().unwrap_or("-"),
            pod.allocated_irb_block.as_deref().unwrap_or("-"),
            pod.allocated_inter_connect_block.as_deref().unwrap_or("-")
        );
        Ok(())
    }

    fn allocate(&self, fabric: &mut Fabric) -> ProvisionResult<()> {
        addressing::allocate_all(fabric, &self.settings)?;
        asn::allocate_asns(fabric)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;
    use crate::models::{DeployStatus, DeviceIx, DeviceRole, InterfaceRole, InventoryDevice};
    use crate::test_utils::{catalog, sample_inventory, sample_spec};
    use crate::topology::Change;
    use crate::utils::Ipv4Block;

    fn engine() -> Engine {
        Engine::new(Arc::new(catalog()), EngineSettings::default())
    }

    fn unit_address(fabric: &Fabric, device: DeviceIx, unit: &str) -> Option<String> {
        fabric
            .find_ifl(device, unit)
            .and_then(|ifl| fabric.ifl(ifl).ip_address.clone())
    }

    #[test]
    fn test_loopback_allocation() {
        let fabric = engine().provision(&sample_spec(), &sample_inventory()).unwrap();
        let pod = fabric.pod();
        assert_eq!(pod.state, PodState::Created);
        assert_eq!(pod.allocated_loopback_block.as_deref(), Some("10.0.0.0/29"));

        let leaf1 = fabric.find_device_by_name(DeviceRole::Leaf, "leaf-1").unwrap();
        assert_eq!(unit_address(&fabric, leaf1, "lo0.0").as_deref(), Some("10.0.0.1/32"));
        let spine2 = fabric.find_device_by_name(DeviceRole::Spine, "spine-2").unwrap();
        assert_eq!(unit_address(&fabric, spine2, "lo0.0").as_deref(), Some("10.0.0.4/32"));
    }

    #[test]
    fn test_first_link_addresses() {
        let fabric = engine().provision(&sample_spec(), &sample_inventory()).unwrap();
        assert_eq!(fabric.pod().allocated_inter_connect_block.as_deref(), Some("192.168.0.0/29"));

        let spine1 = fabric.find_device_by_name(DeviceRole::Spine, "spine-1").unwrap();
        let first = fabric.ifds_with_role(spine1, InterfaceRole::Downlink)[0];
        let spine_unit = fabric.ifd(first).layer_above().unwrap();
        assert_eq!(fabric.ifl(spine_unit).ip_address.as_deref(), Some("192.168.0.0/31"));

        let peer = fabric.ifd(first).peer().unwrap();
        let leaf_unit = fabric.ifd(peer).layer_above().unwrap();
        assert_eq!(fabric.ifl(leaf_unit).ip_address.as_deref(), Some("192.168.0.1/31"));
        assert_eq!(fabric.device(fabric.ifd(peer).device).name, "leaf-1");
    }

    #[test]
    fn test_irb_and_management_and_asn() {
        let fabric = engine().provision(&sample_spec(), &sample_inventory()).unwrap();
        let pod = fabric.pod();
        assert_eq!(pod.allocated_irb_block.as_deref(), Some("172.16.0.0/23"));
        assert_eq!(pod.allocated_spine_as, Some(101));
        assert_eq!(pod.allocated_leaf_as, Some(201));

        let leaf2 = fabric.find_device_by_name(DeviceRole::Leaf, "leaf-2").unwrap();
        assert_eq!(unit_address(&fabric, leaf2, "irb.1").as_deref(), Some("172.16.1.1/24"));
        assert_eq!(fabric.device(leaf2).asn, Some(201));

        // spines first
        let mgmt: Vec<_> = ["spine-1", "spine-2", "leaf-1", "leaf-2"]
            .iter()
            .map(|name| {
                fabric
                    .devices()
                    .iter()
                    .find(|d| d.name == *name)
                    .and_then(|d| d.management_ip.clone())
                    .unwrap()
            })
            .collect();
        assert_eq!(
            mgmt,
            vec!["172.32.22.1/24", "172.32.22.2/24", "172.32.22.3/24", "172.32.22.4/24"]
        );
    }

    #[test]
    fn test_mesh_is_complete_bipartite() {
        let mut spec = sample_spec();
        spec.spine_count = 3;
        spec.leaf_count = 4;
        spec.spine_as = 64512;
        spec.leaf_as = 65000;
        let mut inv = sample_inventory();
        inv.spines.push(InventoryDevice {
            name: "spine-3".to_string(),
            ..Default::default()
        });
        for i in 3..=4 {
            inv.leafs.push(InventoryDevice {
                name: format!("leaf-{}", i),
                family: Some("qfx5100-48s-6q".to_string()),
                ..Default::default()
            });
        }
        let fabric = engine().provision(&spec, &inv).unwrap();

        for (ix, device) in fabric.devices().iter().enumerate() {
            let peered: Vec<_> = fabric
                .ifds_of(DeviceIx(ix))
                .into_iter()
                .filter_map(|ifd| fabric.ifd(ifd).peer().map(|p| (ifd, p)))
                .collect();
            let expected = match device.role {
                DeviceRole::Spine => 4,
                DeviceRole::Leaf => 3,
            };
            assert_eq!(peered.len(), expected, "{}", device.name);
            for (ifd, peer) in peered {
                assert_eq!(fabric.ifd(peer).peer(), Some(ifd));
                assert_ne!(fabric.device(fabric.ifd(peer).device).role, device.role);
            }
        }
    }

    #[test]
    fn test_allocated_ranges_are_disjoint() {
        let fabric = engine().provision(&sample_spec(), &sample_inventory()).unwrap();
        let pod = fabric.pod();
        let blocks: Vec<Ipv4Block> = [
            &pod.allocated_loopback_block,
            &pod.allocated_irb_block,
            &pod.allocated_inter_connect_block,
        ]
        .iter()
        .map(|b| Ipv4Block::parse(b.as_deref().unwrap()).unwrap())
        .collect();
        for (i, a) in blocks.iter().enumerate() {
            for b in &blocks[i + 1..] {
                assert!(!a.overlaps(b), "{} overlaps {}", a, b);
            }
            for device in fabric.devices() {
                let ip = device.management_ip.as_deref().unwrap();
                let (addr, _) = crate::utils::parse_cidr_address(ip).unwrap();
                assert!(!a.contains(addr));
            }
        }

        // every address handed out is unique
        let mut seen = std::collections::HashSet::new();
        for ifl in fabric.ifls() {
            let ip = ifl.ip_address.as_deref().unwrap();
            assert!(seen.insert(ip.split('/').next().unwrap().to_string()), "{}", ip);
        }
    }

    #[test]
    fn test_identical_inventory_is_a_no_op() {
        let engine = engine();
        let fabric = engine.provision(&sample_spec(), &sample_inventory()).unwrap();
        let ifd_count = fabric.ifds().len();

        let again = engine.reconcile(&fabric, &sample_spec(), &sample_inventory()).unwrap();
        assert_eq!(again.outcome, ReconcileOutcome::Unchanged);
        assert!(again.fabric.changes().is_empty());
        assert_eq!(again.fabric.pod().state, PodState::Created);
        assert_eq!(again.fabric.pod().inventory_data, fabric.pod().inventory_data);
        assert_eq!(again.fabric.ifds().len(), ifd_count);
    }

    #[test]
    fn test_family_discovery_renames_placeholders() {
        let engine = engine();
        let fabric = engine.provision(&sample_spec(), &sample_inventory()).unwrap();
        let leaf1 = fabric.find_device_by_name(DeviceRole::Leaf, "leaf-1").unwrap();
        let names = |f: &Fabric| -> Vec<String> {
            f.ifds_with_role(leaf1, InterfaceRole::Uplink)
                .into_iter()
                .map(|i| f.ifd(i).name.clone())
                .collect()
        };
        assert_eq!(names(&fabric), vec!["uplink-0", "uplink-1"]);

        let mut inv = sample_inventory();
        inv.leafs[0].family = Some("qfx5100-48s-6q".to_string());
        let updated = engine.reconcile(&fabric, &sample_spec(), &inv).unwrap();
        assert_eq!(updated.outcome, ReconcileOutcome::Updated);
        let next = &updated.fabric;
        assert_eq!(&names(next)[..2], ["et-0/0/48", "et-0/0/49"]);
        assert_eq!(next.pod().state, PodState::Updated);

        // cabling and addresses survive the rename
        let first = next.ifds_with_role(leaf1, InterfaceRole::Uplink)[0];
        assert!(next.ifd(first).peer().is_some());
        let unit = next.ifd(first).layer_above().unwrap();
        assert_eq!(next.ifl(unit).name, "et-0/0/48.0");
        assert_eq!(next.ifl(unit).ip_address.as_deref(), Some("192.168.0.1/31"));

        // units are renamed before the port they sit on
        let renames: Vec<&Change> = next
            .changes()
            .iter()
            .filter(|c| matches!(c, Change::IfdRenamed { .. } | Change::IflRenamed { .. }))
            .collect();
        assert_eq!(renames.len(), 4);
        assert!(matches!(renames[0], Change::IflRenamed { to, .. } if to == "et-0/0/48.0"));
        assert!(matches!(renames[1], Change::IfdRenamed { to, .. } if to == "et-0/0/48"));

        // the caller's fabric is untouched
        assert_eq!(names(&fabric), vec!["uplink-0", "uplink-1"]);
    }

    #[test]
    fn test_capacity_mismatch_creates_nothing() {
        let mut inv = sample_inventory();
        inv.leafs.pop();
        let err = engine().provision(&sample_spec(), &inv).unwrap_err();
        assert!(matches!(err, ProvisionError::Capacity(_)));

        let empty = Fabric::new(Pod::from_spec(&sample_spec()));
        assert!(engine().reconcile(&empty, &sample_spec(), &inv).is_err());
        assert!(!empty.has_devices());
        assert!(empty.changes().is_empty());
    }

    #[test]
    fn test_empty_pod_takes_the_whole_blueprint() {
        let mut draft = sample_spec();
        draft.spine_count = 1;
        draft.leaf_count = 1;
        let empty = Fabric::new(Pod::from_spec(&draft));

        let done = engine().reconcile(&empty, &sample_spec(), &sample_inventory()).unwrap();
        assert_eq!(done.outcome, ReconcileOutcome::Created);
        assert_eq!(done.fabric.pod().id, empty.pod().id);
        assert_eq!(done.fabric.pod().spine_count, 2);
        assert_eq!(done.fabric.devices().len(), 4);
    }

    #[test]
    fn test_failed_update_leaves_fabric_untouched() {
        let engine = engine();
        let fabric = engine.provision(&sample_spec(), &sample_inventory()).unwrap();
        let mut inv = sample_inventory();
        inv.leafs[0].family = Some("qfx5100-48s-6q".to_string());
        inv.leafs[1].name = "leaf-9".to_string();
        assert!(engine.reconcile(&fabric, &sample_spec(), &inv).is_err());
        assert!(fabric.devices()[0].family.is_none());
    }

    #[test]
    fn test_addressing_change_reallocates() {
        let engine = engine();
        let fabric = engine.provision(&sample_spec(), &sample_inventory()).unwrap();
        let mut spec = sample_spec();
        spec.loopback_prefix = "10.1.0.0/24".to_string();
        let updated = engine.reconcile(&fabric, &spec, &sample_inventory()).unwrap();
        assert_eq!(updated.fabric.pod().allocated_loopback_block.as_deref(), Some("10.1.0.0/29"));
        let leaf1 = updated.fabric.find_device_by_name(DeviceRole::Leaf, "leaf-1").unwrap();
        assert_eq!(unit_address(&updated.fabric, leaf1, "lo0.0").as_deref(), Some("10.1.0.1/32"));
        // nothing else moved
        assert!(!updated
            .fabric
            .changes()
            .iter()
            .any(|c| matches!(c, Change::AsnAssigned { .. } | Change::ManagementIpChanged { .. })));
    }

    #[test]
    fn test_staged_ztp_clears_leaf_management_ip() {
        let engine = Engine::new(
            Arc::new(catalog()),
            EngineSettings {
                staged_ztp: true,
                fabric_mtu: Some(9216),
            },
        );
        let mut inv = sample_inventory();
        inv.leafs[0].deploy_status = Some(DeployStatus::Deploy);
        let mut fabric = engine.provision(&sample_spec(), &inv).unwrap();
        let leaf1 = fabric.find_device_by_name(DeviceRole::Leaf, "leaf-1").unwrap();
        assert_eq!(fabric.device(leaf1).management_ip, None);

        // pretend DHCP handed the leaf an address
        fabric.set_management_ip(leaf1, Some("172.32.22.50/24".to_string()));
        inv.leafs[0].deploy_status = Some(DeployStatus::Provision);
        let updated = engine.reconcile(&fabric, &sample_spec(), &inv).unwrap();
        assert_eq!(updated.fabric.device(leaf1).management_ip, None);
        assert_eq!(updated.fabric.device(leaf1).deploy_status, DeployStatus::Provision);

        let spine1 = fabric.find_device_by_name(DeviceRole::Spine, "spine-1").unwrap();
        let downlink = fabric.ifds_with_role(spine1, InterfaceRole::Downlink)[0];
        let unit = fabric.ifd(downlink).layer_above().unwrap();
        assert_eq!(fabric.ifl(unit).mtu, Some(9216));
    }
}
