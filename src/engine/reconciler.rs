use std::collections::HashSet;

use crate::catalog::DeviceSkuCatalog;
use crate::error::{ProvisionError, ProvisionResult};
use crate::models::*;
use crate::topology::Fabric;

use super::{ports, EngineSettings};

/// First apply: create every inventory device with its ports. Leaves are created before
/// spines; that order is the persisted device order.
pub fn create_devices(fabric: &mut Fabric, inventory: &Inventory, catalog: &DeviceSkuCatalog) -> ProvisionResult<()> {
    let pod = fabric.pod().clone();
    let variant = pod.topology_type.as_deref();

    for role in [DeviceRole::Leaf, DeviceRole::Spine] {
        for entry in inventory.by_role(role) {
            let mut patch = DevicePatch::from_inventory(entry, false);
            if role == DeviceRole::Spine && patch.family.is_none() {
                patch.family = Some(pod.spine_device_type.clone());
            }

            let mut device = Device::new(&entry.name, role, None);
            if let Some(id) = &entry.id {
                device.id = id.clone();
            }
            device.apply_patch(&patch)?;

            let ports = ports::resolve(
                catalog,
                device.family.as_deref(),
                role,
                variant,
                pod.spine_count as usize,
            )?;
            let ix = fabric.add_device(device);
            for name in &ports.uplink_ports {
                fabric.add_ifd(ix, name, InterfaceRole::Uplink);
            }
            for name in &ports.downlink_ports {
                fabric.add_ifd(ix, name, InterfaceRole::Downlink);
            }
        }
    }

    tracing::info!(
        "Pod {}: created {} devices, {} interfaces",
        pod.name,
        fabric.devices().len(),
        fabric.ifds().len()
    );
    Ok(())
}

/// Patch existing devices from the inventory. Returns the devices whose
/// family just became known and whose interfaces need renaming.
pub fn update_devices(
    fabric: &mut Fabric,
    inventory: &Inventory,
    settings: &EngineSettings,
) -> ProvisionResult<Vec<DeviceIx>> {
    let pod_name = fabric.pod().name.clone();
    let mut matched = HashSet::new();
    let mut discovered = Vec::new();

    for role in [DeviceRole::Leaf, DeviceRole::Spine] {
        for entry in inventory.by_role(role) {
            let (ix, by_id) = match_device(fabric, role, entry).ok_or_else(|| {
                ProvisionError::config(format!(
                    "pod '{}': inventory {} '{}' does not match any device",
                    pod_name, role, entry.name
                ))
            })?;
            if !matched.insert(ix) {
                return Err(ProvisionError::config(format!(
                    "pod '{}': device {} is listed twice in the inventory",
                    pod_name,
                    fabric.device(ix).name
                )));
            }

            let change = fabric.apply_device_patch(ix, &DevicePatch::from_inventory(entry, by_id))?;
            if change.family_discovered {
                tracing::info!(
                    "Pod {}: {} family discovered as {}",
                    pod_name,
                    fabric.device(ix).name,
                    fabric.device(ix).family.as_deref().unwrap_or_default()
                );
                discovered.push(ix);
            }
            if change.deploy_to_provision && settings.staged_ztp && role == DeviceRole::Leaf {
                tracing::info!(
                    "Pod {}: {} back to provision, clearing management IP",
                    pod_name,
                    fabric.device(ix).name
                );
                fabric.set_management_ip(ix, None);
            }
        }
    }
    Ok(discovered)
}

/// Match an inventory entry by id when one is given, else by name within the role
fn match_device(fabric: &Fabric, role: DeviceRole, entry: &InventoryDevice) -> Option<(DeviceIx, bool)> {
    match entry.id.as_deref() {
        Some(id) => fabric
            .find_device_by_id(id)
            .filter(|ix| fabric.device(*ix).role == role)
            .map(|ix| (ix, true)),
        None => fabric.find_device_by_name(role, &entry.name).map(|ix| (ix, false)),
    }
}

/// One planned port rename together with the units stacked on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameStep {
    pub ifd: IfdIx,
    pub new_name: String,
    pub ifls: Vec<(IflIx, String)>,
}

/// Read phase: compute the new uplink names of a device from its (now known)
/// family, in interface sequence order. Ports that keep their name are left out.
pub fn plan_renames(
    fabric: &Fabric,
    catalog: &DeviceSkuCatalog,
    device: DeviceIx,
) -> ProvisionResult<Vec<RenameStep>> {
    let pod = fabric.pod();
    let dev = fabric.device(device);
    let ports = ports::resolve(
        catalog,
        dev.family.as_deref(),
        dev.role,
        pod.topology_type.as_deref(),
        pod.spine_count as usize,
    )?;

    let mut steps = Vec::new();
    for (ifd, new_name) in fabric
        .ifds_with_role(device, InterfaceRole::Uplink)
        .into_iter()
        .zip(ports.uplink_ports)
    {
        if fabric.ifd(ifd).name == new_name {
            continue;
        }
        let ifls = fabric
            .ifd(ifd)
            .layer_above()
            .map(|ifl| vec![(ifl, unit_zero_name(&new_name))])
            .unwrap_or_default();
        steps.push(RenameStep { ifd, new_name, ifls });
    }
    Ok(steps)
}

/// Write phase: each step renames the logical units first, then the port.
pub fn apply_renames(fabric: &mut Fabric, steps: &[RenameStep]) {
    for step in steps {
        for (ifl, name) in &step.ifls {
            fabric.rename_ifl(*ifl, name);
        }
        tracing::info!(
            "Pod {}: renaming {} to {}",
            fabric.pod().name,
            fabric.ifd(step.ifd).name,
            step.new_name
        );
        fabric.rename_ifd(step.ifd, &step.new_name);
    }
}

/// Bring a device's ports in line with its family: rename the existing
/// uplinks, then add the remaining catalog uplinks and the downlinks.
pub fn fix_interface_names(fabric: &mut Fabric, catalog: &DeviceSkuCatalog, device: DeviceIx) -> ProvisionResult<()> {
    let steps = plan_renames(fabric, catalog, device)?;
    apply_renames(fabric, &steps);

    let pod = fabric.pod().clone();
    let dev = fabric.device(device).clone();
    let ports = ports::resolve(
        catalog,
        dev.family.as_deref(),
        dev.role,
        pod.topology_type.as_deref(),
        pod.spine_count as usize,
    )?;

    let existing: HashSet<String> = fabric
        .ifds_of(device)
        .into_iter()
        .map(|ifd| fabric.ifd(ifd).name.clone())
        .collect();
    let mut added = 0;
    for (names, role) in [
        (&ports.uplink_ports, InterfaceRole::Uplink),
        (&ports.downlink_ports, InterfaceRole::Downlink),
    ] {
        for name in names {
            if !existing.contains(name) {
                fabric.add_ifd(device, name, role);
                added += 1;
            }
        }
    }
    if added > 0 {
        tracing::debug!("Pod {}: added {} interfaces to {}", pod.name, added, dev.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{catalog, sample_inventory, sample_spec};

    fn created_fabric() -> Fabric {
        let mut fabric = Fabric::new(Pod::from_spec(&sample_spec()));
        create_devices(&mut fabric, &sample_inventory(), &catalog()).unwrap();
        fabric
    }

    #[test]
    fn test_leaves_are_created_before_spines() {
        let fabric = created_fabric();
        let names: Vec<_> = fabric.devices().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["leaf-1", "leaf-2", "spine-1", "spine-2"]);
        // spine family defaults to the pod's spine type
        assert_eq!(fabric.devices()[2].family.as_deref(), Some("qfx5100-24q-2p"));
    }

    #[test]
    fn test_unmatched_entry_is_rejected() {
        let mut fabric = created_fabric();
        let mut inv = sample_inventory();
        inv.leafs[0].name = "leaf-9".to_string();
        let err = update_devices(&mut fabric, &inv, &EngineSettings::default()).unwrap_err();
        assert!(matches!(err, ProvisionError::Configuration(_)));
    }

    #[test]
    fn test_match_by_id_renames_device() {
        let mut fabric = created_fabric();
        let id = fabric.devices()[0].id.clone();
        let mut inv = sample_inventory();
        inv.leafs[0].id = Some(id);
        inv.leafs[0].name = "leaf-1a".to_string();
        update_devices(&mut fabric, &inv, &EngineSettings::default()).unwrap();
        assert_eq!(fabric.devices()[0].name, "leaf-1a");
    }

    #[test]
    fn test_renames_are_planned_in_sequence_order() {
        let mut fabric = created_fabric();
        let leaf = DeviceIx(0);
        let uplinks = fabric.ifds_with_role(leaf, InterfaceRole::Uplink);
        let unit = fabric.upsert_unit_zero(uplinks[0]);

        let mut inv = sample_inventory();
        inv.leafs[0].family = Some("qfx5100-48s-6q".to_string());
        let discovered = update_devices(&mut fabric, &inv, &EngineSettings::default()).unwrap();
        assert_eq!(discovered, vec![leaf]);

        let steps = plan_renames(&fabric, &catalog(), leaf).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].ifd, uplinks[0]);
        assert_eq!(steps[0].new_name, "et-0/0/48");
        assert_eq!(steps[0].ifls, vec![(unit, "et-0/0/48.0".to_string())]);
        assert_eq!(steps[1].new_name, "et-0/0/49");
        assert!(steps[1].ifls.is_empty());
    }

    #[test]
    fn test_fix_interface_names_adds_remaining_ports() {
        let mut fabric = created_fabric();
        let leaf = DeviceIx(0);
        let mut inv = sample_inventory();
        inv.leafs[0].family = Some("qfx5100-48s-6q".to_string());
        update_devices(&mut fabric, &inv, &EngineSettings::default()).unwrap();
        fix_interface_names(&mut fabric, &catalog(), leaf).unwrap();

        let uplinks: Vec<_> = fabric
            .ifds_with_role(leaf, InterfaceRole::Uplink)
            .into_iter()
            .map(|i| fabric.ifd(i).name.clone())
            .collect();
        assert_eq!(uplinks, vec!["et-0/0/48", "et-0/0/49", "et-0/0/50", "et-0/0/51", "et-0/0/52", "et-0/0/53"]);
        assert_eq!(fabric.ifds_with_role(leaf, InterfaceRole::Downlink).len(), 48);
        fabric.check_invariants().unwrap();
    }
}
