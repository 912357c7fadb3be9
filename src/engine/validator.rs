use std::collections::HashSet;

use crate::catalog::DeviceSkuCatalog;
use crate::error::{AddressPool, ProvisionError, ProvisionResult};
use crate::models::{DeviceRole, Inventory, Pod, PodSpec};
use crate::utils::{self, Ipv4Block};

use super::addressing;
use super::asn::asn_range;

/// Validate a blueprint and its inventory before the fabric is touched.
///
/// Order: device names, counts, families, then address space.
pub fn validate(spec: &PodSpec, inventory: &Inventory, catalog: &DeviceSkuCatalog) -> ProvisionResult<()> {
    check_pod_fields(spec)?;
    check_names(spec, inventory)?;
    check_counts(spec, inventory)?;
    check_families(spec, inventory, catalog)?;
    check_prefixes(spec)?;
    check_asn_ranges(spec)?;
    Ok(())
}

/// Validate an update of an existing pod. Capacity, spine type and topology
/// variant are fixed once the pod is created.
pub fn validate_update(
    pod: &Pod,
    spec: &PodSpec,
    inventory: &Inventory,
    catalog: &DeviceSkuCatalog,
) -> ProvisionResult<()> {
    if spec.spine_count != pod.spine_count || spec.leaf_count != pod.leaf_count {
        return Err(ProvisionError::capacity(format!(
            "pod '{}': changing spine/leaf count from {}/{} to {}/{} is not supported",
            pod.name, pod.spine_count, pod.leaf_count, spec.spine_count, spec.leaf_count
        )));
    }
    if spec.spine_device_type != pod.spine_device_type {
        return Err(ProvisionError::config(format!(
            "pod '{}': changing spineDeviceType from {} to {} is not supported",
            pod.name, pod.spine_device_type, spec.spine_device_type
        )));
    }
    if spec.topology_type != pod.topology_type {
        return Err(ProvisionError::config(format!(
            "pod '{}': changing topologyType is not supported",
            pod.name
        )));
    }
    validate(spec, inventory, catalog)
}

fn check_pod_fields(spec: &PodSpec) -> ProvisionResult<()> {
    if spec.name.trim().is_empty() {
        return Err(ProvisionError::config("pod name is required"));
    }
    if spec.spine_count == 0 || spec.leaf_count == 0 {
        return Err(ProvisionError::config(format!(
            "pod '{}': spineCount and leafCount must be at least 1",
            spec.name
        )));
    }
    if spec.host_or_vm_count_per_leaf == 0 {
        return Err(ProvisionError::config(format!(
            "pod '{}': hostOrVmCountPerLeaf must be at least 1",
            spec.name
        )));
    }
    if spec.spine_device_type.trim().is_empty() {
        return Err(ProvisionError::config(format!(
            "pod '{}': spineDeviceType is required",
            spec.name
        )));
    }
    Ok(())
}

fn check_names(spec: &PodSpec, inventory: &Inventory) -> ProvisionResult<()> {
    let mut seen = HashSet::new();
    let mut ids = HashSet::new();
    for role in [DeviceRole::Spine, DeviceRole::Leaf] {
        for (i, device) in inventory.by_role(role).iter().enumerate() {
            if device.name.trim().is_empty() {
                return Err(ProvisionError::config(format!(
                    "pod '{}': {} #{} has no name",
                    spec.name,
                    role,
                    i + 1
                )));
            }
            if !utils::is_valid_hostname(&device.name) {
                return Err(ProvisionError::config(format!(
                    "pod '{}': invalid device name '{}'",
                    spec.name, device.name
                )));
            }
            if !seen.insert(device.name.as_str()) {
                return Err(ProvisionError::config(format!(
                    "pod '{}': duplicate device name '{}'",
                    spec.name, device.name
                )));
            }
            if let Some(id) = device.id.as_deref() {
                if id.trim().is_empty() {
                    return Err(ProvisionError::config(format!(
                        "pod '{}': device '{}' has an empty id",
                        spec.name, device.name
                    )));
                }
                if !ids.insert(id) {
                    return Err(ProvisionError::config(format!(
                        "pod '{}': duplicate device id '{}'",
                        spec.name, id
                    )));
                }
            }
        }
    }
    Ok(())
}

fn check_counts(spec: &PodSpec, inventory: &Inventory) -> ProvisionResult<()> {
    let expected = spec.spine_count as usize + spec.leaf_count as usize;
    if inventory.device_count() != expected {
        return Err(ProvisionError::capacity(format!(
            "pod '{}': inventory has {} devices, pod needs {} ({} spines + {} leaves)",
            spec.name,
            inventory.device_count(),
            expected,
            spec.spine_count,
            spec.leaf_count
        )));
    }
    if inventory.spines.len() != spec.spine_count as usize {
        return Err(ProvisionError::capacity(format!(
            "pod '{}': inventory has {} spines, spineCount is {}",
            spec.name,
            inventory.spines.len(),
            spec.spine_count
        )));
    }
    if inventory.leafs.len() != spec.leaf_count as usize {
        return Err(ProvisionError::capacity(format!(
            "pod '{}': inventory has {} leaves, leafCount is {}",
            spec.name,
            inventory.leafs.len(),
            spec.leaf_count
        )));
    }
    Ok(())
}

fn check_families(spec: &PodSpec, inventory: &Inventory, catalog: &DeviceSkuCatalog) -> ProvisionResult<()> {
    let variant = spec.topology_type.as_deref();

    for spine in &inventory.spines {
        let family = spine.family.as_deref().unwrap_or(&spec.spine_device_type);
        let ports = catalog.lookup(family, DeviceRole::Spine, variant).ok_or_else(|| {
            ProvisionError::config(format!(
                "pod '{}': spine {} family {} is not a supported spine",
                spec.name, spine.name, family
            ))
        })?;
        if ports.downlink_ports.len() < spec.leaf_count as usize {
            return Err(ProvisionError::capacity(format!(
                "pod '{}': spine {} ({}) has {} downlink ports, {} leaves requested",
                spec.name,
                spine.name,
                family,
                ports.downlink_ports.len(),
                spec.leaf_count
            )));
        }
    }

    for leaf in &inventory.leafs {
        // no family yet: pending discovery
        if let Some(family) = leaf.family.as_deref() {
            if !catalog.supports(family, DeviceRole::Leaf, variant) {
                return Err(ProvisionError::config(format!(
                    "pod '{}': leaf {} family {} is not a supported leaf",
                    spec.name, leaf.name, family
                )));
            }
        }
    }
    Ok(())
}

fn check_prefixes(spec: &PodSpec) -> ProvisionResult<()> {
    let loopback = addressing::fit_pool(
        &spec.name,
        AddressPool::Loopback,
        &spec.loopback_prefix,
        addressing::loopback_count(spec.spine_count, spec.leaf_count),
    )?;

    let (_, irb_total) = addressing::irb_sizing(&spec.name, spec.host_or_vm_count_per_leaf, spec.leaf_count)?;
    let irb = addressing::fit_pool(&spec.name, AddressPool::Irb, &spec.vlan_prefix, irb_total)?;

    let inter_connect = addressing::fit_pool(
        &spec.name,
        AddressPool::InterConnect,
        &spec.inter_connect_prefix,
        addressing::inter_connect_count(spec.spine_count, spec.leaf_count),
    )?;

    let management = addressing::management_addresses(
        &spec.name,
        &spec.management_prefix,
        spec.management_start_ip.as_deref(),
        spec.management_mask,
        spec.spine_count as u64 + spec.leaf_count as u64,
    )?;
    let management = management_span(&management)?;

    let pools = [
        (AddressPool::Loopback, loopback),
        (AddressPool::Irb, irb),
        (AddressPool::InterConnect, inter_connect),
    ];
    for (i, (pool_a, block_a)) in pools.iter().enumerate() {
        for (pool_b, block_b) in &pools[i + 1..] {
            if block_a.overlaps(block_b) {
                return Err(ProvisionError::config(format!(
                    "pod '{}': {} block {} overlaps {} block {}",
                    spec.name, pool_a, block_a, pool_b, block_b
                )));
            }
        }
        if block_a.contains(management.0) || block_a.contains(management.1) || management_covers(block_a, management) {
            return Err(ProvisionError::config(format!(
                "pod '{}': management addresses overlap {} block {}",
                spec.name, pool_a, block_a
            )));
        }
    }
    Ok(())
}

/// First and last address of the management walk
fn management_span(addresses: &[String]) -> ProvisionResult<(u32, u32)> {
    let parse = |s: &String| {
        utils::parse_cidr_address(s)
            .map(|(addr, _)| addr)
            .map_err(ProvisionError::config)
    };
    match (addresses.first(), addresses.last()) {
        (Some(first), Some(last)) => Ok((parse(first)?, parse(last)?)),
        _ => Err(ProvisionError::config("management walk produced no addresses")),
    }
}

fn management_covers(block: &Ipv4Block, (first, last): (u32, u32)) -> bool {
    first <= block.network && block.broadcast() <= last
}

fn check_asn_ranges(spec: &PodSpec) -> ProvisionResult<()> {
    let range = |role: DeviceRole, base: u32, count: u32| {
        asn_range(base, count).filter(|_| base > 0).ok_or_else(|| {
            ProvisionError::config(format!(
                "pod '{}': {} AS range starting at {} is invalid",
                spec.name, role, base
            ))
        })
    };
    let spine = range(DeviceRole::Spine, spec.spine_as, spec.spine_count)?;
    let leaf = range(DeviceRole::Leaf, spec.leaf_as, spec.leaf_count)?;

    if spine.0 <= leaf.1 && leaf.0 <= spine.1 {
        return Err(ProvisionError::config(format!(
            "pod '{}': spine AS range {}-{} overlaps leaf AS range {}-{}",
            spec.name, spine.0, spine.1, leaf.0, leaf.1
        )));
    }
    Ok(())
}
