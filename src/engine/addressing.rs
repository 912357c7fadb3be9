use crate::error::{AddressPool, ProvisionError, ProvisionResult};
use crate::models::{DeviceRole, InterfaceRole, Pod};
use crate::topology::Fabric;
use crate::utils::{self, Ipv4Block};

use super::EngineSettings;

pub const LOOPBACK_UNIT: &str = "lo0.0";
pub const IRB_UNIT: &str = "irb.1";

/// Block at the network of `prefix` sized for `count` addresses, or an
/// address-space error naming the minimum CIDR when the prefix is too small.
pub(crate) fn fit_pool(pod: &str, pool: AddressPool, prefix: &str, count: u64) -> ProvisionResult<Ipv4Block> {
    let configured = Ipv4Block::parse(prefix)
        .map_err(|e| ProvisionError::config(format!("{} {}: {}", pool, prefix, e)))?;
    let required = utils::cidr_for(count).ok_or_else(|| {
        ProvisionError::config(format!("{} needs {} addresses, beyond IPv4 space", pool, count))
    })?;

    if configured.prefix_len > required {
        return Err(ProvisionError::AddressSpace {
            pod: pod.to_string(),
            pool,
            prefix: prefix.to_string(),
            minimum: utils::format_cidr(configured.network, required),
        });
    }
    Ok(Ipv4Block::new(configured.network, required))
}

pub(crate) fn loopback_count(spine_count: u32, leaf_count: u32) -> u64 {
    spine_count as u64 + leaf_count as u64 + 2
}

/// Per-leaf IRB subnet length and the total address count for all leaves
pub(crate) fn irb_sizing(pod: &str, host_count: u32, leaf_count: u32) -> ProvisionResult<(u8, u64)> {
    let subnet_len = utils::cidr_for(host_count as u64 + 2)
        .ok_or_else(|| ProvisionError::config(format!("pod '{}': host count {} is too large", pod, host_count)))?;
    let bits = 32 - subnet_len as u32;
    Ok((subnet_len, (leaf_count as u64) << bits))
}

pub(crate) fn inter_connect_count(spine_count: u32, leaf_count: u32) -> u64 {
    2 * spine_count as u64 * leaf_count as u64
}

/// Management walk parameters resolved from the pod fields
struct ManagementRange {
    network: Ipv4Block,
    first: u32,
}

fn management_range(
    pod: &str,
    prefix: &str,
    start_ip: Option<&str>,
    mask: Option<u8>,
) -> ProvisionResult<ManagementRange> {
    let config_err = |e: String| ProvisionError::config(format!("pod '{}': management: {}", pod, e));

    let (prefix_addr, prefix_len) = utils::parse_cidr_address(prefix).map_err(config_err)?;
    let start = match start_ip {
        Some(ip) => utils::ipv4_to_u32(ip).map_err(config_err)?,
        None => prefix_addr,
    };
    if let Some(mask) = mask {
        if mask > 32 {
            return Err(config_err(format!("invalid mask {}", mask)));
        }
    }

    let network = match mask {
        Some(mask) => Ipv4Block::new(start, mask),
        None => Ipv4Block::new(prefix_addr, prefix_len),
    };
    if !network.contains(start) {
        return Err(config_err(format!(
            "start address {} is outside {}",
            utils::u32_to_ipv4(start),
            network
        )));
    }

    // never hand out the network address itself
    let first = if network.prefix_len < 31 {
        start.max(network.network + 1)
    } else {
        start
    };
    Ok(ManagementRange { network, first })
}

/// Walk `count` consecutive management addresses, all or nothing.
/// Each address carries the network's prefix length (`ip/len`).
pub(crate) fn management_addresses(
    pod: &str,
    prefix: &str,
    start_ip: Option<&str>,
    mask: Option<u8>,
    count: u64,
) -> ProvisionResult<Vec<String>> {
    let range = management_range(pod, prefix, start_ip, mask)?;
    let network = range.network;
    let last_usable = if network.prefix_len < 31 {
        network.broadcast() as u64 - 1
    } else {
        network.broadcast() as u64
    };

    if count == 0 || range.first as u64 + count - 1 > last_usable {
        let offset = (range.first - network.network) as u64;
        let minimum = utils::cidr_for(offset + count + 1)
            .map(|len| utils::format_cidr(network.network, len))
            .unwrap_or_else(|| "/0".to_string());
        return Err(ProvisionError::AddressSpace {
            pod: pod.to_string(),
            pool: AddressPool::Management,
            prefix: prefix.to_string(),
            minimum,
        });
    }

    Ok((0..count)
        .map(|i| utils::format_cidr(range.first + i as u32, network.prefix_len))
        .collect())
}

/// Run every address allocator over the fabric: loopback, IRB, inter-switch
/// and management. Block sizing is shared with the validator, so a prefix that
/// passes validation always yields a complete allocation.
pub fn allocate_all(fabric: &mut Fabric, settings: &EngineSettings) -> ProvisionResult<()> {
    allocate_loopbacks(fabric)?;
    allocate_irb(fabric)?;
    allocate_inter_connect(fabric, settings.fabric_mtu)?;
    allocate_management(fabric, settings.staged_ztp)?;
    Ok(())
}

/// One `/32` per device in device order from the loopback pool
pub fn allocate_loopbacks(fabric: &mut Fabric) -> ProvisionResult<()> {
    let pod = fabric.pod().clone();
    let count = fabric.devices().len() as u64;
    let block = fit_pool(&pod.name, AddressPool::Loopback, &pod.loopback_prefix, count + 2)?;

    let devices: Vec<_> = (0..fabric.devices().len()).map(crate::models::DeviceIx).collect();
    let mut hosts = block.hosts();
    for device in devices {
        let addr = hosts.next().ok_or_else(|| exhausted(&pod, AddressPool::Loopback))?;
        let ifl = fabric.upsert_device_ifl(device, LOOPBACK_UNIT);
        fabric.set_ifl_address(ifl, Some(utils::format_cidr(addr, 32)));
    }

    tracing::debug!("Pod {}: loopback block {}", pod.name, block);
    fabric.set_allocated_block(AddressPool::Loopback, block.to_string());
    Ok(())
}

/// One subnet per leaf; the leaf's `irb.1` takes the subnet's first host
pub fn allocate_irb(fabric: &mut Fabric) -> ProvisionResult<()> {
    let pod = fabric.pod().clone();
    let leaves = fabric.devices_by_role(DeviceRole::Leaf);
    let (subnet_len, total) = irb_sizing(&pod.name, pod.host_or_vm_count_per_leaf, leaves.len() as u32)?;
    let block = fit_pool(&pod.name, AddressPool::Irb, &pod.vlan_prefix, total)?;

    let mut subnets = block.subnets(subnet_len);
    for leaf in leaves {
        let subnet = subnets.next().ok_or_else(|| exhausted(&pod, AddressPool::Irb))?;
        let gateway = subnet.hosts().next().ok_or_else(|| exhausted(&pod, AddressPool::Irb))?;
        let ifl = fabric.upsert_device_ifl(leaf, IRB_UNIT);
        fabric.set_ifl_address(ifl, Some(utils::format_cidr(gateway, subnet_len)));
    }

    tracing::debug!("Pod {}: IRB block {} (/{} per leaf)", pod.name, block, subnet_len);
    fabric.set_allocated_block(AddressPool::Irb, block.to_string());
    Ok(())
}

/// Consecutive `/31`s over the cabled links, spine-major. The spine end
/// takes the even address, the leaf end the odd one.
pub fn allocate_inter_connect(fabric: &mut Fabric, mtu: Option<u32>) -> ProvisionResult<()> {
    let pod = fabric.pod().clone();

    let mut links = Vec::new();
    for spine in fabric.devices_by_role(DeviceRole::Spine) {
        for ifd in fabric.ifds_with_role(spine, InterfaceRole::Downlink) {
            if let Some(peer) = fabric.ifd(ifd).peer() {
                links.push((ifd, peer));
            }
        }
    }
    if links.is_empty() {
        return Ok(());
    }

    let block = fit_pool(
        &pod.name,
        AddressPool::InterConnect,
        &pod.inter_connect_prefix,
        2 * links.len() as u64,
    )?;

    let mut subnets = block.subnets(31);
    for (spine_ifd, leaf_ifd) in links {
        let subnet = subnets.next().ok_or_else(|| exhausted(&pod, AddressPool::InterConnect))?;
        for (ifd, addr) in [(spine_ifd, subnet.network), (leaf_ifd, subnet.network + 1)] {
            let ifl = fabric.upsert_unit_zero(ifd);
            fabric.set_ifl_address(ifl, Some(utils::format_cidr(addr, 31)));
            fabric.set_ifl_mtu(ifl, mtu);
        }
    }

    tracing::debug!("Pod {}: inter-connect block {}", pod.name, block);
    fabric.set_allocated_block(AddressPool::InterConnect, block.to_string());
    Ok(())
}

/// Management addresses: spines first, then leaves. Under staged ZTP leaves
/// get theirs from DHCP later and are skipped.
pub fn allocate_management(fabric: &mut Fabric, staged_ztp: bool) -> ProvisionResult<()> {
    let pod = fabric.pod().clone();
    let spines = fabric.devices_by_role(DeviceRole::Spine);
    let leaves = fabric.devices_by_role(DeviceRole::Leaf);

    let addresses = management_addresses(
        &pod.name,
        &pod.management_prefix,
        pod.management_start_ip.as_deref(),
        pod.management_mask,
        (spines.len() + leaves.len()) as u64,
    )?;

    let mut addresses = addresses.into_iter();
    for spine in spines {
        fabric.set_management_ip(spine, addresses.next());
    }
    for leaf in leaves {
        let addr = addresses.next();
        if !staged_ztp {
            fabric.set_management_ip(leaf, addr);
        }
    }
    Ok(())
}

fn exhausted(pod: &Pod, pool: AddressPool) -> ProvisionError {
    ProvisionError::capacity(format!("pod '{}': {} pool exhausted", pod.name, pool))
}
