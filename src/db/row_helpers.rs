use anyhow::{anyhow, Result};
use sqlx::{sqlite::SqliteRow, Row};

use crate::models::*;

/// Filter empty strings to None, used when DB stores '' instead of NULL
pub fn none_if_empty(opt: Option<String>) -> Option<String> {
    opt.filter(|s| !s.is_empty())
}

fn opt_u32(row: &SqliteRow, column: &str) -> Option<u32> {
    row.try_get::<Option<i64>, _>(column)
        .ok()
        .flatten()
        .and_then(|v| u32::try_from(v).ok())
}

fn get_u32(row: &SqliteRow, column: &str) -> Result<u32> {
    let v: i64 = row.get(column);
    u32::try_from(v).map_err(|_| anyhow!("column {} out of range: {}", column, v))
}

fn get_index(row: &SqliteRow, column: &str) -> Result<usize> {
    let v: i64 = row.get(column);
    usize::try_from(v).map_err(|_| anyhow!("column {} is not a valid index: {}", column, v))
}

fn opt_index(row: &SqliteRow, column: &str) -> Option<usize> {
    row.try_get::<Option<i64>, _>(column)
        .ok()
        .flatten()
        .and_then(|v| usize::try_from(v).ok())
}

/// Map a SQLite row to a Pod struct
pub fn map_pod_row(row: &SqliteRow) -> Result<Pod> {
    let state: String = row.get("state");
    Ok(Pod {
        id: row.get("id"),
        name: row.get("name"),
        spine_count: get_u32(row, "spine_count")?,
        leaf_count: get_u32(row, "leaf_count")?,
        spine_device_type: row.get("spine_device_type"),
        topology_type: none_if_empty(row.get("topology_type")),
        loopback_prefix: row.get("loopback_prefix"),
        vlan_prefix: row.get("vlan_prefix"),
        inter_connect_prefix: row.get("inter_connect_prefix"),
        management_prefix: row.get("management_prefix"),
        management_start_ip: none_if_empty(row.get("management_start_ip")),
        management_mask: opt_u32(row, "management_mask").and_then(|v| u8::try_from(v).ok()),
        host_or_vm_count_per_leaf: get_u32(row, "host_or_vm_count_per_leaf")?,
        spine_as: get_u32(row, "spine_as")?,
        leaf_as: get_u32(row, "leaf_as")?,
        allocated_loopback_block: none_if_empty(row.get("allocated_loopback_block")),
        allocated_irb_block: none_if_empty(row.get("allocated_irb_block")),
        allocated_inter_connect_block: none_if_empty(row.get("allocated_inter_connect_block")),
        allocated_spine_as: opt_u32(row, "allocated_spine_as"),
        allocated_leaf_as: opt_u32(row, "allocated_leaf_as"),
        inventory_data: none_if_empty(row.get("inventory_data")),
        state: state.parse().map_err(|e: String| anyhow!(e))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Map a SQLite row to a Device struct
pub fn map_device_row(row: &SqliteRow) -> Result<Device> {
    let role: String = row.get("role");
    let deploy_status: String = row.get("deploy_status");
    Ok(Device {
        id: row.get("id"),
        name: row.get("name"),
        role: role.parse().map_err(|e: String| anyhow!(e))?,
        family: none_if_empty(row.get("family")),
        mac_address: none_if_empty(row.get("mac_address")),
        serial_number: none_if_empty(row.get("serial_number")),
        username: none_if_empty(row.get("username")),
        password: none_if_empty(row.get("password")),
        management_ip: none_if_empty(row.get("management_ip")),
        asn: opt_u32(row, "asn"),
        deploy_status: deploy_status.parse().map_err(|e: String| anyhow!(e))?,
    })
}

/// Map a SQLite row to an InterfaceDefinition struct
pub fn map_ifd_row(row: &SqliteRow) -> Result<InterfaceDefinition> {
    let role: String = row.get("role");
    Ok(InterfaceDefinition {
        name: row.get("name"),
        device: DeviceIx(get_index(row, "device_seq")?),
        role: role.parse().map_err(|e: String| anyhow!(e))?,
        lldp_status: none_if_empty(row.get("lldp_status")),
        peer: opt_index(row, "peer_seq").map(IfdIx),
        layer_above: opt_index(row, "layer_above_seq").map(IflIx),
    })
}

/// Map a SQLite row to an InterfaceLogical struct
pub fn map_ifl_row(row: &SqliteRow) -> Result<InterfaceLogical> {
    Ok(InterfaceLogical {
        name: row.get("name"),
        device: DeviceIx(get_index(row, "device_seq")?),
        ip_address: none_if_empty(row.get("ip_address")),
        mtu: opt_u32(row, "mtu"),
    })
}

/// Arena index of the row, checked against its position in a seq-ordered read
pub fn check_seq(row: &SqliteRow, position: usize, table: &str) -> Result<()> {
    let seq = get_index(row, "seq")?;
    if seq != position {
        return Err(anyhow!("{} rows are not contiguous: expected seq {}, found {}", table, position, seq));
    }
    Ok(())
}
