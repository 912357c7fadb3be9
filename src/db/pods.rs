use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite, SqliteConnection};

use crate::models::*;
use super::row_helpers::map_pod_row;

const SELECT_POD: &str = r#"
    SELECT id, name, spine_count, leaf_count, spine_device_type, topology_type,
           loopback_prefix, vlan_prefix, inter_connect_prefix, management_prefix,
           management_start_ip, management_mask, host_or_vm_count_per_leaf,
           spine_as, leaf_as,
           allocated_loopback_block, allocated_irb_block, allocated_inter_connect_block,
           allocated_spine_as, allocated_leaf_as,
           inventory_data, state, created_at, updated_at
    FROM pods
"#;

/// Pod database operations
pub struct PodRepo;

impl PodRepo {
    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<Pod>> {
        let rows = sqlx::query(&format!("{} ORDER BY name", SELECT_POD))
            .fetch_all(pool)
            .await?;
        rows.iter().map(map_pod_row).collect()
    }

    pub async fn get(pool: &Pool<Sqlite>, id: &str) -> Result<Option<Pod>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_POD))
            .bind(id)
            .fetch_optional(pool)
            .await?;
        row.as_ref().map(map_pod_row).transpose()
    }

    pub async fn get_by_name(pool: &Pool<Sqlite>, name: &str) -> Result<Option<Pod>> {
        let row = sqlx::query(&format!("{} WHERE name = ?", SELECT_POD))
            .bind(name)
            .fetch_optional(pool)
            .await?;
        row.as_ref().map(map_pod_row).transpose()
    }

    /// Insert or fully overwrite a pod row
    pub async fn upsert(conn: &mut SqliteConnection, pod: &Pod) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO pods (id, name, spine_count, leaf_count, spine_device_type, topology_type,
                   loopback_prefix, vlan_prefix, inter_connect_prefix, management_prefix,
                   management_start_ip, management_mask, host_or_vm_count_per_leaf, spine_as, leaf_as,
                   allocated_loopback_block, allocated_irb_block, allocated_inter_connect_block,
                   allocated_spine_as, allocated_leaf_as, inventory_data, state, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   spine_count = excluded.spine_count,
                   leaf_count = excluded.leaf_count,
                   spine_device_type = excluded.spine_device_type,
                   topology_type = excluded.topology_type,
                   loopback_prefix = excluded.loopback_prefix,
                   vlan_prefix = excluded.vlan_prefix,
                   inter_connect_prefix = excluded.inter_connect_prefix,
                   management_prefix = excluded.management_prefix,
                   management_start_ip = excluded.management_start_ip,
                   management_mask = excluded.management_mask,
                   host_or_vm_count_per_leaf = excluded.host_or_vm_count_per_leaf,
                   spine_as = excluded.spine_as,
                   leaf_as = excluded.leaf_as,
                   allocated_loopback_block = excluded.allocated_loopback_block,
                   allocated_irb_block = excluded.allocated_irb_block,
                   allocated_inter_connect_block = excluded.allocated_inter_connect_block,
                   allocated_spine_as = excluded.allocated_spine_as,
                   allocated_leaf_as = excluded.allocated_leaf_as,
                   inventory_data = excluded.inventory_data,
                   state = excluded.state,
                   updated_at = excluded.updated_at"#,
        )
        .bind(&pod.id)
        .bind(&pod.name)
        .bind(pod.spine_count as i64)
        .bind(pod.leaf_count as i64)
        .bind(&pod.spine_device_type)
        .bind(&pod.topology_type)
        .bind(&pod.loopback_prefix)
        .bind(&pod.vlan_prefix)
        .bind(&pod.inter_connect_prefix)
        .bind(&pod.management_prefix)
        .bind(&pod.management_start_ip)
        .bind(pod.management_mask.map(i64::from))
        .bind(pod.host_or_vm_count_per_leaf as i64)
        .bind(pod.spine_as as i64)
        .bind(pod.leaf_as as i64)
        .bind(&pod.allocated_loopback_block)
        .bind(&pod.allocated_irb_block)
        .bind(&pod.allocated_inter_connect_block)
        .bind(pod.allocated_spine_as.map(i64::from))
        .bind(pod.allocated_leaf_as.map(i64::from))
        .bind(&pod.inventory_data)
        .bind(pod.state.as_str())
        .bind(pod.created_at)
        .bind(pod.updated_at)
        .execute(conn)
        .await
        .with_context(|| format!("Failed to save pod {}", pod.name))?;
        Ok(())
    }

    pub async fn update_state(pool: &Pool<Sqlite>, id: &str, state: PodState) -> Result<Pod> {
        let result = sqlx::query("UPDATE pods SET state = ?, updated_at = ? WHERE id = ?")
            .bind(state.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(super::NotFoundError::new("Pod", id).into());
        }

        Self::get(pool, id)
            .await?
            .context("Pod not found after update")
    }

    /// Delete a pod; devices and interfaces go with it
    pub async fn delete(pool: &Pool<Sqlite>, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM pods WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(super::NotFoundError::new("Pod", id).into());
        }
        Ok(())
    }
}
