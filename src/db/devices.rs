use anyhow::{Context, Result};
use sqlx::{Pool, Sqlite, SqliteConnection};

use crate::models::*;
use super::row_helpers::{check_seq, map_device_row};

const SELECT_DEVICE: &str = r#"
    SELECT seq, id, name, role, family, mac_address, serial_number, username, password,
           management_ip, asn, deploy_status
    FROM devices
"#;

/// Device database operations
pub struct DeviceRepo;

impl DeviceRepo {
    /// Devices of a pod in creation order
    pub async fn list_by_pod(pool: &Pool<Sqlite>, pod_id: &str) -> Result<Vec<Device>> {
        let rows = sqlx::query(&format!("{} WHERE pod_id = ? ORDER BY seq", SELECT_DEVICE))
            .bind(pod_id)
            .fetch_all(pool)
            .await?;
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                check_seq(row, i, "devices")?;
                map_device_row(row)
            })
            .collect()
    }

    /// Pod that owns a device id, if any
    pub async fn find_pod_of(pool: &Pool<Sqlite>, device_id: &str) -> Result<Option<String>> {
        let pod_id: Option<(String,)> = sqlx::query_as("SELECT pod_id FROM devices WHERE id = ?")
            .bind(device_id)
            .fetch_optional(pool)
            .await?;
        Ok(pod_id.map(|(id,)| id))
    }

    pub async fn upsert(conn: &mut SqliteConnection, pod_id: &str, seq: usize, device: &Device) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO devices (pod_id, seq, id, name, role, family, mac_address, serial_number,
                   username, password, management_ip, asn, deploy_status)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(pod_id, seq) DO UPDATE SET
                   id = excluded.id,
                   name = excluded.name,
                   role = excluded.role,
                   family = excluded.family,
                   mac_address = excluded.mac_address,
                   serial_number = excluded.serial_number,
                   username = excluded.username,
                   password = excluded.password,
                   management_ip = excluded.management_ip,
                   asn = excluded.asn,
                   deploy_status = excluded.deploy_status"#,
        )
        .bind(pod_id)
        .bind(seq as i64)
        .bind(&device.id)
        .bind(&device.name)
        .bind(device.role.as_str())
        .bind(&device.family)
        .bind(&device.mac_address)
        .bind(&device.serial_number)
        .bind(&device.username)
        .bind(&device.password)
        .bind(&device.management_ip)
        .bind(device.asn.map(i64::from))
        .bind(device.deploy_status.as_str())
        .execute(conn)
        .await
        .with_context(|| format!("Failed to save device {}", device.name))?;
        Ok(())
    }
}
