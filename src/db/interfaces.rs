use anyhow::{Context, Result};
use sqlx::{Pool, Sqlite, SqliteConnection};

use crate::models::*;
use super::row_helpers::{check_seq, map_ifd_row, map_ifl_row};

/// IFD and IFL database operations
pub struct InterfaceRepo;

impl InterfaceRepo {
    pub async fn list_ifds(pool: &Pool<Sqlite>, pod_id: &str) -> Result<Vec<InterfaceDefinition>> {
        let rows = sqlx::query(
            r#"SELECT seq, device_seq, name, role, lldp_status, peer_seq, layer_above_seq
               FROM ifds WHERE pod_id = ? ORDER BY seq"#,
        )
        .bind(pod_id)
        .fetch_all(pool)
        .await?;
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                check_seq(row, i, "ifds")?;
                map_ifd_row(row)
            })
            .collect()
    }

    pub async fn list_ifls(pool: &Pool<Sqlite>, pod_id: &str) -> Result<Vec<InterfaceLogical>> {
        let rows = sqlx::query(
            r#"SELECT seq, device_seq, name, ip_address, mtu
               FROM ifls WHERE pod_id = ? ORDER BY seq"#,
        )
        .bind(pod_id)
        .fetch_all(pool)
        .await?;
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                check_seq(row, i, "ifls")?;
                map_ifl_row(row)
            })
            .collect()
    }

    pub async fn upsert_ifd(
        conn: &mut SqliteConnection,
        pod_id: &str,
        seq: usize,
        ifd: &InterfaceDefinition,
    ) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO ifds (pod_id, seq, device_seq, name, role, lldp_status, peer_seq, layer_above_seq)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(pod_id, seq) DO UPDATE SET
                   device_seq = excluded.device_seq,
                   name = excluded.name,
                   role = excluded.role,
                   lldp_status = excluded.lldp_status,
                   peer_seq = excluded.peer_seq,
                   layer_above_seq = excluded.layer_above_seq"#,
        )
        .bind(pod_id)
        .bind(seq as i64)
        .bind(ifd.device.0 as i64)
        .bind(&ifd.name)
        .bind(ifd.role.as_str())
        .bind(&ifd.lldp_status)
        .bind(ifd.peer.map(|p| p.0 as i64))
        .bind(ifd.layer_above.map(|l| l.0 as i64))
        .execute(conn)
        .await
        .with_context(|| format!("Failed to save interface {}", ifd.name))?;
        Ok(())
    }

    pub async fn upsert_ifl(
        conn: &mut SqliteConnection,
        pod_id: &str,
        seq: usize,
        ifl: &InterfaceLogical,
    ) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO ifls (pod_id, seq, device_seq, name, ip_address, mtu)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(pod_id, seq) DO UPDATE SET
                   device_seq = excluded.device_seq,
                   name = excluded.name,
                   ip_address = excluded.ip_address,
                   mtu = excluded.mtu"#,
        )
        .bind(pod_id)
        .bind(seq as i64)
        .bind(ifl.device.0 as i64)
        .bind(&ifl.name)
        .bind(&ifl.ip_address)
        .bind(ifl.mtu.map(i64::from))
        .execute(conn)
        .await
        .with_context(|| format!("Failed to save logical interface {}", ifl.name))?;
        Ok(())
    }
}
