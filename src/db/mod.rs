mod devices;
mod interfaces;
mod pods;
pub(crate) mod row_helpers;

use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};

use crate::models::*;
use crate::topology::Fabric;

/// Typed error for "resource not found", enabling a reliable downcast
/// in the service layer instead of fragile string matching.
#[derive(Debug)]
pub struct NotFoundError {
    pub resource: String,
    pub id: String,
}

impl NotFoundError {
    pub fn new(resource: &str, id: &str) -> Self {
        Self {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }
}

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} not found: {}", self.resource, self.id)
    }
}

impl std::error::Error for NotFoundError {}

/// Store handles all database operations, delegating to per-entity repo modules.
#[derive(Clone)]
pub struct Store {
    pool: Pool<Sqlite>,
}

impl Store {
    /// Create a new database store with the default pool size
    pub async fn new(db_path: &str) -> Result<Self> {
        Self::with_pool_size(db_path, 5).await
    }

    /// Create a new database store with a specific pool size
    pub async fn with_pool_size(db_path: &str, max_connections: u32) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&db_url)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    // ========== Pod Operations ==========

    pub async fn list_pods(&self) -> Result<Vec<Pod>> {
        pods::PodRepo::list(&self.pool).await
    }

    pub async fn get_pod(&self, id: &str) -> Result<Option<Pod>> {
        pods::PodRepo::get(&self.pool, id).await
    }

    pub async fn get_pod_by_name(&self, name: &str) -> Result<Option<Pod>> {
        pods::PodRepo::get_by_name(&self.pool, name).await
    }

    pub async fn update_pod_state(&self, id: &str, state: PodState) -> Result<Pod> {
        pods::PodRepo::update_state(&self.pool, id, state).await
    }

    pub async fn delete_pod(&self, id: &str) -> Result<()> {
        pods::PodRepo::delete(&self.pool, id).await
    }

    // ========== Device Operations ==========

    pub async fn find_device_pod(&self, device_id: &str) -> Result<Option<String>> {
        devices::DeviceRepo::find_pod_of(&self.pool, device_id).await
    }

    // ========== Fabric Operations ==========

    /// Load a pod together with its devices and interfaces
    pub async fn load_fabric(&self, pod_id: &str) -> Result<Fabric> {
        let pod = self
            .get_pod(pod_id)
            .await?
            .ok_or_else(|| NotFoundError::new("Pod", pod_id))?;

        let devices = devices::DeviceRepo::list_by_pod(&self.pool, pod_id).await?;
        let ifds = interfaces::InterfaceRepo::list_ifds(&self.pool, pod_id).await?;
        let ifls = interfaces::InterfaceRepo::list_ifls(&self.pool, pod_id).await?;

        let fabric = Fabric::from_parts(pod, devices, ifds, ifls)
            .with_context(|| format!("Stored fabric of pod {} is inconsistent", pod_id))?;
        Ok(fabric)
    }

    /// Persist a whole fabric in one transaction. Rows are upserted by
    /// `(pod_id, seq)`, so the arena index is the row key.
    pub async fn save_fabric(&self, fabric: &Fabric) -> Result<()> {
        let pod = fabric.pod();
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        pods::PodRepo::upsert(&mut tx, pod).await?;
        for (seq, device) in fabric.devices().iter().enumerate() {
            devices::DeviceRepo::upsert(&mut tx, &pod.id, seq, device).await?;
        }
        for (seq, ifd) in fabric.ifds().iter().enumerate() {
            interfaces::InterfaceRepo::upsert_ifd(&mut tx, &pod.id, seq, ifd).await?;
        }
        for (seq, ifl) in fabric.ifls().iter().enumerate() {
            interfaces::InterfaceRepo::upsert_ifl(&mut tx, &pod.id, seq, ifl).await?;
        }

        tx.commit().await.context("Failed to commit fabric")?;
        tracing::debug!(
            "Saved pod {}: {} devices, {} ifds, {} ifls",
            pod.name,
            fabric.devices().len(),
            fabric.ifds().len(),
            fabric.ifls().len()
        );
        Ok(())
    }
}
