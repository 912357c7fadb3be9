use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fabric_provision::catalog::DeviceSkuCatalog;
use fabric_provision::config::Config;
use fabric_provision::db::Store;
use fabric_provision::engine::Engine;
use fabric_provision::models::PodRequest;
use fabric_provision::services::PodService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fabric_provision=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let cfg = Config::load();
    tracing::info!("Starting fabric provisioning");
    tracing::info!("Database: {}", cfg.db_path);
    tracing::info!("Pod file: {}", cfg.pod_file);

    let catalog = match &cfg.catalog_path {
        Some(path) => {
            tracing::info!("Device catalog: {}", path);
            DeviceSkuCatalog::from_file(path)?
        }
        None => DeviceSkuCatalog::builtin().context("Built-in device catalog is invalid")?,
    };

    // Initialize database
    let store = Store::with_pool_size(&cfg.db_path, cfg.db_max_connections).await?;
    tracing::info!("Database initialized (pool_size={})", cfg.db_max_connections);

    let engine = Engine::new(Arc::new(catalog), cfg.engine_settings());
    let service = PodService::new(store, engine);

    let content = tokio::fs::read_to_string(&cfg.pod_file)
        .await
        .with_context(|| format!("Failed to read pod file {}", cfg.pod_file))?;
    let request: PodRequest = serde_json::from_str(&content)
        .with_context(|| format!("Invalid pod file {}", cfg.pod_file))?;

    let result = service.apply(&request).await?;
    let fabric = &result.fabric;
    let pod = fabric.pod();
    tracing::info!(
        "Pod {} ({}): {:?}, state {}, {} devices, {} interfaces, {} changes",
        pod.name,
        pod.id,
        result.outcome,
        pod.state.as_str(),
        fabric.devices().len(),
        fabric.ifds().len(),
        fabric.changes().len()
    );
    for device in fabric.devices() {
        tracing::info!(
            "  {} {} family={} mgmt={} asn={}",
            device.role,
            device.name,
            device.family.as_deref().unwrap_or("pending"),
            device.management_ip.as_deref().unwrap_or("-"),
            device.asn.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string())
        );
    }

    Ok(())
}
