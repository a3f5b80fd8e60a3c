//! Cloud Sync Controller
//!
//! Runs the background sync scheduler over an in-memory store, optionally
//! seeded from `IPAM_SEED_FILE`, with the inventory provider registered.

use anyhow::Context;
use cloud_provider::{InventoryProvider, ProviderRegistry};
use cloud_sync::{LogFormat, Reconciler, SchedulerConfig, SyncScheduler};
use ipam_store::{MemoryStore, Seed};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SchedulerConfig::from_env().context("failed to load configuration")?;
    init_tracing(config.log_format);

    info!("Starting Cloud Sync Controller");
    info!("Configuration:");
    info!("  Tick interval: {:?}", config.tick_interval);
    info!("  Run timeout: {:?}", config.run_timeout);
    info!(
        "  Seed file: {}",
        config
            .seed_file
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    let store = MemoryStore::new();
    if let Some(path) = &config.seed_file {
        let seed = Seed::from_path(path).with_context(|| format!("failed to read seed {}", path.display()))?;
        store
            .load_seed(seed)
            .await
            .with_context(|| format!("failed to load seed {}", path.display()))?;
        info!("Loaded seed from {}", path.display());
    }

    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(InventoryProvider::new()));
    info!("Registered providers: {}", registry.list().join(", "));

    let reconciler = Reconciler::new(Arc::new(store), Arc::new(registry));
    let scheduler = Arc::new(SyncScheduler::new(reconciler, config));

    let signal_scheduler = Arc::clone(&scheduler);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_scheduler.shutdown();
        }
    });

    scheduler.run().await?;
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
}
