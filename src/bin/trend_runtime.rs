//! Trend tracking runtime
//!
//! Wires the YouTube client, snapshot store, and scheduler together and runs
//! until CTRL+C.

use std::sync::Arc;
use tokio::sync::watch;
use trendwatch::ingest::scheduler::fetch_scheduler_task;
use trendwatch::{AppConfig, CategoryCache, Reconciler, SnapshotStore, VideoSource, YouTubeClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::init();

    log::info!("🚀 Starting trend tracking runtime...");

    let config = AppConfig::from_env()?;
    log::info!("📋 Configuration:");
    log::info!("   ├─ Database: {}", config.db_path);
    log::info!("   ├─ Regions: {}", config.tracked_regions.join(", "));
    log::info!("   ├─ Fetch interval: {}s", config.fetch_interval_secs);
    log::info!("   ├─ Max results/region: {}", config.trending_max_results);
    log::info!("   └─ Spike threshold: {}", config.spike_threshold);

    let store = Arc::new(SnapshotStore::open(&config.db_path)?);
    let source: Arc<dyn VideoSource> = Arc::new(YouTubeClient::new(
        &config.api_key,
        config.source_timeout_secs,
    )?);
    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        config.reconcile_chunk_size,
        config.spike_threshold,
    ));
    let categories = Arc::new(CategoryCache::new(store.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = tokio::spawn(fetch_scheduler_task(
        source,
        reconciler,
        categories,
        config,
        shutdown_rx,
    ));

    log::info!("🔄 Runtime started. Press CTRL+C to shutdown gracefully");

    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("🛑 Shutdown signal received"),
        Err(e) => log::error!("❌ Failed to listen for shutdown signal: {}", e),
    }

    shutdown_tx.send(true).ok();
    scheduler.await?;

    log::info!("✅ Runtime stopped");
    Ok(())
}
