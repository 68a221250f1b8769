//! Periodic fetch scheduling
//!
//! One task drives the whole pipeline: refresh categories, then fetch and
//! reconcile each tracked region in turn. Region failures are isolated; a
//! broken fetch for one region never blocks the rest of the cycle.

use super::categories::CategoryCache;
use super::reconciler::Reconciler;
use crate::config::AppConfig;
use crate::youtube::VideoSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Run one full fetch-and-reconcile cycle across all tracked regions
pub async fn run_fetch_cycle(
    source: &dyn VideoSource,
    reconciler: &Reconciler,
    categories: &CategoryCache,
    config: &AppConfig,
) {
    log::info!(
        "🔄 Fetch cycle starting ({} regions)",
        config.tracked_regions.len()
    );

    // Category refresh failure is non-fatal: stale names beat no names
    let category_map = categories
        .ensure_fresh(source, &config.tracked_regions, config.category_cache_hours)
        .await;

    for region in &config.tracked_regions {
        match source
            .list_trending(region, config.trending_max_results)
            .await
        {
            Ok(items) if items.is_empty() => {
                log::warn!("⚠️  No trending videos returned for {}", region);
            }
            Ok(items) => match reconciler.reconcile(&items, region, &category_map) {
                Ok(summary) => {
                    log::info!(
                        "✅ {}: {} inserted, {} updated, {} spikes, {} skipped",
                        region,
                        summary.inserted,
                        summary.updated,
                        summary.spikes,
                        summary.skipped
                    );
                }
                Err(e) => {
                    log::error!("❌ Reconcile failed for {}: {}", region, e);
                }
            },
            Err(e) => {
                log::error!("❌ Trending fetch failed for {}: {}", region, e);
            }
        }
    }
}

/// Long-running scheduler task
///
/// The first interval tick fires immediately, so startup performs an initial
/// cycle before settling into the configured cadence. Flipping the shutdown
/// channel to true stops the task after the current cycle.
pub async fn fetch_scheduler_task(
    source: Arc<dyn VideoSource>,
    reconciler: Arc<Reconciler>,
    categories: Arc<CategoryCache>,
    config: AppConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    log::info!(
        "⏰ Scheduler started (every {}s, regions: {})",
        config.fetch_interval_secs,
        config.tracked_regions.join(", ")
    );

    let mut timer = tokio::time::interval(Duration::from_secs(config.fetch_interval_secs));

    loop {
        tokio::select! {
            _ = timer.tick() => {
                run_fetch_cycle(source.as_ref(), &reconciler, &categories, &config).await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    log::info!("⏰ Scheduler shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::db::SnapshotStore;
    use crate::youtube::{CategoryInfo, RawVideoItem, SourceError};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use tempfile::NamedTempFile;

    struct StaticSource {
        per_region: HashMap<String, Vec<RawVideoItem>>,
        fail_regions: HashSet<String>,
    }

    #[async_trait]
    impl VideoSource for StaticSource {
        async fn list_trending(
            &self,
            region: &str,
            _max_results: u32,
        ) -> Result<Vec<RawVideoItem>, SourceError> {
            if self.fail_regions.contains(region) {
                return Err(SourceError::Http("scripted outage".to_string()));
            }
            Ok(self.per_region.get(region).cloned().unwrap_or_default())
        }

        async fn list_categories(
            &self,
            _region: &str,
        ) -> Result<HashMap<String, CategoryInfo>, SourceError> {
            Ok(HashMap::from([(
                "10".to_string(),
                CategoryInfo {
                    name: "Music".to_string(),
                    assignable: true,
                },
            )]))
        }
    }

    fn raw_item(id: &str, views: u64) -> RawVideoItem {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "snippet": {
                "title": format!("video {}", id),
                "publishedAt": "2026-08-01T12:00:00Z",
                "categoryId": "10"
            },
            "statistics": {"viewCount": views.to_string()}
        }))
        .unwrap()
    }

    fn test_config(regions: &[&str]) -> AppConfig {
        AppConfig {
            api_key: "test-key".to_string(),
            db_path: ":memory:".to_string(),
            tracked_regions: regions.iter().map(|r| r.to_string()).collect(),
            fetch_interval_secs: 3600,
            category_cache_hours: 24,
            trending_max_results: 50,
            source_timeout_secs: 10,
            reconcile_chunk_size: 100,
            spike_threshold: 0.5,
        }
    }

    #[tokio::test]
    async fn test_cycle_isolates_failing_region() {
        let temp = NamedTempFile::new().unwrap();
        let store = Arc::new(SnapshotStore::open(temp.path().to_str().unwrap()).unwrap());
        let reconciler = Reconciler::new(store.clone(), 100, 0.5);
        let categories = CategoryCache::new(store.clone());

        let source = StaticSource {
            per_region: HashMap::from([
                ("US".to_string(), vec![raw_item("vid1", 500)]),
                ("JP".to_string(), vec![raw_item("vid2", 300)]),
            ]),
            fail_regions: HashSet::from(["US".to_string()]),
        };

        run_fetch_cycle(&source, &reconciler, &categories, &test_config(&["US", "JP"])).await;

        // JP landed despite the US outage
        let jp = store.latest_snapshots("JP", 10, 0).unwrap();
        assert_eq!(jp.len(), 1);
        assert_eq!(jp[0].video_id, "vid2");
        assert_eq!(jp[0].category_name, "Music");
        assert!(store.latest_snapshots("US", 10, 0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cycle_runs_with_empty_region() {
        let temp = NamedTempFile::new().unwrap();
        let store = Arc::new(SnapshotStore::open(temp.path().to_str().unwrap()).unwrap());
        let reconciler = Reconciler::new(store.clone(), 100, 0.5);
        let categories = CategoryCache::new(store.clone());

        let source = StaticSource {
            per_region: HashMap::new(),
            fail_regions: HashSet::new(),
        };

        run_fetch_cycle(&source, &reconciler, &categories, &test_config(&["US"])).await;
        assert!(store.latest_snapshots("US", 10, 0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scheduler_stops_on_shutdown() {
        let temp = NamedTempFile::new().unwrap();
        let store = Arc::new(SnapshotStore::open(temp.path().to_str().unwrap()).unwrap());
        let reconciler = Arc::new(Reconciler::new(store.clone(), 100, 0.5));
        let categories = Arc::new(CategoryCache::new(store.clone()));

        let source: Arc<dyn VideoSource> = Arc::new(StaticSource {
            per_region: HashMap::from([("US".to_string(), vec![raw_item("vid1", 500)])]),
            fail_regions: HashSet::new(),
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(fetch_scheduler_task(
            source,
            reconciler,
            categories,
            test_config(&["US"]),
            shutdown_rx,
        ));

        // Give the immediate first tick time to complete, then stop
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("scheduler did not stop after shutdown signal")
            .unwrap();

        let us = store.latest_snapshots("US", 10, 0).unwrap();
        assert_eq!(us.len(), 1);
    }
}
