//! Category cache with TTL-driven refresh
//!
//! The whole id -> name mapping is cached twice: as a single-row JSON blob
//! for fast whole-cache loads, and as exploded per-id rows for querying.
//! Both are replaced wholesale on refresh. A failed refresh is non-fatal:
//! ingestion keeps whatever mapping is currently loaded, and unresolved ids
//! fall back to "Unknown" downstream.

use super::db::SnapshotStore;
use super::error::IngestError;
use crate::youtube::{CategoryInfo, VideoSource};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

impl SnapshotStore {
    /// Replace both the blob cache and the exploded rows in one transaction
    pub fn save_categories(
        &self,
        categories: &HashMap<String, CategoryInfo>,
    ) -> Result<(), IngestError> {
        let now = chrono::Utc::now().timestamp();
        let blob = serde_json::to_string(categories)
            .map_err(|e| IngestError::Database(e.to_string()))?;

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM category_cache", [])?;
        tx.execute(
            "INSERT INTO category_cache (id, categories_json, last_updated) VALUES (1, ?1, ?2)",
            rusqlite::params![blob, now],
        )?;

        tx.execute("DELETE FROM video_categories", [])?;
        for (category_id, info) in categories {
            tx.execute(
                "INSERT INTO video_categories (category_id, category_name, assignable, last_updated) \
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![category_id, info.name, info.assignable, now],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Load the whole-cache blob with its last-updated timestamp
    ///
    /// An unparsable blob is treated as absent rather than an error.
    pub fn load_category_blob(
        &self,
    ) -> Result<Option<(HashMap<String, CategoryInfo>, i64)>, IngestError> {
        use rusqlite::OptionalExtension;

        let conn = self.conn.lock().unwrap();
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT categories_json, last_updated FROM category_cache WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(row.and_then(|(blob, last_updated)| {
            match serde_json::from_str::<HashMap<String, CategoryInfo>>(&blob) {
                Ok(map) => Some((map, last_updated)),
                Err(e) => {
                    log::warn!("⚠️  Discarding unparsable category cache blob: {}", e);
                    None
                }
            }
        }))
    }

    pub fn category_last_updated(&self) -> Result<Option<i64>, IngestError> {
        use rusqlite::OptionalExtension;

        let conn = self.conn.lock().unwrap();
        let last = conn
            .query_row(
                "SELECT last_updated FROM category_cache WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(last)
    }
}

/// Thread-safe category mapping with TTL refresh
///
/// State machine: NoCache -> fetch -> Fresh -> TTL expiry -> Stale -> fetch
/// -> Fresh; Stale persists indefinitely while fetches keep failing.
pub struct CategoryCache {
    store: Arc<SnapshotStore>,
    map: Mutex<HashMap<String, CategoryInfo>>,
}

impl CategoryCache {
    /// Create the cache, warm-starting from any persisted blob regardless of
    /// its age (a stale mapping beats an empty one)
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        let map = match store.load_category_blob() {
            Ok(Some((map, _))) => {
                log::info!("📦 Loaded {} video categories from cache", map.len());
                map
            }
            Ok(None) => HashMap::new(),
            Err(e) => {
                log::warn!("⚠️  Could not load category cache: {}", e);
                HashMap::new()
            }
        };

        Self {
            store,
            map: Mutex::new(map),
        }
    }

    /// Current id -> name mapping without any refresh
    pub fn name_map(&self) -> HashMap<String, String> {
        self.map
            .lock()
            .unwrap()
            .iter()
            .map(|(id, info)| (id.clone(), info.name.clone()))
            .collect()
    }

    /// Return a fresh mapping, refreshing from the source if the persisted
    /// cache is absent or older than `max_age_hours`
    ///
    /// Region results merge with later regions overriding earlier ones on id
    /// collision. If every region's fetch fails, the previous mapping stays
    /// in use.
    pub async fn ensure_fresh(
        &self,
        source: &dyn VideoSource,
        regions: &[String],
        max_age_hours: u64,
    ) -> HashMap<String, String> {
        let max_age_secs = (max_age_hours as i64).saturating_mul(3600);
        let now = chrono::Utc::now().timestamp();

        let stale = match self.store.category_last_updated() {
            Ok(Some(last_updated)) => now - last_updated > max_age_secs,
            Ok(None) => true,
            Err(e) => {
                log::warn!("⚠️  Category cache age check failed: {}", e);
                true
            }
        };

        if !stale {
            // Fresh on disk but possibly cold in memory after a restart
            let cold = self.map.lock().unwrap().is_empty();
            if cold {
                if let Ok(Some((map, _))) = self.store.load_category_blob() {
                    *self.map.lock().unwrap() = map;
                }
            }
            return self.name_map();
        }

        log::info!("🔄 Category cache stale, refreshing ({} regions)", regions.len());

        let mut merged: HashMap<String, CategoryInfo> = HashMap::new();
        for region in regions {
            match source.list_categories(region).await {
                Ok(categories) => {
                    log::debug!("   ├─ {}: {} categories", region, categories.len());
                    merged.extend(categories);
                }
                Err(e) => {
                    log::warn!("⚠️  Category fetch failed for {}: {}", region, e);
                }
            }
        }

        if merged.is_empty() {
            log::warn!("⚠️  Category refresh yielded nothing, keeping previous mapping");
            return self.name_map();
        }

        match self.store.save_categories(&merged) {
            Ok(()) => {
                log::info!("✅ Cached {} video categories", merged.len());
                *self.map.lock().unwrap() = merged;
            }
            Err(e) => {
                // Blob stays stale, so the next cycle retries the refresh
                log::error!("❌ Failed to persist categories: {}", e);
            }
        }

        self.name_map()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::youtube::{RawVideoItem, SourceError};
    use async_trait::async_trait;
    use tempfile::NamedTempFile;

    struct MapSource {
        per_region: HashMap<String, HashMap<String, CategoryInfo>>,
        fail: bool,
    }

    #[async_trait]
    impl VideoSource for MapSource {
        async fn list_trending(
            &self,
            _region: &str,
            _max_results: u32,
        ) -> Result<Vec<RawVideoItem>, SourceError> {
            Ok(Vec::new())
        }

        async fn list_categories(
            &self,
            region: &str,
        ) -> Result<HashMap<String, CategoryInfo>, SourceError> {
            if self.fail {
                return Err(SourceError::Http("scripted outage".to_string()));
            }
            Ok(self.per_region.get(region).cloned().unwrap_or_default())
        }
    }

    fn info(name: &str) -> CategoryInfo {
        CategoryInfo {
            name: name.to_string(),
            assignable: true,
        }
    }

    fn test_store() -> (NamedTempFile, Arc<SnapshotStore>) {
        let temp = NamedTempFile::new().unwrap();
        let store = Arc::new(SnapshotStore::open(temp.path().to_str().unwrap()).unwrap());
        (temp, store)
    }

    fn age_cache(store: &SnapshotStore, secs: i64) {
        let conn = store.conn.lock().unwrap();
        conn.execute(
            "UPDATE category_cache SET last_updated = last_updated - ?1",
            rusqlite::params![secs],
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_refresh_populates_blob_and_rows() {
        let (_temp, store) = test_store();
        let cache = CategoryCache::new(store.clone());

        let source = MapSource {
            per_region: HashMap::from([(
                "US".to_string(),
                HashMap::from([("10".to_string(), info("Music"))]),
            )]),
            fail: false,
        };

        let map = cache
            .ensure_fresh(&source, &["US".to_string()], 24)
            .await;
        assert_eq!(map.get("10").map(String::as_str), Some("Music"));

        let (blob, _) = store.load_category_blob().unwrap().unwrap();
        assert_eq!(blob.len(), 1);

        let conn = store.conn.lock().unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM video_categories", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_source() {
        let (_temp, store) = test_store();
        store
            .save_categories(&HashMap::from([("10".to_string(), info("Music"))]))
            .unwrap();

        // A failing source proves no fetch happens while the cache is fresh
        let source = MapSource {
            per_region: HashMap::new(),
            fail: true,
        };

        let cache = CategoryCache::new(store);
        let map = cache
            .ensure_fresh(&source, &["US".to_string()], 24)
            .await;
        assert_eq!(map.get("10").map(String::as_str), Some("Music"));
    }

    #[tokio::test]
    async fn test_stale_cache_refetches() {
        let (_temp, store) = test_store();
        store
            .save_categories(&HashMap::from([("10".to_string(), info("Old Name"))]))
            .unwrap();
        age_cache(&store, 25 * 3600);

        let source = MapSource {
            per_region: HashMap::from([(
                "US".to_string(),
                HashMap::from([("10".to_string(), info("New Name"))]),
            )]),
            fail: false,
        };

        let cache = CategoryCache::new(store);
        let map = cache
            .ensure_fresh(&source, &["US".to_string()], 24)
            .await;
        assert_eq!(map.get("10").map(String::as_str), Some("New Name"));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_mapping() {
        let (_temp, store) = test_store();
        store
            .save_categories(&HashMap::from([("10".to_string(), info("Music"))]))
            .unwrap();
        age_cache(&store, 25 * 3600);

        let source = MapSource {
            per_region: HashMap::new(),
            fail: true,
        };

        let cache = CategoryCache::new(store);
        let map = cache
            .ensure_fresh(&source, &["US".to_string(), "JP".to_string()], 24)
            .await;

        // Stale mapping remains in use
        assert_eq!(map.get("10").map(String::as_str), Some("Music"));
    }

    #[tokio::test]
    async fn test_later_regions_override_on_collision() {
        let (_temp, store) = test_store();
        let cache = CategoryCache::new(store);

        let source = MapSource {
            per_region: HashMap::from([
                (
                    "US".to_string(),
                    HashMap::from([
                        ("10".to_string(), info("Music")),
                        ("20".to_string(), info("Gaming")),
                    ]),
                ),
                (
                    "JP".to_string(),
                    HashMap::from([("10".to_string(), info("音楽"))]),
                ),
            ]),
            fail: false,
        };

        let map = cache
            .ensure_fresh(&source, &["US".to_string(), "JP".to_string()], 24)
            .await;

        assert_eq!(map.get("10").map(String::as_str), Some("音楽"));
        assert_eq!(map.get("20").map(String::as_str), Some("Gaming"));
    }
}
