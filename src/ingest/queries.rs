//! Read-only query surface over the snapshot store
//!
//! Everything here is a plain SELECT; the serving layer that consumes these
//! lives outside this crate.

use super::db::SnapshotStore;
use super::error::IngestError;
use super::types::{CategoryEntry, CategoryStats, DailyMetric, VideoSnapshot};
use rusqlite::Row;

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<VideoSnapshot> {
    let tags_json: Option<String> = row.get(12)?;
    // Tags are best-effort display data; a corrupt blob degrades to None
    let tags = tags_json.and_then(|blob| serde_json::from_str(&blob).ok());

    Ok(VideoSnapshot {
        video_id: row.get(0)?,
        region: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        published_at: row.get(4)?,
        channel_id: row.get(5)?,
        channel_title: row.get(6)?,
        category_id: row.get(7)?,
        category_name: row.get(8)?,
        view_count: row.get(9)?,
        like_count: row.get(10)?,
        comment_count: row.get(11)?,
        tags,
        thumbnail_url: row.get(13)?,
        previous_view_count: row.get(14)?,
        view_count_delta: row.get(15)?,
        is_viral_spike: row.get::<_, i64>(16)? != 0,
        alert_claimed: row.get::<_, i64>(17)? != 0,
        fetched_at: row.get(18)?,
    })
}

const SNAPSHOT_COLUMNS: &str = "video_id, region, title, description, published_at, \
     channel_id, channel_title, category_id, category_name, \
     view_count, like_count, comment_count, tags_json, thumbnail_url, \
     previous_view_count, view_count_delta, is_viral_spike, alert_claimed, fetched_at";

impl SnapshotStore {
    /// Latest snapshots for one region, newest fetch first, view count as the
    /// tiebreak within a run
    pub fn latest_snapshots(
        &self,
        region: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<VideoSnapshot>, IngestError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {} FROM trending_videos WHERE region = ?1 \
             ORDER BY fetched_at DESC, view_count DESC LIMIT ?2 OFFSET ?3",
            SNAPSHOT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params![region, limit, offset], |row| {
            snapshot_from_row(row)
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Distinct regions with at least one stored snapshot
    pub fn country_codes(&self) -> Result<Vec<String>, IngestError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT DISTINCT region FROM trending_videos ORDER BY region")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Snapshot row counts per region
    pub fn region_counts(&self) -> Result<Vec<(String, i64)>, IngestError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT region, COUNT(*) FROM trending_videos GROUP BY region ORDER BY region",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Daily metric history for one video, oldest date first, limited to the
    /// last `days` calendar days
    pub fn daily_metrics(
        &self,
        video_id: &str,
        region: &str,
        days: u32,
    ) -> Result<Vec<DailyMetric>, IngestError> {
        let cutoff_ts = chrono::Utc::now().timestamp() - i64::from(days) * 86_400;
        let cutoff = chrono::DateTime::from_timestamp(cutoff_ts, 0)
            .ok_or_else(|| IngestError::Database(format!("invalid cutoff {}", cutoff_ts)))?
            .format("%Y-%m-%d")
            .to_string();

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT video_id, region, date, view_count, like_count, comment_count \
             FROM video_daily_metrics \
             WHERE video_id = ?1 AND region = ?2 AND date >= ?3 ORDER BY date",
        )?;
        let rows = stmt.query_map(rusqlite::params![video_id, region, cutoff], |row| {
            Ok(DailyMetric {
                video_id: row.get(0)?,
                region: row.get(1)?,
                date: row.get(2)?,
                view_count: row.get(3)?,
                like_count: row.get(4)?,
                comment_count: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// All cached categories, sorted by display name
    pub fn all_categories(&self) -> Result<Vec<CategoryEntry>, IngestError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT category_id, category_name, assignable, last_updated \
             FROM video_categories ORDER BY category_name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CategoryEntry {
                category_id: row.get(0)?,
                category_name: row.get(1)?,
                assignable: row.get::<_, i64>(2)? != 0,
                last_updated: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Category cache health: size, age, and validity against `max_age_hours`
    pub fn category_stats(&self, max_age_hours: u64) -> Result<CategoryStats, IngestError> {
        let total_categories: i64 = {
            let conn = self.conn.lock().unwrap();
            conn.query_row("SELECT COUNT(*) FROM video_categories", [], |row| row.get(0))?
        };
        let cache_last_updated = self.category_last_updated()?;

        let cache_age_hours = cache_last_updated.map(|last| {
            let age_secs = (chrono::Utc::now().timestamp() - last).max(0);
            age_secs as f64 / 3600.0
        });
        let cache_valid = cache_age_hours
            .map(|age| age <= max_age_hours as f64)
            .unwrap_or(false);

        Ok(CategoryStats {
            total_categories,
            cache_last_updated,
            cache_age_hours,
            cache_valid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::ParsedVideo;
    use crate::youtube::CategoryInfo;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (NamedTempFile, SnapshotStore) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = SnapshotStore::open(temp_file.path().to_str().unwrap()).unwrap();
        (temp_file, store)
    }

    fn make_parsed(video_id: &str, view_count: i64) -> ParsedVideo {
        ParsedVideo {
            video_id: video_id.to_string(),
            title: format!("video {}", video_id),
            description: None,
            published_at: 1_750_000_000,
            channel_id: None,
            channel_title: None,
            category_id: Some("10".to_string()),
            category_name: "Music".to_string(),
            view_count,
            like_count: 1,
            comment_count: 0,
            tags: Some(vec!["tag".to_string()]),
            thumbnail_url: None,
        }
    }

    #[test]
    fn test_latest_snapshots_orders_and_paginates() {
        let (_temp, store) = create_test_store();
        let now = 1_760_000_000;

        store
            .apply_batch(&[make_parsed("old", 50)], "US", now - 3600, 100, 0.5)
            .unwrap();
        let batch = vec![make_parsed("mid", 100), make_parsed("top", 900)];
        store.apply_batch(&batch, "US", now, 100, 0.5).unwrap();

        let page = store.latest_snapshots("US", 2, 0).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].video_id, "top");
        assert_eq!(page[1].video_id, "mid");
        assert_eq!(page[0].tags.as_ref().unwrap()[0], "tag");

        let rest = store.latest_snapshots("US", 2, 2).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].video_id, "old");
    }

    #[test]
    fn test_latest_snapshots_scoped_to_region() {
        let (_temp, store) = create_test_store();
        let now = 1_760_000_000;

        store
            .apply_batch(&[make_parsed("vid1", 100)], "US", now, 100, 0.5)
            .unwrap();
        store
            .apply_batch(&[make_parsed("vid2", 200)], "JP", now, 100, 0.5)
            .unwrap();

        let us = store.latest_snapshots("US", 10, 0).unwrap();
        assert_eq!(us.len(), 1);
        assert_eq!(us[0].video_id, "vid1");
    }

    #[test]
    fn test_country_codes_and_region_counts() {
        let (_temp, store) = create_test_store();
        let now = 1_760_000_000;

        store
            .apply_batch(
                &[make_parsed("vid1", 100), make_parsed("vid2", 200)],
                "US",
                now,
                100,
                0.5,
            )
            .unwrap();
        store
            .apply_batch(&[make_parsed("vid3", 300)], "JP", now, 100, 0.5)
            .unwrap();

        assert_eq!(store.country_codes().unwrap(), vec!["JP", "US"]);
        assert_eq!(
            store.region_counts().unwrap(),
            vec![("JP".to_string(), 1), ("US".to_string(), 2)]
        );
    }

    #[test]
    fn test_daily_metrics_window() {
        let (_temp, store) = create_test_store();
        let now = chrono::Utc::now().timestamp();

        // Ten days ago falls outside a 7-day window, yesterday inside
        store
            .apply_batch(&[make_parsed("vid1", 100)], "US", now - 10 * 86_400, 100, 0.5)
            .unwrap();
        store
            .apply_batch(&[make_parsed("vid1", 500)], "US", now - 86_400, 100, 0.5)
            .unwrap();

        let week = store.daily_metrics("vid1", "US", 7).unwrap();
        assert_eq!(week.len(), 1);
        assert_eq!(week[0].view_count, 500);

        let month = store.daily_metrics("vid1", "US", 30).unwrap();
        assert_eq!(month.len(), 2);
        assert_eq!(month[0].view_count, 100);
    }

    #[test]
    fn test_all_categories_sorted_by_name() {
        let (_temp, store) = create_test_store();
        store
            .save_categories(&HashMap::from([
                (
                    "20".to_string(),
                    CategoryInfo {
                        name: "Gaming".to_string(),
                        assignable: true,
                    },
                ),
                (
                    "10".to_string(),
                    CategoryInfo {
                        name: "Music".to_string(),
                        assignable: false,
                    },
                ),
            ]))
            .unwrap();

        let all = store.all_categories().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].category_name, "Gaming");
        assert_eq!(all[1].category_name, "Music");
        assert!(!all[1].assignable);
    }

    #[test]
    fn test_category_stats() {
        let (_temp, store) = create_test_store();

        let empty = store.category_stats(24).unwrap();
        assert_eq!(empty.total_categories, 0);
        assert!(empty.cache_last_updated.is_none());
        assert!(!empty.cache_valid);

        store
            .save_categories(&HashMap::from([(
                "10".to_string(),
                CategoryInfo {
                    name: "Music".to_string(),
                    assignable: true,
                },
            )]))
            .unwrap();

        let fresh = store.category_stats(24).unwrap();
        assert_eq!(fresh.total_categories, 1);
        assert!(fresh.cache_valid);
        assert!(fresh.cache_age_hours.unwrap() < 1.0);

        // Age the cache past the TTL
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "UPDATE category_cache SET last_updated = last_updated - 90000",
                [],
            )
            .unwrap();
        }
        let stale = store.category_stats(24).unwrap();
        assert!(!stale.cache_valid);
    }
}
