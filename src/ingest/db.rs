//! SQLite store for trending snapshots
//!
//! Tables:
//! - `trending_videos` - UPSERT on (video_id, region), latest state per video
//! - `video_daily_metrics` - UPSERT on (video_id, region, date)
//! - `video_categories` - exploded category rows, replaced on refresh
//! - `category_cache` - single-row whole-map cache, replaced on refresh
//!
//! All rows affected by one batch commit atomically: the chunked write path
//! runs inside a single transaction, and any failure rolls the whole batch
//! back.

use super::error::IngestError;
use super::reconciler::compute_transition;
use super::types::{ParsedVideo, ReconcileSummary};
use rusqlite::{Connection, Transaction};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS trending_videos (
    video_id            TEXT NOT NULL,
    region              TEXT NOT NULL,
    title               TEXT NOT NULL,
    description         TEXT,
    published_at        INTEGER NOT NULL,
    channel_id          TEXT,
    channel_title       TEXT,
    category_id         TEXT,
    category_name       TEXT NOT NULL DEFAULT 'Unknown',
    view_count          INTEGER NOT NULL DEFAULT 0,
    like_count          INTEGER NOT NULL DEFAULT 0,
    comment_count       INTEGER NOT NULL DEFAULT 0,
    tags_json           TEXT,
    thumbnail_url       TEXT,
    previous_view_count INTEGER,
    view_count_delta    INTEGER,
    is_viral_spike      INTEGER NOT NULL DEFAULT 0,
    alert_claimed       INTEGER NOT NULL DEFAULT 0,
    fetched_at          INTEGER NOT NULL,
    PRIMARY KEY (video_id, region)
);

CREATE INDEX IF NOT EXISTS idx_trending_region_fetched
    ON trending_videos (region, fetched_at DESC);

CREATE INDEX IF NOT EXISTS idx_trending_unclaimed_spikes
    ON trending_videos (is_viral_spike, alert_claimed);

CREATE TABLE IF NOT EXISTS video_daily_metrics (
    video_id        TEXT NOT NULL,
    region          TEXT NOT NULL,
    date            TEXT NOT NULL,
    view_count      INTEGER NOT NULL DEFAULT 0,
    like_count      INTEGER NOT NULL DEFAULT 0,
    comment_count   INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (video_id, region, date)
);

CREATE TABLE IF NOT EXISTS video_categories (
    category_id     TEXT PRIMARY KEY,
    category_name   TEXT NOT NULL,
    assignable      INTEGER NOT NULL DEFAULT 1,
    last_updated    INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS category_cache (
    id              INTEGER PRIMARY KEY CHECK (id = 1),
    categories_json TEXT NOT NULL,
    last_updated    INTEGER NOT NULL
);
"#;

struct ExistingRow {
    view_count: i64,
    alert_claimed: bool,
}

/// SQLite-backed snapshot store
///
/// All access serializes on one connection; the storage layer's transaction
/// isolation is the only concurrency guard between the scheduled writer and
/// read queries.
pub struct SnapshotStore {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl SnapshotStore {
    /// Open (or create) the database and run idempotent schema migrations
    pub fn open(db_path: &str) -> Result<Self, IngestError> {
        let conn = Connection::open(db_path)?;

        // WAL keeps read queries responsive while a batch commits
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;

        log::info!("📊 Database ready at {}", db_path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Apply one region's reconciled batch in a single transaction
    ///
    /// Items must already be deduplicated by video id. The batch is
    /// partitioned into `chunk_size` chunks purely to bound the size of the
    /// existing-state lookup; chunk boundaries do not change the result.
    ///
    /// Per item:
    /// - absent from the store: insert, spike = false, delta fields NULL
    /// - present: previous/delta recomputed against the stored view count,
    ///   spike classified by `compute_transition`, alert_claimed reset on a
    ///   fresh spike and preserved otherwise
    pub fn apply_batch(
        &self,
        items: &[ParsedVideo],
        region: &str,
        fetched_at: i64,
        chunk_size: usize,
        spike_threshold: f64,
    ) -> Result<ReconcileSummary, IngestError> {
        let date = chrono::DateTime::from_timestamp(fetched_at, 0)
            .ok_or_else(|| IngestError::Database(format!("invalid fetched_at {}", fetched_at)))?
            .format("%Y-%m-%d")
            .to_string();

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let mut summary = ReconcileSummary::default();

        for chunk in items.chunks(chunk_size.max(1)) {
            let existing = Self::load_existing(&tx, region, chunk)?;

            for item in chunk {
                let prior = existing.get(&item.video_id);
                let transition = compute_transition(
                    prior.map(|row| row.view_count),
                    prior.map(|row| row.alert_claimed).unwrap_or(false),
                    item.view_count,
                    spike_threshold,
                );

                Self::upsert_snapshot(&tx, item, region, fetched_at, &transition)?;
                Self::upsert_daily_metric(&tx, item, region, &date)?;

                if prior.is_some() {
                    summary.updated += 1;
                } else {
                    summary.inserted += 1;
                }
                if transition.is_viral_spike {
                    summary.spikes += 1;
                }
            }
        }

        tx.commit()?;
        Ok(summary)
    }

    fn load_existing(
        tx: &Transaction<'_>,
        region: &str,
        chunk: &[ParsedVideo],
    ) -> Result<HashMap<String, ExistingRow>, IngestError> {
        if chunk.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "SELECT video_id, view_count, alert_claimed FROM trending_videos \
             WHERE region = ? AND video_id IN ({})",
            placeholders
        );

        let mut bind: Vec<String> = Vec::with_capacity(chunk.len() + 1);
        bind.push(region.to_string());
        bind.extend(chunk.iter().map(|item| item.video_id.clone()));

        let mut stmt = tx.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(bind.iter()))?;

        let mut map = HashMap::new();
        while let Some(row) = rows.next()? {
            let video_id: String = row.get(0)?;
            map.insert(
                video_id,
                ExistingRow {
                    view_count: row.get(1)?,
                    alert_claimed: row.get::<_, i64>(2)? != 0,
                },
            );
        }

        Ok(map)
    }

    fn upsert_snapshot(
        tx: &Transaction<'_>,
        item: &ParsedVideo,
        region: &str,
        fetched_at: i64,
        transition: &super::reconciler::SnapshotTransition,
    ) -> Result<(), IngestError> {
        let tags_json = match &item.tags {
            Some(tags) => Some(
                serde_json::to_string(tags)
                    .map_err(|e| IngestError::Database(e.to_string()))?,
            ),
            None => None,
        };

        tx.execute(
            r#"
            INSERT INTO trending_videos (
                video_id, region, title, description, published_at,
                channel_id, channel_title, category_id, category_name,
                view_count, like_count, comment_count, tags_json, thumbnail_url,
                previous_view_count, view_count_delta, is_viral_spike,
                alert_claimed, fetched_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            ON CONFLICT(video_id, region) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                published_at = excluded.published_at,
                channel_id = excluded.channel_id,
                channel_title = excluded.channel_title,
                category_id = excluded.category_id,
                category_name = excluded.category_name,
                view_count = excluded.view_count,
                like_count = excluded.like_count,
                comment_count = excluded.comment_count,
                tags_json = excluded.tags_json,
                thumbnail_url = excluded.thumbnail_url,
                previous_view_count = excluded.previous_view_count,
                view_count_delta = excluded.view_count_delta,
                is_viral_spike = excluded.is_viral_spike,
                alert_claimed = excluded.alert_claimed,
                fetched_at = excluded.fetched_at
            "#,
            rusqlite::params![
                item.video_id,
                region,
                item.title,
                item.description,
                item.published_at,
                item.channel_id,
                item.channel_title,
                item.category_id,
                item.category_name,
                item.view_count,
                item.like_count,
                item.comment_count,
                tags_json,
                item.thumbnail_url,
                transition.previous_view_count,
                transition.view_count_delta,
                transition.is_viral_spike,
                transition.alert_claimed,
                fetched_at,
            ],
        )?;

        Ok(())
    }

    fn upsert_daily_metric(
        tx: &Transaction<'_>,
        item: &ParsedVideo,
        region: &str,
        date: &str,
    ) -> Result<(), IngestError> {
        tx.execute(
            r#"
            INSERT INTO video_daily_metrics (
                video_id, region, date, view_count, like_count, comment_count
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(video_id, region, date) DO UPDATE SET
                view_count = excluded.view_count,
                like_count = excluded.like_count,
                comment_count = excluded.comment_count
            "#,
            rusqlite::params![
                item.video_id,
                region,
                date,
                item.view_count,
                item.like_count,
                item.comment_count,
            ],
        )?;

        Ok(())
    }
}
