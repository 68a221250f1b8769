//! Alert ledger - claiming read path over detected spikes
//!
//! Selecting and marking happen in one transaction, so a row returned by one
//! claim call can never be returned again by a concurrent or subsequent call
//! until a fresh spike resets it.

use super::db::SnapshotStore;
use super::error::IngestError;
use super::types::AlertRecord;
use std::sync::Arc;

pub struct AlertLedger {
    store: Arc<SnapshotStore>,
}

impl AlertLedger {
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        Self { store }
    }

    /// Claim all unclaimed spike rows, optionally filtered by region and by
    /// fetched_at >= since
    ///
    /// At-most-once delivery: every returned row's claim flag flips in the
    /// same transaction that produced the read set. If persisting the flip
    /// fails, the whole call fails, nothing is claimed, and the spikes remain
    /// claimable on retry.
    pub fn claim_alerts(
        &self,
        region: Option<&str>,
        since: Option<i64>,
    ) -> Result<Vec<AlertRecord>, IngestError> {
        let mut conn = self.store.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let mut sql = String::from(
            "SELECT video_id, title, region, view_count, previous_view_count, \
             view_count_delta, fetched_at FROM trending_videos \
             WHERE is_viral_spike = 1 AND alert_claimed = 0",
        );
        let mut bind: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(region) = region {
            sql.push_str(" AND region = ?");
            bind.push(Box::new(region.to_string()));
        }
        if let Some(since) = since {
            sql.push_str(" AND fetched_at >= ?");
            bind.push(Box::new(since));
        }

        let alerts: Vec<AlertRecord> = {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(bind.iter().map(|param| param.as_ref())),
                |row| {
                    Ok(AlertRecord {
                        video_id: row.get(0)?,
                        title: row.get(1)?,
                        region: row.get(2)?,
                        current_views: row.get(3)?,
                        previous_views: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
                        view_change: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                        fetched_at: row.get(6)?,
                    })
                },
            )?;
            rows.collect::<Result<_, _>>()?
        };

        for alert in &alerts {
            tx.execute(
                "UPDATE trending_videos SET alert_claimed = 1 \
                 WHERE video_id = ?1 AND region = ?2",
                rusqlite::params![alert.video_id, alert.region],
            )?;
        }

        tx.commit()?;
        Ok(alerts)
    }
}
