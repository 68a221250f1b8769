//! Snapshot reconciliation - merges fetched batches into persisted state
//!
//! One reconciliation routine serves both small and large batches; the only
//! bulk-mode knob is the chunk size forwarded to the store, which never
//! changes the computed result.

use super::db::SnapshotStore;
use super::error::IngestError;
use super::types::{ParsedVideo, ReconcileSummary};
use crate::youtube::RawVideoItem;
use std::collections::HashMap;
use std::sync::Arc;

/// Derived fields for one snapshot row, computed from the previously stored
/// state and the freshly fetched view count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotTransition {
    pub previous_view_count: Option<i64>,
    pub view_count_delta: Option<i64>,
    pub is_viral_spike: bool,
    pub alert_claimed: bool,
}

/// Classify the transition from the stored view count to the new one
///
/// - First sighting: no delta, no spike.
/// - Known video: delta is signed; a spike requires a prior count above zero
///   and a relative increase of at least `threshold` (>=, so exactly 50%
///   qualifies at the default).
/// - A fresh spike resets the claim flag so each qualifying spike event is
///   alertable once, including repeats; otherwise the stored flag survives.
pub fn compute_transition(
    old_view_count: Option<i64>,
    old_alert_claimed: bool,
    new_view_count: i64,
    threshold: f64,
) -> SnapshotTransition {
    match old_view_count {
        None => SnapshotTransition {
            previous_view_count: None,
            view_count_delta: None,
            is_viral_spike: false,
            alert_claimed: false,
        },
        Some(old) => {
            let delta = new_view_count - old;
            let is_spike = old > 0 && (delta as f64 / old as f64) >= threshold;

            SnapshotTransition {
                previous_view_count: Some(old),
                view_count_delta: Some(delta),
                is_viral_spike: is_spike,
                alert_claimed: if is_spike { false } else { old_alert_claimed },
            }
        }
    }
}

/// Parse one raw item into its persisted form
///
/// `id` and `snippet.publishedAt` are required; counts are coerced from the
/// source's string-or-absent encoding with a default of 0; an unresolved
/// category id maps to "Unknown" rather than failing.
pub fn parse_raw_item(
    item: &RawVideoItem,
    categories: &HashMap<String, String>,
) -> Result<ParsedVideo, IngestError> {
    let video_id = item
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| IngestError::MalformedItem("missing video id".to_string()))?;

    let snippet = item.snippet.clone().unwrap_or_default();
    let statistics = item.statistics.clone().unwrap_or_default();

    let published_raw = snippet.published_at.ok_or_else(|| {
        IngestError::MalformedItem(format!("{}: missing publishedAt", video_id))
    })?;
    let published_at = chrono::DateTime::parse_from_rfc3339(&published_raw)
        .map_err(|e| {
            IngestError::MalformedItem(format!("{}: bad publishedAt: {}", video_id, e))
        })?
        .with_timezone(&chrono::Utc)
        .timestamp();

    let category_id = snippet.category_id;
    let category_name = category_id
        .as_deref()
        .and_then(|id| categories.get(id).cloned())
        .unwrap_or_else(|| "Unknown".to_string());

    Ok(ParsedVideo {
        video_id,
        title: snippet.title.unwrap_or_default(),
        description: snippet.description,
        published_at,
        channel_id: snippet.channel_id,
        channel_title: snippet.channel_title,
        category_id,
        category_name,
        view_count: parse_count(statistics.view_count.as_deref()),
        like_count: parse_count(statistics.like_count.as_deref()),
        comment_count: parse_count(statistics.comment_count.as_deref()),
        tags: snippet.tags,
        thumbnail_url: snippet
            .thumbnails
            .and_then(|t| t.high)
            .and_then(|h| h.url),
    })
}

fn parse_count(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.parse::<i64>().ok())
        .map(|v| v.max(0))
        .unwrap_or(0)
}

/// Reconciles fetched batches against the store
pub struct Reconciler {
    store: Arc<SnapshotStore>,
    chunk_size: usize,
    spike_threshold: f64,
}

impl Reconciler {
    pub fn new(store: Arc<SnapshotStore>, chunk_size: usize, spike_threshold: f64) -> Self {
        Self {
            store,
            chunk_size,
            spike_threshold,
        }
    }

    /// Reconcile one region's batch with fetched_at = now
    pub fn reconcile(
        &self,
        batch: &[RawVideoItem],
        region: &str,
        categories: &HashMap<String, String>,
    ) -> Result<ReconcileSummary, IngestError> {
        self.reconcile_at(batch, region, categories, chrono::Utc::now().timestamp())
    }

    /// Reconcile with an explicit batch timestamp
    ///
    /// The timestamp is assigned once per invocation so every row touched by
    /// the same run shares it. Malformed items are skipped (counted in the
    /// summary) without failing the batch; duplicate ids collapse to the
    /// last occurrence before any state is touched.
    pub fn reconcile_at(
        &self,
        batch: &[RawVideoItem],
        region: &str,
        categories: &HashMap<String, String>,
        fetched_at: i64,
    ) -> Result<ReconcileSummary, IngestError> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut parsed: Vec<ParsedVideo> = Vec::with_capacity(batch.len());
        let mut skipped = 0usize;

        for item in batch {
            match parse_raw_item(item, categories) {
                Ok(video) => {
                    if let Some(&slot) = index.get(&video.video_id) {
                        parsed[slot] = video;
                    } else {
                        index.insert(video.video_id.clone(), parsed.len());
                        parsed.push(video);
                    }
                }
                Err(e) => {
                    skipped += 1;
                    log::warn!("⚠️  Skipping trending item for {}: {}", region, e);
                }
            }
        }

        let mut summary = self.store.apply_batch(
            &parsed,
            region,
            fetched_at,
            self.chunk_size,
            self.spike_threshold,
        )?;
        summary.skipped = skipped;
        Ok(summary)
    }
}
