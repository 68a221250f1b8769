//! Core data structures mirroring the SQLite schema

use serde::Serialize;

/// Latest known state of one video on one region's trending chart.
/// Exactly one row exists per (video_id, region); ingestion updates it in
/// place.
#[derive(Debug, Clone, Serialize)]
pub struct VideoSnapshot {
    pub video_id: String,
    pub region: String,
    pub title: String,
    pub description: Option<String>,
    /// Unix seconds
    pub published_at: i64,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub category_id: Option<String>,
    pub category_name: String,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub tags: Option<Vec<String>>,
    pub thumbnail_url: Option<String>,
    /// View count stored by the previous run; None for a first sighting
    pub previous_view_count: Option<i64>,
    /// Signed change since the previous run; negative when the source
    /// corrects counts downward
    pub view_count_delta: Option<i64>,
    pub is_viral_spike: bool,
    pub alert_claimed: bool,
    /// Unix seconds, shared by all rows updated in the same run
    pub fetched_at: i64,
}

/// One raw item after parsing and category resolution, ready for the
/// transactional write path.
#[derive(Debug, Clone)]
pub struct ParsedVideo {
    pub video_id: String,
    pub title: String,
    pub description: Option<String>,
    pub published_at: i64,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub category_id: Option<String>,
    pub category_name: String,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub tags: Option<Vec<String>>,
    pub thumbnail_url: Option<String>,
}

/// Fields surfaced when a spike is claimed through the alert ledger
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub video_id: String,
    pub title: String,
    pub region: String,
    pub current_views: i64,
    pub previous_views: i64,
    pub view_change: i64,
    pub fetched_at: i64,
}

/// Per-day metric snapshot, one row per (video_id, region, date)
#[derive(Debug, Clone, Serialize)]
pub struct DailyMetric {
    pub video_id: String,
    pub region: String,
    /// Calendar date, YYYY-MM-DD
    pub date: String,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryEntry {
    pub category_id: String,
    pub category_name: String,
    pub assignable: bool,
    pub last_updated: i64,
}

/// Outcome counters for one reconciled batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub updated: usize,
    pub spikes: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryStats {
    pub total_categories: i64,
    pub cache_last_updated: Option<i64>,
    pub cache_age_hours: Option<f64>,
    pub cache_valid: bool,
}
