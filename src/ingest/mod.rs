//! Trending ingestion pipeline
//!
//! Flow per cycle:
//!   VideoSource -> Reconciler (parse, dedup, classify) -> SnapshotStore
//!                                                      -> AlertLedger (claims)
//!
//! The store keeps latest-state rows keyed by (video_id, region); history is
//! condensed into one daily metric row per calendar day. The scheduler drives
//! cycles at a fixed interval until shutdown.

pub mod alerts;
pub mod categories;
pub mod db;
pub mod error;
pub mod queries;
pub mod reconciler;
pub mod scheduler;
pub mod types;

pub use alerts::AlertLedger;
pub use categories::CategoryCache;
pub use db::SnapshotStore;
pub use error::IngestError;
pub use reconciler::Reconciler;
pub use types::{
    AlertRecord, CategoryEntry, CategoryStats, DailyMetric, ParsedVideo, ReconcileSummary,
    VideoSnapshot,
};
