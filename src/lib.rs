pub mod config;
pub mod ingest;
pub mod youtube;

pub use config::AppConfig;
pub use ingest::alerts::AlertLedger;
pub use ingest::categories::CategoryCache;
pub use ingest::db::SnapshotStore;
pub use ingest::error::IngestError;
pub use ingest::reconciler::Reconciler;
pub use youtube::{VideoSource, YouTubeClient};
