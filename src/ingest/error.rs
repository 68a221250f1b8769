use crate::youtube::SourceError;

#[derive(Debug)]
pub enum IngestError {
    /// The external source could not be reached or answered with an error;
    /// the affected region's run is skipped.
    SourceUnavailable(String),
    /// A single raw item is missing required fields or unparsable; the item
    /// is skipped, the batch continues.
    MalformedItem(String),
    /// A commit failure; the whole batch is rolled back and the next
    /// scheduled run retries from scratch.
    Database(String),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::SourceUnavailable(e) => write!(f, "Source unavailable: {}", e),
            IngestError::MalformedItem(e) => write!(f, "Malformed item: {}", e),
            IngestError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<rusqlite::Error> for IngestError {
    fn from(err: rusqlite::Error) -> Self {
        IngestError::Database(err.to_string())
    }
}

impl From<SourceError> for IngestError {
    fn from(err: SourceError) -> Self {
        IngestError::SourceUnavailable(err.to_string())
    }
}
