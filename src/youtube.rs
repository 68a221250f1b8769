//! YouTube Data API v3 Integration
//!
//! External video source for the ingestion pipeline:
//! - Trending ("mostPopular") chart per region
//! - Video category listings per region
//!
//! ## API Reference
//!
//! Endpoints:
//! - https://www.googleapis.com/youtube/v3/videos?chart=mostPopular
//! - https://www.googleapis.com/youtube/v3/videoCategories
//!
//! Failures are surfaced as a typed [`SourceError`] so callers can tell
//! "no trending videos" (`Ok` with an empty list) apart from "fetch failed".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug)]
pub enum SourceError {
    Http(String),
    Status(u16),
    Decode(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Http(e) => write!(f, "HTTP error: {}", e),
            SourceError::Status(code) => write!(f, "API returned status {}", code),
            SourceError::Decode(e) => write!(f, "Response decode error: {}", e),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else {
            SourceError::Http(err.to_string())
        }
    }
}

/// One item of the `videos.list` response, limited to the fields the
/// reconciler consumes. Everything is optional at the wire level; required
/// fields are enforced during parsing so one malformed item cannot fail a
/// whole batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawVideoItem {
    pub id: Option<String>,
    pub snippet: Option<RawSnippet>,
    pub statistics: Option<RawStatistics>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSnippet {
    pub title: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<String>,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub category_id: Option<String>,
    pub tags: Option<Vec<String>>,
    pub thumbnails: Option<RawThumbnails>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawThumbnails {
    pub high: Option<RawThumbnail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawThumbnail {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawStatistics {
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub comment_count: Option<String>,
}

/// Resolved category details from `videoCategories.list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub name: String,
    pub assignable: bool,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<RawVideoItem>,
}

#[derive(Debug, Deserialize)]
struct CategoryListResponse {
    #[serde(default)]
    items: Vec<RawCategoryItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCategoryItem {
    id: Option<String>,
    snippet: Option<RawCategorySnippet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCategorySnippet {
    title: Option<String>,
    assignable: Option<bool>,
}

/// External video source boundary
///
/// Implemented by [`YouTubeClient`] in production and by scripted sources in
/// tests.
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Fetch the trending chart for one region
    async fn list_trending(
        &self,
        region: &str,
        max_results: u32,
    ) -> Result<Vec<RawVideoItem>, SourceError>;

    /// Fetch the category id -> details mapping for one region
    async fn list_categories(
        &self,
        region: &str,
    ) -> Result<HashMap<String, CategoryInfo>, SourceError>;
}

/// HTTP client for the YouTube Data API v3
pub struct YouTubeClient {
    client: reqwest::Client,
    api_key: String,
}

impl YouTubeClient {
    /// Create a client with a bounded request timeout
    ///
    /// The timeout is the only defense against a hung source call stalling a
    /// region's processing, so it is not optional.
    pub fn new(api_key: &str, timeout_secs: u64) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl VideoSource for YouTubeClient {
    async fn list_trending(
        &self,
        region: &str,
        max_results: u32,
    ) -> Result<Vec<RawVideoItem>, SourceError> {
        let url = format!("{}/videos", API_BASE);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("part", "snippet,statistics"),
                ("chart", "mostPopular"),
                ("regionCode", region),
                ("maxResults", &max_results.to_string()),
                ("key", &self.api_key),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }

        let body: VideoListResponse = response.json().await?;
        Ok(body.items)
    }

    async fn list_categories(
        &self,
        region: &str,
    ) -> Result<HashMap<String, CategoryInfo>, SourceError> {
        let url = format!("{}/videoCategories", API_BASE);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("part", "snippet"),
                ("regionCode", region),
                ("key", &self.api_key),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }

        let body: CategoryListResponse = response.json().await?;

        let mut categories = HashMap::new();
        for item in body.items {
            let (id, snippet) = match (item.id, item.snippet) {
                (Some(id), Some(snippet)) => (id, snippet),
                _ => continue,
            };
            let name = match snippet.title {
                Some(title) => title,
                None => continue,
            };
            categories.insert(
                id,
                CategoryInfo {
                    name,
                    assignable: snippet.assignable.unwrap_or(true),
                },
            );
        }

        Ok(categories)
    }
}
