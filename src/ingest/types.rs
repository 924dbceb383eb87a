// src/ingest/types.rs
use chrono::{DateTime, Utc};
use std::time::Duration;

/// One feed entry after the tolerant parse step. Absent fields stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub content: Option<String>,
}

/// A candidate entry as yielded by the fetcher: timestamp resolved, body chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub title: String,
    pub url: String,
    pub published: DateTime<Utc>,
    pub summary: String,
    /// Explicit content when the feed has it, otherwise the summary.
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("feed parse error: {0}")]
    Parse(String),
}

/// Per-source result. A failed fetch carries its error and no entries.
#[derive(Debug)]
pub struct FetchOutcome {
    pub source: String,
    pub entries: Vec<RawEntry>,
    pub error: Option<FetchError>,
}

impl FetchOutcome {
    pub fn ok(source: &str, entries: Vec<RawEntry>) -> Self {
        Self {
            source: source.to_string(),
            entries,
            error: None,
        }
    }

    pub fn failed(source: &str, error: FetchError) -> Self {
        Self {
            source: source.to_string(),
            entries: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Transport seam: retrieve the raw feed payload for a URL.
#[async_trait::async_trait]
pub trait FeedTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, FetchError>;
    fn name(&self) -> &'static str;
}
