// src/ingest/fetcher.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::ingest::feed::parse_feed;
use crate::ingest::types::{FeedItem, FeedTransport, FetchError, FetchOutcome, RawEntry};
use crate::sources::Source;

/// reqwest-backed transport. One GET per call, bounded by the client timeout.
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl FeedTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Http(e)
            }
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        resp.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Http(e)
            }
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Canned responses keyed by URL. Unknown URLs answer 404.
#[derive(Debug, Clone)]
pub enum FixtureResponse {
    Body(String),
    Status(u16),
    /// Answer with `body` after `delay`; used to exercise timeouts.
    Delayed { delay: Duration, body: String },
}

#[derive(Debug, Clone, Default)]
pub struct FixtureTransport {
    responses: HashMap<String, FixtureResponse>,
}

impl FixtureTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, response: FixtureResponse) -> Self {
        self.responses.insert(url.to_string(), response);
        self
    }

    pub fn with_body(self, url: &str, body: &str) -> Self {
        self.with(url, FixtureResponse::Body(body.to_string()))
    }
}

#[async_trait]
impl FeedTransport for FixtureTransport {
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        match self.responses.get(url) {
            Some(FixtureResponse::Body(b)) => Ok(b.clone()),
            Some(FixtureResponse::Status(code)) => Err(FetchError::Status(*code)),
            Some(FixtureResponse::Delayed { delay, body }) => {
                tokio::time::sleep(*delay).await;
                Ok(body.clone())
            }
            None => Err(FetchError::Status(404)),
        }
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

/// Fetch + parse + cap + freshness filter for a single source.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn FeedTransport>,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn FeedTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Never fails past this boundary: errors are logged and returned inside the outcome.
    pub async fn fetch(&self, source: &Source, limit: usize, max_age: Duration) -> FetchOutcome {
        let t0 = Instant::now();
        tracing::info!(target: "ingest", source = %source.name, url = %source.url, "fetching feed");
        counter!("news_fetch_total").increment(1);

        let result = match tokio::time::timeout(self.timeout, self.transport.get(&source.url)).await
        {
            Ok(r) => r,
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        };

        let outcome = match result.and_then(|body| parse_feed(&body)) {
            Ok(items) => {
                let entries = select_entries(items, limit, max_age, Utc::now());
                tracing::debug!(target: "ingest", source = %source.name, count = entries.len(), "feed parsed");
                FetchOutcome::ok(&source.name, entries)
            }
            Err(e) => {
                tracing::warn!(
                    target: "ingest",
                    source = %source.name,
                    transport = self.transport.name(),
                    error = %e,
                    "source fetch failed"
                );
                counter!("news_fetch_errors_total").increment(1);
                FetchOutcome::failed(&source.name, e)
            }
        };

        histogram!("news_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        outcome
    }
}

/// First `limit` items in feed order, resolved to `RawEntry`, minus anything older than `max_age`.
pub fn select_entries(
    items: Vec<FeedItem>,
    limit: usize,
    max_age: Duration,
    fetched_at: DateTime<Utc>,
) -> Vec<RawEntry> {
    let cutoff = chrono::Duration::from_std(max_age)
        .ok()
        .and_then(|age| fetched_at.checked_sub_signed(age));

    items
        .into_iter()
        .take(limit)
        .filter_map(|it| resolve_entry(it, fetched_at))
        .filter(|e| cutoff.map_or(true, |c| e.published >= c))
        .collect()
}

fn resolve_entry(item: FeedItem, fetched_at: DateTime<Utc>) -> Option<RawEntry> {
    let title = item.title?;
    let url = item.link?;
    let published = item
        .published
        .or(item.updated)
        .unwrap_or_else(|| truncate_to_secs(fetched_at));
    let summary = item.summary.unwrap_or_default();
    let body = item.content.unwrap_or_else(|| summary.clone());
    Some(RawEntry {
        title,
        url,
        published,
        summary,
        body,
    })
}

fn truncate_to_secs(dt: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(dt.timestamp(), 0).unwrap_or(dt)
}
