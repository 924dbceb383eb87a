// src/aggregator.rs
//! Update cycle orchestration: fetch all sources concurrently, process,
//! dedupe, sort and write today's snapshot.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use metrics::{counter, gauge};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::article::Article;
use crate::cache::{self, CacheError, CacheStore};
use crate::config::AppConfig;
use crate::ingest::dedup::dedupe;
use crate::ingest::fetcher::{Fetcher, HttpTransport};
use crate::ingest::processor::ArticleProcessor;
use crate::ingest::types::{FeedTransport, FetchError};
use crate::ingest::{ensure_metrics_described, process_entries};
use crate::sources::{Source, SourceRegistry};

const SECS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleState {
    Idle,
    Fetching,
    Processing,
    Deduplicating,
    Caching,
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("cache write failed: {0}")]
    Cache(#[from] CacheError),

    #[error("could not build feed client: {0}")]
    Client(#[from] FetchError),
}

/// Result of one successful cycle.
#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub articles: Vec<Article>,
    pub sources_total: usize,
    pub sources_failed: usize,
    pub entries_fetched: usize,
    pub entries_filtered: usize,
    pub duplicates_removed: usize,
    pub cache_file: PathBuf,
}

/// Counters of the most recent cycle, without the articles.
#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub article_count: usize,
    pub sources_total: usize,
    pub sources_failed: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineLimits {
    pub max_articles_per_source: usize,
    pub max_article_age: Duration,
    pub retention_days: u32,
}

impl PipelineLimits {
    pub fn from_config(cfg: &AppConfig) -> Self {
        let retention = cfg.schedule.cache_retention_days;
        let age_days = cfg.content.max_article_age_days(retention);
        Self {
            max_articles_per_source: cfg.content.max_articles_per_source,
            max_article_age: Duration::from_secs(u64::from(age_days) * SECS_PER_DAY),
            retention_days: retention,
        }
    }
}

pub struct Aggregator {
    registry: SourceRegistry,
    fetcher: Fetcher,
    processor: ArticleProcessor,
    cache: CacheStore,
    limits: PipelineLimits,
    // at most one cycle at a time; a second caller waits its turn
    cycle_lock: Mutex<()>,
    state: RwLock<CycleState>,
    last: RwLock<Option<CycleSummary>>,
}

impl Aggregator {
    pub fn new(
        registry: SourceRegistry,
        fetcher: Fetcher,
        processor: ArticleProcessor,
        cache: CacheStore,
        limits: PipelineLimits,
    ) -> Self {
        ensure_metrics_described();
        Self {
            registry,
            fetcher,
            processor,
            cache,
            limits,
            cycle_lock: Mutex::new(()),
            state: RwLock::new(CycleState::Idle),
            last: RwLock::new(None),
        }
    }

    /// Wire everything from config with the given transport.
    pub fn with_transport(cfg: &AppConfig, transport: Arc<dyn FeedTransport>) -> Self {
        Self::new(
            SourceRegistry::from_config(&cfg.news_sources),
            Fetcher::new(transport, cfg.schedule.fetch_timeout()),
            ArticleProcessor::from_config(&cfg.content),
            CacheStore::new(&cfg.app.cache_dir),
            PipelineLimits::from_config(cfg),
        )
    }

    /// Wire everything from config with the reqwest transport.
    pub fn from_config(cfg: &AppConfig) -> Result<Self, AggregatorError> {
        let transport = HttpTransport::new(&cfg.app.user_agent, cfg.schedule.fetch_timeout())?;
        Ok(Self::with_transport(cfg, Arc::new(transport)))
    }

    pub fn sources(&self) -> Vec<Source> {
        self.registry.all_sources()
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn retention_days(&self) -> u32 {
        self.limits.retention_days
    }

    pub fn state(&self) -> CycleState {
        self.state.read().map(|g| *g).unwrap_or(CycleState::Failed)
    }

    pub fn last_summary(&self) -> Option<CycleSummary> {
        self.last.read().ok().and_then(|g| g.clone())
    }

    fn set_state(&self, s: CycleState) {
        if let Ok(mut g) = self.state.write() {
            *g = s;
        }
    }

    fn record(&self, summary: CycleSummary) {
        if let Ok(mut g) = self.last.write() {
            *g = Some(summary);
        }
    }

    /// Run one full cycle. Per-source failures are absorbed and counted;
    /// only a failed cache write fails the cycle.
    pub async fn update(&self) -> Result<UpdateReport, AggregatorError> {
        let _cycle = self.cycle_lock.lock().await;
        let _reset = CycleReset(self);
        info!(target: "ingest", "starting news update");

        // Fetching
        self.set_state(CycleState::Fetching);
        let sources = self.registry.all_sources();
        let outcomes = join_all(sources.iter().map(|s| {
            self.fetcher.fetch(
                s,
                self.limits.max_articles_per_source,
                self.limits.max_article_age,
            )
        }))
        .await;

        let mut sources_failed = 0usize;
        let mut entries_fetched = 0usize;
        let mut fetched = Vec::with_capacity(sources.len());
        for (source, outcome) in sources.iter().zip(outcomes) {
            if let Some(e) = &outcome.error {
                sources_failed += 1;
                warn!(target: "ingest", source = %outcome.source, error = %e, "source contributed no articles");
                continue;
            }
            entries_fetched += outcome.entries.len();
            fetched.push((source.clone(), outcome.entries));
        }

        // Processing
        self.set_state(CycleState::Processing);
        let (candidates, entries_filtered) = process_entries(&self.processor, fetched);

        // Deduplicating
        self.set_state(CycleState::Deduplicating);
        let (mut articles, duplicates_removed) = dedupe(candidates);
        counter!("news_articles_dedup_total").increment(duplicates_removed as u64);

        // Caching
        self.set_state(CycleState::Caching);
        articles.sort_by(|a, b| b.priority_score.cmp(&a.priority_score));
        let cache_file = match self.cache.save(cache::today(), &articles) {
            Ok(p) => p,
            Err(e) => {
                error!(target: "ingest", error = %e, "update cycle failed");
                self.set_state(CycleState::Failed);
                self.record(CycleSummary {
                    finished_at: Utc::now(),
                    success: false,
                    article_count: 0,
                    sources_total: sources.len(),
                    sources_failed,
                });
                return Err(e.into());
            }
        };

        let now = Utc::now();
        gauge!("news_last_update_ts").set(now.timestamp() as f64);
        info!(
            target: "ingest",
            articles = articles.len(),
            sources = sources.len(),
            failed = sources_failed,
            fetched = entries_fetched,
            filtered = entries_filtered,
            dedup = duplicates_removed,
            "news update finished"
        );

        self.record(CycleSummary {
            finished_at: now,
            success: true,
            article_count: articles.len(),
            sources_total: sources.len(),
            sources_failed,
        });
        self.set_state(CycleState::Idle);

        Ok(UpdateReport {
            articles,
            sources_total: sources.len(),
            sources_failed,
            entries_fetched,
            entries_filtered,
            duplicates_removed,
            cache_file,
        })
    }

    /// Cached articles for the last `days_back` days (at least one).
    pub fn load_cached(&self, days_back: u32) -> Vec<Article> {
        self.cache.load_range(days_back)
    }

    pub fn evict_older_than(&self, retention_days: u32) -> Result<usize, CacheError> {
        self.cache.evict_older_than(retention_days)
    }

    /// Eviction with the configured retention window.
    pub fn evict_expired(&self) -> Result<usize, CacheError> {
        self.evict_older_than(self.limits.retention_days)
    }
}

/// Resets an abandoned cycle (future dropped mid-flight) to `Failed`.
struct CycleReset<'a>(&'a Aggregator);

impl Drop for CycleReset<'_> {
    fn drop(&mut self) {
        if let Ok(mut g) = self.0.state.write() {
            if !matches!(*g, CycleState::Idle | CycleState::Failed) {
                warn!(target: "ingest", state = ?*g, "update cycle abandoned");
                *g = CycleState::Failed;
            }
        }
    }
}
