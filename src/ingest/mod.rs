// src/ingest/mod.rs
pub mod dedup;
pub mod feed;
pub mod fetcher;
pub mod processor;
pub mod types;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

use crate::article::Article;
use crate::ingest::processor::ArticleProcessor;
use crate::ingest::types::RawEntry;
use crate::sources::Source;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("news_fetch_total", "Feed fetches attempted.");
        describe_counter!(
            "news_fetch_errors_total",
            "Feed fetches that failed (network, status, timeout, parse)."
        );
        describe_counter!(
            "news_articles_filtered_total",
            "Entries rejected by the relevance gate."
        );
        describe_counter!(
            "news_articles_dedup_total",
            "Articles removed as near-duplicates."
        );
        describe_counter!("news_articles_cached_total", "Articles written to the cache.");
        describe_counter!("news_cache_evicted_total", "Snapshot files removed by eviction.");
        describe_histogram!("news_fetch_ms", "Per-source fetch time in milliseconds.");
        describe_gauge!(
            "news_last_update_ts",
            "Unix ts when the last update cycle finished."
        );
    });
}

/// Turn every fetched entry into an article, dropping irrelevant ones.
/// Returns (kept, filtered_count).
pub fn process_entries(
    processor: &ArticleProcessor,
    fetched: Vec<(Source, Vec<RawEntry>)>,
) -> (Vec<Article>, usize) {
    let mut kept = Vec::new();
    let mut filtered = 0usize;
    for (source, entries) in fetched {
        for entry in entries {
            match processor.process_relevant(entry, &source) {
                Some(a) => kept.push(a),
                None => filtered += 1,
            }
        }
    }
    counter!("news_articles_filtered_total").increment(filtered as u64);
    (kept, filtered)
}
