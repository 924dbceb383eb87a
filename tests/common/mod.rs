// tests/common/mod.rs
#![allow(dead_code)]

use chrono::{Duration, Utc};
use std::path::Path;
use std::sync::Arc;

use cyber_news::aggregator::{Aggregator, PipelineLimits};
use cyber_news::ingest::fetcher::{Fetcher, FixtureTransport};
use cyber_news::ingest::processor::{ArticleProcessor, CategoryWeights};
use cyber_news::ingest::types::FeedTransport;
use cyber_news::{CacheStore, Source, SourceRegistry};

pub const LONG_BODY: &str = "Researchers published technical details and indicators of compromise \
    so that defenders can hunt for the activity across their own networks quickly.";

/// One RSS item, published `hours_ago` hours before now.
pub struct Item<'a> {
    pub title: &'a str,
    pub link: &'a str,
    pub description: &'a str,
    pub hours_ago: i64,
}

pub fn rss(items: &[Item<'_>]) -> String {
    let mut body = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>Test</title>"#,
    );
    for it in items {
        let date = (Utc::now() - Duration::hours(it.hours_ago)).to_rfc2822();
        body.push_str(&format!(
            "<item><title>{}</title><link>{}</link><pubDate>{}</pubDate><description>{}</description></item>",
            it.title, it.link, date, it.description
        ));
    }
    body.push_str("</channel></rss>");
    body
}

pub fn processor() -> ArticleProcessor {
    ArticleProcessor::new(
        &[
            "ransomware".to_string(),
            "zero-day".to_string(),
            "vulnerability".to_string(),
        ],
        &["sponsored".to_string()],
        50,
        CategoryWeights::default(),
    )
}

pub fn limits() -> PipelineLimits {
    PipelineLimits {
        max_articles_per_source: 20,
        max_article_age: std::time::Duration::from_secs(7 * 86_400),
        retention_days: 7,
    }
}

pub fn aggregator(
    sources: Vec<Source>,
    transport: FixtureTransport,
    timeout: std::time::Duration,
    cache_dir: &Path,
) -> Aggregator {
    aggregator_with(sources, Arc::new(transport), timeout, cache_dir)
}

pub fn aggregator_with(
    sources: Vec<Source>,
    transport: Arc<dyn FeedTransport>,
    timeout: std::time::Duration,
    cache_dir: &Path,
) -> Aggregator {
    Aggregator::new(
        SourceRegistry::new(sources, vec![]),
        Fetcher::new(transport, timeout),
        processor(),
        CacheStore::new(cache_dir),
        limits(),
    )
}
