// src/article.rs
//! Article data model shared by the pipeline, the cache and the API layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A processed, scored article. Built once by the processor and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub url: String,
    pub source: String,
    pub category: String,
    #[serde(with = "iso8601")]
    pub published_date: DateTime<Utc>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub priority_score: u32,
}

/// Stable 12-hex-char fingerprint of `(title, url)`.
pub fn article_id(title: &str, url: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(url.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Sort by priority (desc), then by publication date (desc).
pub fn sort_by_priority_then_date(articles: &mut [Article]) {
    articles.sort_by(|a, b| {
        b.priority_score
            .cmp(&a.priority_score)
            .then_with(|| b.published_date.cmp(&a.published_date))
    });
}

/// Timestamps are written as RFC 3339 with second precision. Reading also
/// accepts a naive `YYYY-MM-DDTHH:MM:SS[.f]` value, interpreted as UTC.
mod iso8601 {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| de::Error::custom(format!("invalid publishedDate '{raw}': {e}")))
    }
}
