// src/ingest/feed.rs
//! Tolerant RSS 2.0 / Atom parsing into `FeedItem`s. Missing fields default to `None`.

use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{
    format_description::well_known::{Rfc2822, Rfc3339},
    OffsetDateTime,
};

use crate::ingest::types::{FeedItem, FetchError};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "dc:date", alias = "date")]
    dc_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "content:encoded", alias = "encoded")]
    content_encoded: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Rss,
    Atom,
}

fn detect(xml: &str) -> Option<Format> {
    match (xml.find("<rss"), xml.find("<feed")) {
        (Some(r), Some(a)) if a < r => Some(Format::Atom),
        (Some(_), _) => Some(Format::Rss),
        (None, Some(_)) => Some(Format::Atom),
        (None, None) => None,
    }
}

/// Parse a feed payload, preserving entry order.
pub fn parse_feed(payload: &str) -> Result<Vec<FeedItem>, FetchError> {
    let xml = scrub_html_entities_for_xml(payload);
    match detect(&xml) {
        Some(Format::Rss) => parse_rss(&xml),
        Some(Format::Atom) => parse_atom(&xml),
        None => Err(FetchError::Parse("unrecognised feed format".into())),
    }
}

fn parse_rss(xml: &str) -> Result<Vec<FeedItem>, FetchError> {
    let rss: Rss = from_str(xml).map_err(|e| FetchError::Parse(format!("rss: {e}")))?;
    Ok(rss
        .channel
        .item
        .into_iter()
        .map(|it| FeedItem {
            title: non_empty(it.title),
            link: non_empty(it.link),
            published: it.pub_date.as_deref().and_then(parse_feed_date),
            updated: it.dc_date.as_deref().and_then(parse_feed_date),
            summary: non_empty(it.description),
            content: non_empty(it.content_encoded),
        })
        .collect())
}

fn parse_atom(xml: &str) -> Result<Vec<FeedItem>, FetchError> {
    let feed: AtomFeed = from_str(xml).map_err(|e| FetchError::Parse(format!("atom: {e}")))?;
    Ok(feed
        .entry
        .into_iter()
        .map(|e| FeedItem {
            title: non_empty(e.title.map(|t| t.value)),
            link: pick_link(&e.links),
            published: e.published.as_deref().and_then(parse_feed_date),
            updated: e.updated.as_deref().and_then(parse_feed_date),
            summary: non_empty(e.summary.map(|t| t.value)),
            content: non_empty(e.content.map(|t| t.value)),
        })
        .collect())
}

// rel="alternate" (or no rel) wins over e.g. rel="self"
fn pick_link(links: &[AtomLink]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .and_then(|l| non_empty(l.href.clone()))
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// RFC 2822 (RSS) or RFC 3339 (Atom). Anything else is treated as absent.
pub fn parse_feed_date(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    OffsetDateTime::parse(ts, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .ok()
        .and_then(|dt| DateTime::from_timestamp(dt.unix_timestamp(), 0))
}

// HTML entities that are not valid XML and show up in real feeds.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&hellip;", "...")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
