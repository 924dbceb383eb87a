// src/sources.rs
//! Configured feed sources. Disabled entries never leave this module.

use serde::Serialize;

use crate::config::{SourceCfg, SourcesSection};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub name: String,
    pub url: String,
    pub category: String,
    pub enabled: bool,
}

impl Source {
    pub fn new(name: &str, url: &str, category: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            category: category.to_string(),
            enabled: true,
        }
    }
}

impl From<&SourceCfg> for Source {
    fn from(c: &SourceCfg) -> Self {
        Self {
            name: c.name.trim().to_string(),
            url: c.url.trim().to_string(),
            category: c.category.trim().to_ascii_lowercase(),
            enabled: c.enabled,
        }
    }
}

/// Two logical groups: regular feeds and official/announcement sources.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    feeds: Vec<Source>,
    official: Vec<Source>,
}

impl SourceRegistry {
    pub fn new(feeds: Vec<Source>, official: Vec<Source>) -> Self {
        Self { feeds, official }
    }

    pub fn from_config(cfg: &SourcesSection) -> Self {
        Self {
            feeds: cfg.rss_feeds.iter().map(Source::from).collect(),
            official: cfg.official_sources.iter().map(Source::from).collect(),
        }
    }

    pub fn feed_sources(&self) -> Vec<Source> {
        enabled(&self.feeds)
    }

    pub fn official_sources(&self) -> Vec<Source> {
        enabled(&self.official)
    }

    /// Every enabled source, feeds first, then official sources.
    pub fn all_sources(&self) -> Vec<Source> {
        let mut out = self.feed_sources();
        out.extend(self.official_sources());
        out
    }
}

fn enabled(list: &[Source]) -> Vec<Source> {
    list.iter().filter(|s| s.enabled).cloned().collect()
}
