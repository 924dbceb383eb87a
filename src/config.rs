// src/config.rs
use anyhow::{anyhow, Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "NEWS_CONFIG_PATH";
pub const DEFAULT_CONFIG_TOML: &str = "config/news.toml";
pub const DEFAULT_CONFIG_JSON: &str = "config/news.json";

pub const DEFAULT_USER_AGENT: &str = "CyberNewsApp/1.0 (https://github.com/cybernews)";

/// Root of the application configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub news_sources: SourcesSection,
    #[serde(default)]
    pub content: ContentSection,
    #[serde(default)]
    pub schedule: ScheduleSection,
    #[serde(default)]
    pub web: WebSection,
    #[serde(default)]
    pub cli: CliSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            log_level: default_log_level(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesSection {
    #[serde(default)]
    pub rss_feeds: Vec<SourceCfg>,
    #[serde(default)]
    pub official_sources: Vec<SourceCfg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceCfg {
    pub name: String,
    pub url: String,
    pub category: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentSection {
    #[serde(default)]
    pub priority_keywords: Vec<String>,
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    #[serde(default = "default_min_article_length")]
    pub min_article_length: usize,
    #[serde(default = "default_max_articles_per_source")]
    pub max_articles_per_source: usize,
    /// Freshness cutoff for incoming entries. Falls back to the cache retention window.
    #[serde(default)]
    pub max_article_age_days: Option<u32>,
    /// Overrides merged on top of the built-in category weight table.
    #[serde(default)]
    pub category_weights: HashMap<String, u32>,
}

impl Default for ContentSection {
    fn default() -> Self {
        Self {
            priority_keywords: Vec::new(),
            exclude_keywords: Vec::new(),
            min_article_length: default_min_article_length(),
            max_articles_per_source: default_max_articles_per_source(),
            max_article_age_days: None,
            category_weights: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSection {
    #[serde(default = "default_fetch_times")]
    pub fetch_times: Vec<String>,
    #[serde(default = "default_cleanup_time")]
    pub cleanup_time: String,
    #[serde(default = "default_retention_days")]
    pub cache_retention_days: u32,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            fetch_times: default_fetch_times(),
            cleanup_time: default_cleanup_time(),
            cache_retention_days: default_retention_days(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CliSection {
    #[serde(default = "default_max_display")]
    pub max_articles_display: usize,
}

impl Default for CliSection {
    fn default() -> Self {
        Self {
            max_articles_display: default_max_display(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_true() -> bool {
    true
}
fn default_min_article_length() -> usize {
    100
}
fn default_max_articles_per_source() -> usize {
    20
}
fn default_fetch_times() -> Vec<String> {
    vec!["06:00".into(), "12:00".into(), "18:00".into()]
}
fn default_cleanup_time() -> String {
    "00:00".to_string()
}
fn default_retention_days() -> u32 {
    7
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_max_display() -> usize {
    15
}

impl AppConfig {
    /// Load from an explicit path. The extension picks the format (TOML or JSON).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = Self::parse(&content, ext.as_str())
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Discover config:
    /// 1) $NEWS_CONFIG_PATH
    /// 2) config/news.toml
    /// 3) config/news.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        for candidate in [DEFAULT_CONFIG_TOML, DEFAULT_CONFIG_JSON] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Ok(Self::default())
    }

    fn parse(s: &str, hint_ext: &str) -> Result<Self> {
        if hint_ext == "json" {
            return serde_json::from_str(s).context("invalid JSON config");
        }
        match toml::from_str(s) {
            Ok(cfg) => Ok(cfg),
            Err(toml_err) => serde_json::from_str(s)
                .map_err(|_| anyhow!(toml_err))
                .context("invalid TOML config"),
        }
    }

    fn validate(&self) -> Result<()> {
        self.schedule.fetch_times()?;
        self.schedule.cleanup_time()?;
        if self.schedule.fetch_timeout_secs == 0 {
            return Err(anyhow!("schedule.fetch_timeout_secs must be > 0"));
        }
        for s in self
            .news_sources
            .rss_feeds
            .iter()
            .chain(self.news_sources.official_sources.iter())
        {
            if s.name.trim().is_empty() || s.url.trim().is_empty() {
                return Err(anyhow!("news source entries need a name and a url"));
            }
        }
        Ok(())
    }
}

impl ContentSection {
    pub fn max_article_age_days(&self, retention_days: u32) -> u32 {
        self.max_article_age_days.unwrap_or(retention_days)
    }
}

impl ScheduleSection {
    pub fn fetch_times(&self) -> Result<Vec<NaiveTime>> {
        self.fetch_times.iter().map(|t| parse_hhmm(t)).collect()
    }

    pub fn cleanup_time(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.cleanup_time)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .with_context(|| format!("invalid time of day '{s}', expected HH:MM"))
}
