// src/cache.rs
//! Day-partitioned JSON snapshots: `articles_<YYYYMMDD>.json`, keyed by the
//! local calendar date the snapshot was written.

use chrono::{DateTime, Days, Local, NaiveDate};
use metrics::counter;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::article::{sort_by_priority_then_date, Article};

const FILE_PREFIX: &str = "articles_";
const FILE_SUFFIX: &str = ".json";
const DATE_FMT: &str = "%Y%m%d";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache directory {path} is not writable: {source}")]
    DirUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Today's key in local time.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn file_name_for(date: NaiveDate) -> String {
    format!("{FILE_PREFIX}{}{FILE_SUFFIX}", date.format(DATE_FMT))
}

/// `articles_20261014.json` → 2026-10-14
pub fn date_from_file_name(name: &str) -> Option<NaiveDate> {
    let stem = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    NaiveDate::parse_from_str(stem, DATE_FMT).ok()
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(file_name_for(date))
    }

    /// Replace the snapshot for `date`. Written to a temp file in the same
    /// directory, then renamed over the target.
    pub fn save(&self, date: NaiveDate, articles: &[Article]) -> Result<PathBuf, CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::DirUnwritable {
            path: self.dir.clone(),
            source,
        })?;
        let target = self.path_for(date);

        let tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(|source| {
            CacheError::DirUnwritable {
                path: self.dir.clone(),
                source,
            }
        })?;
        {
            let mut w = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut w, articles)?;
            w.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| CacheError::Io(e.error))?;

        counter!("news_articles_cached_total").increment(articles.len() as u64);
        info!(target: "cache", count = articles.len(), file = %target.display(), "snapshot written");
        Ok(target)
    }

    /// Missing file → empty. Corrupt file → logged, empty.
    pub fn load(&self, date: NaiveDate) -> Vec<Article> {
        let path = self.path_for(date);
        let raw = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                error!(target: "cache", file = %path.display(), error = %e, "failed to read snapshot");
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<Article>>(&raw) {
            Ok(v) => v,
            Err(e) => {
                error!(target: "cache", file = %path.display(), error = %e, "corrupt snapshot ignored");
                Vec::new()
            }
        }
    }

    /// `days_back` consecutive days ending `today`, merged and sorted by
    /// (priority desc, published desc). `days_back` of 0 is treated as 1.
    pub fn load_range_from(&self, today: NaiveDate, days_back: u32) -> Vec<Article> {
        let mut all = Vec::new();
        for i in 0..days_back.max(1) {
            let Some(day) = today.checked_sub_days(Days::new(u64::from(i))) else {
                break;
            };
            all.extend(self.load(day));
        }
        sort_by_priority_then_date(&mut all);
        all
    }

    pub fn load_range(&self, days_back: u32) -> Vec<Article> {
        self.load_range_from(today(), days_back)
    }

    /// Delete snapshots more than `retention_days` days older than `today`.
    /// Files whose name doesn't parse are skipped with a warning.
    pub fn evict_older_than_from(
        &self,
        today: NaiveDate,
        retention_days: u32,
    ) -> Result<usize, CacheError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0usize;
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !(name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX)) {
                continue;
            }
            let Some(date) = date_from_file_name(&name) else {
                warn!(target: "cache", file = %name, "could not parse date from cache file name");
                continue;
            };
            let age_days = (today - date).num_days();
            if age_days > i64::from(retention_days) {
                match fs::remove_file(entry.path()) {
                    Ok(()) => {
                        removed += 1;
                        info!(target: "cache", file = %name, age_days, "removed old snapshot");
                    }
                    Err(e) => warn!(target: "cache", file = %name, error = %e, "failed to remove snapshot"),
                }
            }
        }

        counter!("news_cache_evicted_total").increment(removed as u64);
        info!(target: "cache", removed, retention_days, "cache cleanup completed");
        Ok(removed)
    }

    pub fn evict_older_than(&self, retention_days: u32) -> Result<usize, CacheError> {
        self.evict_older_than_from(today(), retention_days)
    }

    /// Modification time of today's snapshot, if one exists.
    pub fn last_update(&self) -> Option<DateTime<Local>> {
        let meta = fs::metadata(self.path_for(today())).ok()?;
        meta.modified().ok().map(DateTime::<Local>::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_round_trip_dates() {
        let d = NaiveDate::from_ymd_opt(2026, 10, 4).unwrap();
        assert_eq!(file_name_for(d), "articles_20261004.json");
        assert_eq!(date_from_file_name("articles_20261004.json"), Some(d));
        assert_eq!(date_from_file_name("articles_latest.json"), None);
        assert_eq!(date_from_file_name("notes.txt"), None);
    }

    #[test]
    fn missing_dir_evicts_nothing() {
        let store = CacheStore::new("/definitely/not/here/cache");
        assert_eq!(store.evict_older_than(7).unwrap(), 0);
        assert!(store.load(today()).is_empty());
    }
}
