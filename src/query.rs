// src/query.rs
//! Post-hoc filtering and statistics over cached articles.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::article::Article;

/// Scores above this count as high priority.
pub const HIGH_PRIORITY_THRESHOLD: u32 = 15;

#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub categories: Vec<String>,
    pub sources: Vec<String>,
    pub limit: Option<usize>,
}

impl ArticleFilter {
    /// Category: exact (case-insensitive). Source: any substring match. Then limit.
    pub fn apply(&self, articles: Vec<Article>) -> Vec<Article> {
        let cats: Vec<String> = self
            .categories
            .iter()
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        let srcs: Vec<String> = self
            .sources
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let it = articles.into_iter().filter(|a| {
            (cats.is_empty() || cats.iter().any(|c| a.category.eq_ignore_ascii_case(c)))
                && (srcs.is_empty() || {
                    let name = a.source.to_lowercase();
                    srcs.iter().any(|s| name.contains(s.as_str()))
                })
        });
        match self.limit {
            Some(n) => it.take(n).collect(),
            None => it.collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Statistics {
    pub total_articles: usize,
    pub sources_count: usize,
    pub high_priority_count: usize,
    pub categories: BTreeMap<String, usize>,
}

pub fn statistics(articles: &[Article]) -> Statistics {
    let mut categories = BTreeMap::new();
    let mut sources = HashSet::new();
    let mut high = 0usize;
    for a in articles {
        *categories.entry(a.category.clone()).or_insert(0) += 1;
        sources.insert(a.source.as_str());
        if a.priority_score > HIGH_PRIORITY_THRESHOLD {
            high += 1;
        }
    }
    Statistics {
        total_articles: articles.len(),
        sources_count: sources.len(),
        high_priority_count: high,
        categories,
    }
}
