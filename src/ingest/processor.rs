// src/ingest/processor.rs
//! Text cleanup, priority scoring and the relevance gate.

use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::HashMap;

use crate::article::{article_id, Article};
use crate::config::ContentSection;
use crate::ingest::types::RawEntry;
use crate::sources::Source;

/// Points per distinct priority keyword hit.
pub const KEYWORD_POINTS: u32 = 10;

/// Strip markup tags, decode entities, collapse whitespace.
pub fn clean_text(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]+>").unwrap());
    let stripped = re_tags.replace_all(s, " ");

    let decoded = html_escape::decode_html_entities(&stripped);

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

/// Fixed category weight table with optional overrides.
#[derive(Debug, Clone)]
pub struct CategoryWeights {
    table: HashMap<String, u32>,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        let table = [
            ("alerts", 20),
            ("vulnerabilities", 15),
            ("threats", 12),
            ("general", 5),
            ("industry", 3),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self { table }
    }
}

impl CategoryWeights {
    pub fn with_overrides(overrides: &HashMap<String, u32>) -> Self {
        let mut w = Self::default();
        for (k, v) in overrides {
            w.table.insert(k.trim().to_ascii_lowercase(), *v);
        }
        w
    }

    /// Unknown categories weigh 0.
    pub fn weight_for(&self, category: &str) -> u32 {
        self.table
            .get(&category.to_ascii_lowercase())
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
struct Keyword {
    original: String,
    lowered: String,
}

#[derive(Debug, Clone)]
pub struct ArticleProcessor {
    priority: Vec<Keyword>,
    excluded: Vec<String>,
    min_article_length: usize,
    weights: CategoryWeights,
}

impl ArticleProcessor {
    pub fn new(
        priority_keywords: &[String],
        exclude_keywords: &[String],
        min_article_length: usize,
        weights: CategoryWeights,
    ) -> Self {
        let mut priority: Vec<Keyword> = Vec::with_capacity(priority_keywords.len());
        for k in priority_keywords {
            let lowered = k.trim().to_lowercase();
            if lowered.is_empty() || priority.iter().any(|p| p.lowered == lowered) {
                continue;
            }
            priority.push(Keyword {
                original: k.trim().to_string(),
                lowered,
            });
        }
        let excluded = exclude_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            priority,
            excluded,
            min_article_length,
            weights,
        }
    }

    pub fn from_config(content: &ContentSection) -> Self {
        Self::new(
            &content.priority_keywords,
            &content.exclude_keywords,
            content.min_article_length,
            CategoryWeights::with_overrides(&content.category_weights),
        )
    }

    /// Build the article with its score and matched keywords. Deterministic.
    pub fn process(&self, entry: RawEntry, source: &Source) -> Article {
        let title = clean_text(&entry.title);
        let summary = clean_text(&entry.summary);
        let content = clean_text(&entry.body);

        let (keywords, priority_score) = self.score(&title, &summary, &content, &source.category);

        Article {
            id: article_id(&title, &entry.url),
            title,
            url: entry.url,
            source: source.name.clone(),
            category: source.category.clone(),
            published_date: entry.published,
            summary,
            content,
            keywords,
            priority_score,
        }
    }

    /// Matched keywords come back in configured order.
    pub fn score(
        &self,
        title: &str,
        summary: &str,
        content: &str,
        category: &str,
    ) -> (Vec<String>, u32) {
        let haystack = format!("{title} {summary} {content}").to_lowercase();
        let keywords: Vec<String> = self
            .priority
            .iter()
            .filter(|k| haystack.contains(&k.lowered))
            .map(|k| k.original.clone())
            .collect();
        let score = KEYWORD_POINTS * keywords.len() as u32 + self.weights.weight_for(category);
        (keywords, score)
    }

    /// Hard filter: too-short content or an excluded keyword in title+summary.
    pub fn is_relevant(&self, article: &Article) -> bool {
        if article.content.chars().count() < self.min_article_length {
            return false;
        }
        let head = format!("{} {}", article.title, article.summary).to_lowercase();
        !self.excluded.iter().any(|x| head.contains(x.as_str()))
    }

    pub fn process_relevant(&self, entry: RawEntry, source: &Source) -> Option<Article> {
        let article = self.process(entry, source);
        self.is_relevant(&article).then_some(article)
    }
}
