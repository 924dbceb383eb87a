// src/ingest/dedup.rs
//! Near-duplicate removal by title token overlap. First occurrence wins.

use std::collections::HashSet;

use crate::article::Article;

/// Minimum overlap floor; short titles need more than this many shared tokens.
const MIN_OVERLAP: f64 = 3.0;
/// Share of the candidate's tokens that must overlap.
const OVERLAP_RATIO: f64 = 0.7;

pub fn title_tokens(title: &str) -> HashSet<String> {
    title.to_lowercase().split_whitespace().map(str::to_string).collect()
}

/// `|a ∩ b| > max(3, 0.7 × |candidate|)`
pub fn is_near_duplicate(candidate: &HashSet<String>, seen: &HashSet<String>) -> bool {
    let overlap = candidate.intersection(seen).count() as f64;
    overlap > MIN_OVERLAP.max(OVERLAP_RATIO * candidate.len() as f64)
}

/// Order-preserving dedup. Returns (kept, removed count).
pub fn dedupe(articles: Vec<Article>) -> (Vec<Article>, usize) {
    let mut seen: Vec<HashSet<String>> = Vec::with_capacity(articles.len());
    let mut keep = Vec::with_capacity(articles.len());
    let mut removed = 0usize;

    for a in articles {
        let tokens = title_tokens(&a.title);
        if seen.iter().any(|s| is_near_duplicate(&tokens, s)) {
            tracing::debug!(target: "ingest", id = %a.id, source = %a.source, "near-duplicate dropped");
            removed += 1;
            continue;
        }
        seen.push(tokens);
        keep.push(a);
    }

    (keep, removed)
}
