// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregator;
pub mod api;
pub mod article;
pub mod cache;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod query;
pub mod scheduler;
pub mod sources;

// ---- Re-exports for stable public API ----
pub use crate::aggregator::{Aggregator, AggregatorError, CycleState, UpdateReport};
pub use crate::api::router;
pub use crate::article::Article;
pub use crate::cache::CacheStore;
pub use crate::config::AppConfig;
pub use crate::sources::{Source, SourceRegistry};
