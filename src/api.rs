// src/api.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::aggregator::{Aggregator, CycleState, CycleSummary};
use crate::article::Article;
use crate::query::{statistics, ArticleFilter, Statistics};
use crate::scheduler::{self, ScheduleConfig, SchedulerStatus};
use crate::sources::Source;

const MAX_DAYS: u32 = 30;
const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 200;
const STATS_DAYS: u32 = 7;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub schedule: Arc<ScheduleConfig>,
    pub scheduler_running: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(aggregator: Arc<Aggregator>, schedule: ScheduleConfig) -> Self {
        Self {
            aggregator,
            schedule: Arc::new(schedule),
            scheduler_running: Arc::new(AtomicBool::new(false)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/news", get(get_news))
        .route("/api/sources", get(get_sources))
        .route("/api/update", post(post_update))
        .route("/api/statistics", get(get_statistics))
        .route("/api/status", get(get_status))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// `category` and `source` take comma-separated lists.
#[derive(Debug, Deserialize)]
pub struct NewsQuery {
    #[serde(default)]
    days: Option<u32>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

fn split_csv(s: Option<&str>) -> Vec<String> {
    s.map(|v| {
        v.split(',')
            .map(|x| x.trim().to_string())
            .filter(|x| !x.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

#[derive(Serialize)]
struct NewsResp {
    success: bool,
    articles: Vec<Article>,
    total_count: usize,
}

async fn get_news(State(state): State<AppState>, Query(q): Query<NewsQuery>) -> Json<NewsResp> {
    let days = q.days.unwrap_or(1).clamp(1, MAX_DAYS);
    let filter = ArticleFilter {
        categories: split_csv(q.category.as_deref()),
        sources: split_csv(q.source.as_deref()),
        limit: Some(q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)),
    };
    let articles = filter.apply(state.aggregator.load_cached(days));
    Json(NewsResp {
        success: true,
        total_count: articles.len(),
        articles,
    })
}

#[derive(Serialize)]
struct SourcesResp {
    success: bool,
    sources: Vec<Source>,
}

async fn get_sources(State(state): State<AppState>) -> Json<SourcesResp> {
    Json(SourcesResp {
        success: true,
        sources: state.aggregator.sources(),
    })
}

#[derive(Serialize)]
struct UpdateResp {
    success: bool,
    message: String,
    article_count: usize,
    failed_sources: usize,
}

#[derive(Serialize)]
struct ErrorResp {
    success: bool,
    error: String,
}

async fn post_update(State(state): State<AppState>) -> Response {
    match scheduler::force_update(&state.aggregator).await {
        Ok(r) => Json(UpdateResp {
            success: true,
            message: format!("Successfully updated {} articles", r.articles.len()),
            article_count: r.articles.len(),
            failed_sources: r.sources_failed,
        })
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResp {
                success: false,
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

#[derive(Serialize)]
struct StatisticsResp {
    success: bool,
    statistics: Statistics,
    last_updated: String,
}

async fn get_statistics(State(state): State<AppState>) -> Json<StatisticsResp> {
    let articles = state.aggregator.load_cached(STATS_DAYS);
    Json(StatisticsResp {
        success: true,
        statistics: statistics(&articles),
        last_updated: chrono::Local::now().to_rfc3339(),
    })
}

#[derive(Serialize)]
struct StatusResp {
    cycle_state: CycleState,
    last_cycle: Option<CycleSummary>,
    scheduler: SchedulerStatus,
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResp> {
    let now = chrono::Local::now().naive_local();
    Json(StatusResp {
        cycle_state: state.aggregator.state(),
        last_cycle: state.aggregator.last_summary(),
        scheduler: scheduler::status(
            &state.schedule,
            &state.aggregator,
            state.scheduler_running.load(Ordering::SeqCst),
            now,
        ),
    })
}
