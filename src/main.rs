//! Cyber News Aggregator binary entrypoint.
//! Loads config, initialises tracing, then runs one CLI command against a
//! single explicitly constructed `Aggregator`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cyber_news::api::{self, AppState};
use cyber_news::article::Article;
use cyber_news::metrics::Metrics;
use cyber_news::query::{statistics, ArticleFilter};
use cyber_news::scheduler::{self, ScheduleConfig};
use cyber_news::{Aggregator, AppConfig};

#[derive(Parser)]
#[command(name = "cyber-news", version, about = "Cybersecurity news aggregator")]
struct Cli {
    /// Config file (TOML or JSON). Defaults to $NEWS_CONFIG_PATH, then config/news.toml.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// HTTP API + scheduler
    Serve,
    /// Scheduler only, until Ctrl-C
    Daemon,
    /// Run one update cycle now
    Update,
    /// Print cached articles
    Show {
        #[arg(long, default_value_t = 1)]
        days: u32,
        #[arg(long)]
        category: Vec<String>,
        #[arg(long)]
        source: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List configured sources
    Sources,
    /// Statistics over the last 7 days
    Stats,
    /// Remove snapshots older than the retention window
    Cleanup,
    /// Write cached articles to a JSON file
    Export {
        #[arg(long, default_value_t = 1)]
        days: u32,
        #[arg(long)]
        out: PathBuf,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    match path {
        Some(p) => AppConfig::load_from(p),
        None => AppConfig::load_default(),
    }
}

fn print_articles(articles: &[Article], days: u32) {
    if articles.is_empty() {
        println!("No cached articles for the last {days} day(s). Run `cyber-news update` first.");
        return;
    }
    for (i, a) in articles.iter().enumerate() {
        println!(
            "{:>3}. [{:>3}] {} ({}, {})",
            i + 1,
            a.priority_score,
            a.title,
            a.source,
            a.published_date.format("%Y-%m-%d %H:%M")
        );
        if !a.keywords.is_empty() {
            println!("      keywords: {}", a.keywords.join(", "));
        }
        println!("      {}", a.url);
    }
}

async fn serve(cfg: &AppConfig) -> Result<()> {
    let metrics = Metrics::init()?;
    let aggregator = Arc::new(Aggregator::from_config(cfg)?);
    let schedule = ScheduleConfig::from_section(&cfg.schedule)?;

    let handle = scheduler::spawn(aggregator.clone(), schedule.clone());
    let mut state = AppState::new(aggregator, schedule);
    state.scheduler_running = handle.running_flag();

    let app = api::router(state).merge(metrics.router());
    let addr = format!("{}:{}", cfg.web.host, cfg.web.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("http server")?;

    handle.stop().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_ref())?;
    init_tracing(&cfg.app.log_level);

    match cli.command {
        Command::Serve => serve(&cfg).await?,
        Command::Daemon => {
            let aggregator = Arc::new(Aggregator::from_config(&cfg)?);
            let schedule = ScheduleConfig::from_section(&cfg.schedule)?;
            let handle = scheduler::spawn(aggregator, schedule);
            println!("News scheduler running. Press Ctrl+C to stop.");
            tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
            handle.stop().await;
        }
        Command::Update => {
            let aggregator = Aggregator::from_config(&cfg)?;
            let report = aggregator.update().await?;
            println!(
                "Fetched {} articles from {} sources ({} failed), cached to {}",
                report.articles.len(),
                report.sources_total,
                report.sources_failed,
                report.cache_file.display()
            );
        }
        Command::Show {
            days,
            category,
            source,
            limit,
        } => {
            let aggregator = Aggregator::from_config(&cfg)?;
            let filter = ArticleFilter {
                categories: category,
                sources: source,
                limit: Some(limit.unwrap_or(cfg.cli.max_articles_display)),
            };
            let articles = filter.apply(aggregator.load_cached(days));
            print_articles(&articles, days);
        }
        Command::Sources => {
            let aggregator = Aggregator::from_config(&cfg)?;
            for s in aggregator.sources() {
                println!("{:<30} {:<16} {}", s.name, s.category, s.url);
            }
        }
        Command::Stats => {
            let aggregator = Aggregator::from_config(&cfg)?;
            let stats = statistics(&aggregator.load_cached(7));
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Cleanup => {
            let aggregator = Aggregator::from_config(&cfg)?;
            let removed = aggregator.evict_expired()?;
            println!("Removed {removed} old snapshot file(s)");
        }
        Command::Export { days, out } => {
            let aggregator = Aggregator::from_config(&cfg)?;
            let articles = aggregator.load_cached(days);
            let json = serde_json::to_string_pretty(&articles)?;
            std::fs::write(&out, json).with_context(|| format!("writing {}", out.display()))?;
            println!("Exported {} articles to {}", articles.len(), out.display());
        }
    }

    Ok(())
}
