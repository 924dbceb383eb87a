// src/scheduler.rs
//! Timer task: update cycles at configured times of day, cache cleanup once a day.
//! Stopped through a watch channel, never by polling a flag.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::aggregator::{Aggregator, AggregatorError, UpdateReport};
use crate::config::ScheduleSection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Job {
    Update,
    Cleanup,
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub fetch_times: Vec<NaiveTime>,
    pub cleanup_time: NaiveTime,
}

impl ScheduleConfig {
    pub fn from_section(s: &ScheduleSection) -> Result<Self> {
        let mut fetch_times = s.fetch_times()?;
        fetch_times.sort();
        fetch_times.dedup();
        Ok(Self {
            fetch_times,
            cleanup_time: s.cleanup_time()?,
        })
    }

    pub fn job_count(&self) -> usize {
        self.fetch_times.len() + 1
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NextRun {
    pub job: Job,
    pub next_run: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub scheduled_jobs: usize,
    pub next_runs: Vec<NextRun>,
    pub last_update: String,
}

/// Next time-of-day `at` strictly after `now`.
pub fn next_occurrence(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

/// Every job's next run, soonest first.
pub fn next_runs(cfg: &ScheduleConfig, now: NaiveDateTime) -> Vec<(Job, NaiveDateTime)> {
    let mut out: Vec<(Job, NaiveDateTime)> = cfg
        .fetch_times
        .iter()
        .map(|t| (Job::Update, next_occurrence(now, *t)))
        .collect();
    out.push((Job::Cleanup, next_occurrence(now, cfg.cleanup_time)));
    out.sort_by_key(|(_, at)| *at);
    out
}

/// The soonest run time and every job scheduled for it, updates before cleanup.
pub fn due_jobs(cfg: &ScheduleConfig, now: NaiveDateTime) -> Option<(NaiveDateTime, Vec<Job>)> {
    let runs = next_runs(cfg, now);
    let at = runs.first()?.1;
    let mut jobs: Vec<Job> = runs
        .into_iter()
        .take_while(|(_, t)| *t == at)
        .map(|(job, _)| job)
        .collect();
    // duplicate fetch times collapse to one update
    jobs.dedup();
    Some((at, jobs))
}

pub fn status(
    cfg: &ScheduleConfig,
    aggregator: &Aggregator,
    is_running: bool,
    now: NaiveDateTime,
) -> SchedulerStatus {
    SchedulerStatus {
        is_running,
        scheduled_jobs: cfg.job_count(),
        next_runs: next_runs(cfg, now)
            .into_iter()
            .map(|(job, at)| NextRun {
                job,
                next_run: at.format("%Y-%m-%d %H:%M:%S").to_string(),
            })
            .collect(),
        last_update: aggregator
            .cache()
            .last_update()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "Never".to_string()),
    }
}

/// Immediate cycle outside the timer. Serialised with scheduled cycles by the aggregator lock.
pub async fn force_update(aggregator: &Aggregator) -> Result<UpdateReport, AggregatorError> {
    info!(target: "scheduler", "force update requested");
    aggregator.update().await
}

async fn run_job(aggregator: &Aggregator, job: Job) {
    match job {
        Job::Update => match aggregator.update().await {
            Ok(r) => info!(
                target: "scheduler",
                articles = r.articles.len(),
                failed_sources = r.sources_failed,
                "scheduled update completed"
            ),
            Err(e) => error!(target: "scheduler", error = %e, "scheduled update failed"),
        },
        Job::Cleanup => match aggregator.evict_expired() {
            Ok(n) => info!(target: "scheduler", removed = n, "scheduled cleanup completed"),
            Err(e) => error!(target: "scheduler", error = %e, "scheduled cleanup failed"),
        },
    }
}

pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    running: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Signal the loop and wait for it. A cycle in progress finishes first.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.join.await {
            warn!(target: "scheduler", error = %e, "scheduler task ended abnormally");
        }
        info!(target: "scheduler", "news scheduler stopped");
    }
}

/// Spawn the timer loop on the current runtime.
pub fn spawn(aggregator: Arc<Aggregator>, cfg: ScheduleConfig) -> SchedulerHandle {
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();

    for t in &cfg.fetch_times {
        info!(target: "scheduler", at = %t.format("%H:%M"), "scheduled news update");
    }
    info!(target: "scheduler", at = %cfg.cleanup_time.format("%H:%M"), "scheduled cache cleanup");

    let join = tokio::spawn(async move {
        loop {
            let now = Local::now().naive_local();
            let Some((at, jobs)) = due_jobs(&cfg, now) else {
                break;
            };
            let wait = (at - now).to_std().unwrap_or_default();

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    for job in jobs {
                        run_job(&aggregator, job).await;
                    }
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
        flag.store(false, Ordering::SeqCst);
    });

    info!(target: "scheduler", "news scheduler started");
    SchedulerHandle {
        stop_tx,
        running,
        join,
    }
}
