// tests/pipeline_update.rs
mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{aggregator, aggregator_with, rss, Item, LONG_BODY};
use cyber_news::aggregator::CycleState;
use cyber_news::cache::{self, CacheStore};
use cyber_news::ingest::fetcher::{FixtureResponse, FixtureTransport};
use cyber_news::ingest::types::{FeedTransport, FetchError};
use cyber_news::Source;

const A_URL: &str = "https://a.example/rss";
const B_URL: &str = "https://b.example/rss";

#[tokio::test]
async fn failed_source_and_excluded_entry_leave_two_articles() {
    let dir = tempfile::tempdir().unwrap();
    let a_feed = rss(&[
        Item {
            title: "Sponsored: the firewall your board will love",
            link: "https://a.example/ad",
            description: LONG_BODY,
            hours_ago: 1,
        },
        Item {
            title: "Ransomware crew leaks city payroll data",
            link: "https://a.example/ransomware",
            description: LONG_BODY,
            hours_ago: 2,
        },
        Item {
            title: "Browser update closes sandbox escape",
            link: "https://a.example/browser",
            description: LONG_BODY,
            hours_ago: 3,
        },
    ]);
    let transport = FixtureTransport::new().with_body(A_URL, &a_feed).with(
        B_URL,
        FixtureResponse::Delayed {
            delay: Duration::from_secs(5),
            body: a_feed.clone(),
        },
    );
    let agg = aggregator(
        vec![
            Source::new("Source A", A_URL, "threats"),
            Source::new("Source B", B_URL, "general"),
        ],
        transport,
        Duration::from_millis(200),
        dir.path(),
    );

    let report = agg.update().await.expect("cycle succeeds");
    assert_eq!(report.articles.len(), 2);
    assert_eq!(report.sources_total, 2);
    assert_eq!(report.sources_failed, 1);
    assert_eq!(report.entries_fetched, 3);
    assert_eq!(report.entries_filtered, 1);
    assert_eq!(agg.state(), CycleState::Idle);

    // highest score first: ransomware keyword + threats weight
    assert_eq!(report.articles[0].url, "https://a.example/ransomware");
    assert_eq!(report.articles[0].priority_score, 10 + 12);
    assert_eq!(report.articles[1].priority_score, 12);

    let cached = CacheStore::new(dir.path()).load(cache::today());
    assert_eq!(cached, report.articles);

    let summary = agg.last_summary().expect("summary recorded");
    assert!(summary.success);
    assert_eq!(summary.sources_failed, 1);
}

#[tokio::test]
async fn near_duplicate_across_sources_keeps_first_fetched() {
    let dir = tempfile::tempdir().unwrap();
    let a_feed = rss(&[Item {
        title: "Critical Zero-Day Found in Apache Server",
        link: "https://a.example/apache",
        description: LONG_BODY,
        hours_ago: 1,
    }]);
    let b_feed = rss(&[Item {
        title: "Critical Zero-Day Discovered in Apache Server",
        link: "https://b.example/apache",
        description: LONG_BODY,
        hours_ago: 1,
    }]);
    let transport = FixtureTransport::new()
        .with_body(A_URL, &a_feed)
        .with_body(B_URL, &b_feed);
    // B has the higher category weight; first-seen still wins
    let agg = aggregator(
        vec![
            Source::new("Source A", A_URL, "general"),
            Source::new("Source B", B_URL, "alerts"),
        ],
        transport,
        Duration::from_secs(5),
        dir.path(),
    );

    let report = agg.update().await.unwrap();
    assert_eq!(report.duplicates_removed, 1);
    assert_eq!(report.articles.len(), 1);
    assert_eq!(report.articles[0].source, "Source A");
}

#[tokio::test]
async fn non_2xx_and_garbage_sources_are_absorbed() {
    let dir = tempfile::tempdir().unwrap();
    let transport = FixtureTransport::new()
        .with(A_URL, FixtureResponse::Status(503))
        .with_body(B_URL, "<html>maintenance</html>");
    let agg = aggregator(
        vec![
            Source::new("Source A", A_URL, "general"),
            Source::new("Source B", B_URL, "general"),
        ],
        transport,
        Duration::from_secs(5),
        dir.path(),
    );

    let report = agg.update().await.expect("partial failure is still a success");
    assert!(report.articles.is_empty());
    assert_eq!(report.sources_failed, 2);
    assert!(report.cache_file.exists());
}

#[tokio::test]
async fn stale_entries_are_not_ingested() {
    let dir = tempfile::tempdir().unwrap();
    let feed = rss(&[
        Item {
            title: "Old vulnerability writeup from last month",
            link: "https://a.example/old",
            description: LONG_BODY,
            hours_ago: 24 * 30,
        },
        Item {
            title: "Fresh vulnerability writeup from this morning",
            link: "https://a.example/new",
            description: LONG_BODY,
            hours_ago: 2,
        },
    ]);
    let agg = aggregator(
        vec![Source::new("Source A", A_URL, "vulnerabilities")],
        FixtureTransport::new().with_body(A_URL, &feed),
        Duration::from_secs(5),
        dir.path(),
    );

    let report = agg.update().await.unwrap();
    assert_eq!(report.entries_fetched, 1);
    assert_eq!(report.articles[0].url, "https://a.example/new");
}

#[tokio::test]
async fn unwritable_cache_dir_fails_cycle() {
    let dir = tempfile::tempdir().unwrap();
    // blocker is a regular file, so a cache dir beneath it can't exist
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let agg = aggregator(
        vec![Source::new("Source A", A_URL, "threats")],
        FixtureTransport::new().with_body(A_URL, &one_item_feed()),
        Duration::from_secs(5),
        &blocker.join("cache"),
    );

    let err = agg.update().await.expect_err("cache write must fail");
    assert!(err.to_string().contains("cache"));
    assert_eq!(agg.state(), CycleState::Failed);
    assert!(!agg.last_summary().unwrap().success);
}

#[tokio::test]
async fn failed_write_leaves_earlier_snapshot_in_same_dir_intact() {
    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::new(dir.path());
    let today = cache::today();
    let yesterday = today.pred_opt().unwrap();

    let agg = aggregator(
        vec![Source::new("Source A", A_URL, "threats")],
        FixtureTransport::new().with_body(A_URL, &one_item_feed()),
        Duration::from_secs(5),
        dir.path(),
    );
    let first = agg.update().await.unwrap();
    std::fs::rename(store.path_for(today), store.path_for(yesterday)).unwrap();

    // a non-empty directory where today's snapshot goes makes the rename fail
    let target = store.path_for(today);
    std::fs::create_dir_all(target.join("occupied")).unwrap();

    agg.update().await.expect_err("persist over a directory must fail");
    assert_eq!(agg.state(), CycleState::Failed);

    assert_eq!(store.load(yesterday), first.articles);
    assert_eq!(agg.load_cached(2), first.articles);
    // the temp file is cleaned up with the failed write
    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names.len(), 2, "unexpected files: {names:?}");
}

#[cfg(unix)]
#[tokio::test]
async fn failed_write_keeps_todays_previous_snapshot() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::new(dir.path());
    let agg = aggregator(
        vec![Source::new("Source A", A_URL, "threats")],
        FixtureTransport::new().with_body(A_URL, &one_item_feed()),
        Duration::from_secs(5),
        dir.path(),
    );
    let first = agg.update().await.unwrap();

    let set_mode = |mode: u32| {
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(mode)).unwrap()
    };
    set_mode(0o555);
    // privileged users ignore directory permissions; nothing to observe then
    if std::fs::write(dir.path().join("writable"), b"").is_ok() {
        set_mode(0o755);
        return;
    }

    let result = agg.update().await;
    set_mode(0o755);

    assert!(result.is_err());
    assert_eq!(agg.state(), CycleState::Failed);
    assert_eq!(store.load(cache::today()), first.articles);
}

#[tokio::test]
async fn concurrent_updates_are_serialised() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(CountingTransport::new(one_item_feed(), Duration::from_millis(100)));
    let agg = aggregator_with(
        vec![Source::new("Source A", A_URL, "alerts")],
        transport.clone(),
        Duration::from_secs(5),
        dir.path(),
    );

    let (a, b) = tokio::join!(agg.update(), agg.update());
    assert_eq!(a.unwrap().articles.len(), 1);
    assert_eq!(b.unwrap().articles.len(), 1);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    assert_eq!(transport.peak.load(Ordering::SeqCst), 1, "cycles overlapped");
    assert_eq!(agg.load_cached(1).len(), 1);
}

#[tokio::test]
async fn abandoned_cycle_does_not_stay_mid_flight() {
    let dir = tempfile::tempdir().unwrap();
    let transport = FixtureTransport::new().with(
        A_URL,
        FixtureResponse::Delayed {
            delay: Duration::from_millis(300),
            body: one_item_feed(),
        },
    );
    let agg = aggregator(
        vec![Source::new("Source A", A_URL, "alerts")],
        transport,
        Duration::from_secs(5),
        dir.path(),
    );

    let dropped = tokio::time::timeout(Duration::from_millis(50), agg.update()).await;
    assert!(dropped.is_err());
    assert_eq!(agg.state(), CycleState::Failed);

    // the lock was released with the dropped future
    agg.update().await.unwrap();
    assert_eq!(agg.state(), CycleState::Idle);
}

fn one_item_feed() -> String {
    rss(&[Item {
        title: "Zero-day exploited in the wild",
        link: "https://a.example/zd",
        description: LONG_BODY,
        hours_ago: 1,
    }])
}

/// Serves one body after a delay and tracks how many calls overlap.
struct CountingTransport {
    body: String,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl CountingTransport {
    fn new(body: String, delay: Duration) -> Self {
        Self {
            body,
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl FeedTransport for CountingTransport {
    async fn get(&self, _url: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.body.clone())
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}
