// tests/config_load.rs
use cyber_news::config::{AppConfig, ENV_CONFIG_PATH};
use cyber_news::SourceRegistry;
use std::{env, fs};

const SAMPLE: &str = r#"
[app]
cache_dir = "./var/cache"

[[news_sources.rss_feeds]]
name = "The Hacker News"
url = "https://feeds.feedburner.com/TheHackersNews"
category = "General"

[[news_sources.rss_feeds]]
name = "Disabled Feed"
url = "https://disabled.example/rss"
category = "industry"
enabled = false

[[news_sources.official_sources]]
name = "CISA Alerts"
url = "https://www.cisa.gov/cybersecurity-advisories/all.xml"
category = "alerts"

[content]
priority_keywords = ["zero-day", "ransomware"]
exclude_keywords = ["webinar"]
min_article_length = 80
max_article_age_days = 3

[content.category_weights]
research = 8

[schedule]
fetch_times = ["07:30", "19:00"]
cache_retention_days = 14
"#;

#[test]
fn toml_file_populates_every_section() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("news.toml");
    fs::write(&p, SAMPLE).unwrap();

    let cfg = AppConfig::load_from(&p).unwrap();
    assert_eq!(cfg.content.min_article_length, 80);
    assert_eq!(cfg.content.max_articles_per_source, 20);
    assert_eq!(cfg.content.max_article_age_days(cfg.schedule.cache_retention_days), 3);
    assert_eq!(cfg.schedule.cache_retention_days, 14);
    assert_eq!(cfg.schedule.fetch_times().unwrap().len(), 2);
    assert_eq!(cfg.content.category_weights.get("research"), Some(&8));

    let reg = SourceRegistry::from_config(&cfg.news_sources);
    let all = reg.all_sources();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].category, "general");
    assert_eq!(all[1].name, "CISA Alerts");
}

#[test]
fn invalid_schedule_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("news.toml");
    fs::write(&p, "[schedule]\nfetch_times = [\"noon\"]\n").unwrap();
    assert!(AppConfig::load_from(&p).is_err());
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // isolate CWD so the repo's own config/ doesn't leak in
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_CONFIG_PATH);

    // nothing on disk → defaults
    let cfg = AppConfig::load_default().unwrap();
    assert!(cfg.news_sources.rss_feeds.is_empty());
    assert_eq!(cfg.schedule.cache_retention_days, 7);

    // ./config/news.toml fallback
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(tmp.path().join("config/news.toml"), SAMPLE).unwrap();
    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg.schedule.cache_retention_days, 14);

    // env wins
    let p_env = tmp.path().join("other.json");
    fs::write(&p_env, r#"{"schedule": {"cache_retention_days": 3}}"#).unwrap();
    env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg.schedule.cache_retention_days, 3);

    // env pointing nowhere is an error
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
    assert!(AppConfig::load_default().is_err());
    env::remove_var(ENV_CONFIG_PATH);

    env::set_current_dir(&old).unwrap();
}
