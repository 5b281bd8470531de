// tests/config_env.rs
use rss_ai_digest::config::{load_feeds_default, load_feeds_from, AppConfig, StoreConfig};
use std::{env, fs};

const ENV_KEYS: &[&str] = &[
    "FEEDS_CONFIG_PATH",
    "DISCORD_WEBHOOK_URL",
    "SLACK_WEBHOOK_URL",
    "GIST_TOKEN",
    "GIST_ID",
    "DEDUP_STORE_PATH",
    "SUMMARY_PROVIDERS",
    "MAX_ARTICLES_PER_RUN",
    "ITEMS_PER_FEED",
];

fn clear_env() {
    for k in ENV_KEYS {
        env::remove_var(k);
    }
}

#[test]
fn toml_and_json_files_parse() {
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("feeds.toml");
    fs::write(
        &p_toml,
        r#"
[[feeds]]
url = "https://a.test/rss"
name = "A"
category = "Tech"

[[feeds]]
url = "https://b.test/rss"
name = " B "
"#,
    )
    .unwrap();
    let v = load_feeds_from(&p_toml).unwrap();
    assert_eq!(v.len(), 2);
    assert_eq!(v[1].name, "B");
    assert_eq!(v[1].category, "Uncategorized");

    let p_json = dir.path().join("feeds.json");
    fs::write(&p_json, r#"{"feeds":[{"url":"https://c.test","name":"C","category":"News"}]}"#).unwrap();
    let vj = load_feeds_from(&p_json).unwrap();
    assert_eq!(vj[0].category, "News");
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // Isolate CWD so the repo's own config/ is not read.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();

    // 1) nothing at all
    assert!(load_feeds_default().is_err());

    // 2) ./config/feeds.json
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("feeds.json"), r#"{"feeds":[{"url":"https://j.test","name":"J"}]}"#).unwrap();
    assert_eq!(load_feeds_default().unwrap()[0].name, "J");

    // 3) TOML beats JSON
    fs::write(cfg_dir.join("feeds.toml"), "[[feeds]]\nurl = \"https://t.test\"\nname = \"T\"\n").unwrap();
    assert_eq!(load_feeds_default().unwrap()[0].name, "T");

    // 4) env path beats both
    let p_env = tmp.path().join("custom.json");
    fs::write(&p_env, r#"{"feeds":[{"url":"https://e.test","name":"E"}]}"#).unwrap();
    env::set_var("FEEDS_CONFIG_PATH", p_env.display().to_string());
    assert_eq!(load_feeds_default().unwrap()[0].name, "E");

    // 5) env path to nowhere is an error, not a silent fallback
    env::set_var("FEEDS_CONFIG_PATH", tmp.path().join("nope.json").display().to_string());
    assert!(load_feeds_default().is_err());

    clear_env();
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn from_env_reads_process_environment() {
    let tmp = tempfile::tempdir().unwrap();
    clear_env();
    let feeds = tmp.path().join("feeds.json");
    fs::write(&feeds, r#"{"feeds":[{"url":"https://a.test","name":"A"}]}"#).unwrap();
    env::set_var("FEEDS_CONFIG_PATH", feeds.display().to_string());

    // notifier missing
    env::set_var("DEDUP_STORE_PATH", tmp.path().join("ids.json").display().to_string());
    assert!(AppConfig::from_env().is_err());

    env::set_var("SLACK_WEBHOOK_URL", "https://hooks.slack.test/x");
    env::set_var("ITEMS_PER_FEED", "not-a-number");
    let cfg = AppConfig::from_env().unwrap();
    assert!(matches!(cfg.store, StoreConfig::File { .. }));
    assert_eq!(cfg.items_per_feed, 10);
    assert_eq!(cfg.feeds.len(), 1);

    clear_env();
}
