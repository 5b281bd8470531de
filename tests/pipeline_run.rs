// tests/pipeline_run.rs
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use rss_ai_digest::notify::MockNotifier;
use rss_ai_digest::store::MemoryBlob;
use rss_ai_digest::summarize::providers::MockSummarizer;
use rss_ai_digest::{
    article_id, Article, DedupStore, FallbackChain, FeedDescriptor, FeedSource, Pipeline, Summarizer,
};

/// Serves a fixed article list per feed url; unknown urls fail.
struct StaticSource {
    feeds: Mutex<Vec<(String, Vec<Article>)>>,
}

impl StaticSource {
    fn new(feed: &FeedDescriptor, links: &[&str]) -> Self {
        let articles = links
            .iter()
            .map(|l| Article::new(feed, format!("Title {l}"), *l, format!("Body of {l}"), "2024-01-01T00:00:00Z"))
            .collect();
        Self::with_articles(feed, articles)
    }

    fn with_articles(feed: &FeedDescriptor, articles: Vec<Article>) -> Self {
        Self {
            feeds: Mutex::new(vec![(feed.url.clone(), articles)]),
        }
    }
}

#[async_trait]
impl FeedSource for StaticSource {
    async fn fetch(&self, feed: &FeedDescriptor) -> Result<Vec<Article>> {
        self.feeds
            .lock()
            .unwrap()
            .iter()
            .find(|(url, _)| *url == feed.url)
            .map(|(_, a)| a.clone())
            .ok_or_else(|| anyhow!("unreachable feed {}", feed.url))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

fn feed() -> FeedDescriptor {
    FeedDescriptor::new("https://news.test/rss", "News Test", "Tech")
}

fn chain_ok() -> FallbackChain {
    FallbackChain::new(vec![Box::new(MockSummarizer::replying("mock", "A short summary."))])
}

fn blob_with(ids: &[&str]) -> Arc<MemoryBlob> {
    let list: Vec<String> = ids.iter().map(|l| article_id(l)).collect();
    Arc::new(MemoryBlob::with_content(serde_json::to_string(&list).unwrap()))
}

fn pipeline(
    links: &[&str],
    chain: FallbackChain,
    notifier: Arc<MockNotifier>,
    blob: Arc<MemoryBlob>,
) -> Pipeline {
    let f = feed();
    Pipeline::new(
        vec![f.clone()],
        Box::new(StaticSource::new(&f, links)),
        chain,
        Box::new(notifier),
        DedupStore::new(Box::new(blob)),
    )
}

#[tokio::test]
async fn known_article_is_skipped_and_rest_are_sent_and_persisted() {
    let notifier = Arc::new(MockNotifier::new());
    let blob = blob_with(&["https://x/a"]);
    let p = pipeline(
        &["https://x/a", "https://x/b", "https://x/c"],
        chain_ok(),
        notifier.clone(),
        blob.clone(),
    );

    let report = p.run().await;

    assert_eq!(notifier.sent(), vec![vec!["https://x/b".to_string(), "https://x/c".to_string()]]);
    assert_eq!(report.new, 2);
    assert_eq!(report.summarized, 2);
    assert!(report.notified);
    assert_eq!(report.persisted, Some(true));
    assert_eq!(
        blob.ids(),
        vec![article_id("https://x/a"), article_id("https://x/b"), article_id("https://x/c")]
    );
}

#[tokio::test]
async fn second_run_without_new_articles_is_a_no_op() {
    let notifier = Arc::new(MockNotifier::new());
    let blob = Arc::new(MemoryBlob::new());
    let links = ["https://x/1", "https://x/2"];

    let first = pipeline(&links, chain_ok(), notifier.clone(), blob.clone()).run().await;
    assert_eq!(first.summarized, 2);
    let after_first = blob.snapshot();

    let second = pipeline(&links, chain_ok(), notifier.clone(), blob.clone()).run().await;
    assert_eq!(second.new, 0);
    assert_eq!(second.persisted, None);
    assert_eq!(notifier.sent().len(), 1);
    assert_eq!(blob.snapshot(), after_first);
}

#[tokio::test]
async fn batch_cap_defers_the_rest_to_the_next_run() {
    let links: Vec<String> = (0..35).map(|i| format!("https://x/{i}")).collect();
    let refs: Vec<&str> = links.iter().map(String::as_str).collect();
    let notifier = Arc::new(MockNotifier::new());
    let blob = Arc::new(MemoryBlob::new());

    let first = pipeline(&refs, chain_ok(), notifier.clone(), blob.clone())
        .with_items_per_feed(100)
        .run()
        .await;
    assert_eq!(first.new, 35);
    assert_eq!(first.summarized, 20);
    assert_eq!(first.deferred, 15);
    assert_eq!(notifier.sent()[0].len(), 20);
    assert_eq!(notifier.sent()[0][19], "https://x/19");

    let second = pipeline(&refs, chain_ok(), notifier.clone(), blob.clone())
        .with_items_per_feed(100)
        .run()
        .await;
    assert_eq!(second.new, 15);
    assert_eq!(second.summarized, 15);
    assert_eq!(blob.ids().len(), 35);
}

#[tokio::test]
async fn fallback_stops_at_first_success() {
    let a = MockSummarizer::failing("a");
    let b = MockSummarizer::replying("b", "from b");
    let c = MockSummarizer::replying("c", "from c");
    let (a_calls, b_calls, c_calls) = (a.calls(), b.calls(), c.calls());
    let providers: Vec<Box<dyn Summarizer>> = vec![Box::new(a), Box::new(b), Box::new(c)];

    let report = pipeline(
        &["https://x/only"],
        FallbackChain::new(providers),
        Arc::new(MockNotifier::new()),
        Arc::new(MemoryBlob::new()),
    )
    .run()
    .await;

    assert_eq!(report.stats.success, 1);
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    assert_eq!(c_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn no_working_provider_still_delivers_degraded_summaries() {
    let providers: Vec<Box<dyn Summarizer>> = vec![
        Box::new(MockSummarizer::unconfigured("a")),
        Box::new(MockSummarizer::failing("b")),
    ];
    let notifier = Arc::new(MockNotifier::new());
    let blob = Arc::new(MemoryBlob::new());

    let report = pipeline(&["https://x/d"], FallbackChain::new(providers), notifier.clone(), blob.clone())
        .run()
        .await;

    assert_eq!(report.stats.fail, 1);
    assert_eq!(report.summarized, 1);
    assert_eq!(notifier.sent().len(), 1);
    assert_eq!(blob.ids(), vec![article_id("https://x/d")]);
}

#[tokio::test]
async fn notification_failure_still_persists() {
    let notifier = Arc::new(MockNotifier::failing());
    let blob = Arc::new(MemoryBlob::new());

    let report = pipeline(&["https://x/n"], chain_ok(), notifier, blob.clone()).run().await;

    assert!(!report.notified);
    assert!(report.notify_error.is_some());
    assert_eq!(report.persisted, Some(true));
    assert_eq!(blob.ids(), vec![article_id("https://x/n")]);
}

#[tokio::test]
async fn storage_failure_is_reported_not_raised() {
    let notifier = Arc::new(MockNotifier::new());
    let report = pipeline(&["https://x/s"], chain_ok(), notifier.clone(), Arc::new(MemoryBlob::failing()))
        .run()
        .await;

    assert_eq!(report.known_before, 0);
    assert!(report.notified);
    assert_eq!(report.persisted, Some(false));
}

#[tokio::test]
async fn failing_feed_does_not_stop_others() {
    let good = feed();
    let bad = FeedDescriptor::new("https://down.test/rss", "Down", "News");
    let notifier = Arc::new(MockNotifier::new());
    let p = Pipeline::new(
        vec![bad, good.clone()],
        Box::new(StaticSource::new(&good, &["https://x/ok"])),
        chain_ok(),
        Box::new(notifier.clone()),
        DedupStore::new(Box::new(MemoryBlob::new())),
    );

    let report = p.run().await;
    assert_eq!(report.fetched, 1);
    assert_eq!(notifier.sent(), vec![vec!["https://x/ok".to_string()]]);
}

#[tokio::test]
async fn article_without_any_summary_is_left_for_the_next_run() {
    let f = feed();
    let bare = Article::new(&f, "Title only", "https://x/bare", "", "");
    let notifier = Arc::new(MockNotifier::new());
    let blob = Arc::new(MemoryBlob::new());
    let run = || {
        let providers: Vec<Box<dyn Summarizer>> = vec![Box::new(MockSummarizer::failing("down"))];
        Pipeline::new(
            vec![f.clone()],
            Box::new(StaticSource::with_articles(&f, vec![bare.clone()])),
            FallbackChain::new(providers),
            Box::new(notifier.clone()),
            DedupStore::new(Box::new(blob.clone())),
        )
    };

    let first = run().run().await;
    assert_eq!(first.new, 1);
    assert_eq!(first.skipped, 1);
    assert_eq!(first.summarized, 0);
    assert_eq!(first.stats.fail, 1);
    assert!(!first.notified);
    assert!(notifier.sent().is_empty());
    assert!(!blob.ids().contains(&article_id("https://x/bare")));

    let second = run().run().await;
    assert_eq!(second.new, 1);
    assert_eq!(second.skipped, 1);
}
