// src/pipeline.rs
//! One run: load dedup set, fetch, keep unseen, summarize a bounded batch,
//! notify, persist.

use metrics::{counter, describe_counter, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::ingest::types::{Article, FeedDescriptor, FeedSource};
use crate::ingest::{collect_articles, truncate_chars, DEFAULT_ITEMS_PER_FEED};
use crate::notify::Notifier;
use crate::store::{DedupSet, DedupStore};
use crate::summarize::{FallbackChain, SummaryStats};

/// Articles summarized per run; the rest wait for the next run.
pub const MAX_ARTICLES_PER_RUN: usize = 20;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_articles_fetched_total", "Articles parsed from feeds.");
        describe_counter!("digest_articles_new_total", "Fetched articles not in the dedup set.");
        describe_counter!("digest_summaries_total", "Summaries by outcome and provider.");
        describe_counter!("digest_feed_errors_total", "Feeds that failed to fetch or parse.");
        describe_counter!("digest_notify_errors_total", "Failed notification deliveries.");
        describe_counter!("digest_store_errors_total", "Dedup store load/save failures.");
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadDedup,
    Fetch,
    FilterNew,
    CapBatch,
    Summarize,
    Notify,
    PersistDedup,
    Done,
}

/// What happened in one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub known_before: usize,
    pub fetched: usize,
    pub new: usize,
    pub deferred: usize,
    pub summarized: usize,
    pub skipped: usize,
    pub stats: SummaryStats,
    pub notified: bool,
    pub notify_error: Option<String>,
    /// `None` when nothing needed persisting.
    pub persisted: Option<bool>,
    pub known_after: usize,
}

/// Stable filter: unseen articles in fetch order.
pub fn filter_new(articles: Vec<Article>, known: &DedupSet) -> Vec<Article> {
    articles
        .into_iter()
        .filter(|a| !known.contains(&a.id))
        .collect()
}

/// Keep the first `max`; returns how many were deferred.
pub fn cap_batch(mut articles: Vec<Article>, max: usize) -> (Vec<Article>, usize) {
    let deferred = articles.len().saturating_sub(max);
    articles.truncate(max);
    (articles, deferred)
}

pub struct Pipeline {
    feeds: Vec<FeedDescriptor>,
    source: Box<dyn FeedSource>,
    chain: FallbackChain,
    notifier: Box<dyn Notifier>,
    store: DedupStore,
    max_per_run: usize,
    items_per_feed: usize,
}

impl Pipeline {
    pub fn new(
        feeds: Vec<FeedDescriptor>,
        source: Box<dyn FeedSource>,
        chain: FallbackChain,
        notifier: Box<dyn Notifier>,
        store: DedupStore,
    ) -> Self {
        Self {
            feeds,
            source,
            chain,
            notifier,
            store,
            max_per_run: MAX_ARTICLES_PER_RUN,
            items_per_feed: DEFAULT_ITEMS_PER_FEED,
        }
    }

    pub fn with_max_per_run(mut self, max: usize) -> Self {
        self.max_per_run = max;
        self
    }

    pub fn with_items_per_feed(mut self, n: usize) -> Self {
        self.items_per_feed = n;
        self
    }

    /// Single sequential pass. Notification and storage failures are recorded
    /// in the report, never raised.
    pub async fn run(&self) -> RunReport {
        ensure_metrics_described();
        let mut report = RunReport::default();

        enter(Stage::LoadDedup);
        let mut working = self.store.load().await;
        report.known_before = working.len();

        enter(Stage::Fetch);
        let fetched = collect_articles(self.source.as_ref(), &self.feeds, self.items_per_feed).await;
        report.fetched = fetched.len();

        enter(Stage::FilterNew);
        let fresh = filter_new(fetched, &working);
        report.new = fresh.len();
        counter!("digest_articles_new_total").increment(fresh.len() as u64);
        tracing::info!(new = fresh.len(), known = report.known_before, "filtered unseen articles");
        if fresh.is_empty() {
            report.known_after = working.len();
            enter(Stage::Done);
            tracing::info!("no new articles");
            return report;
        }

        enter(Stage::CapBatch);
        let (batch, deferred) = cap_batch(fresh, self.max_per_run);
        report.deferred = deferred;
        if deferred > 0 {
            tracing::info!(deferred, cap = self.max_per_run, "deferring articles to next run");
        }

        enter(Stage::Summarize);
        let mut stats = SummaryStats::default();
        let mut summarized = Vec::with_capacity(batch.len());
        let total = batch.len();
        for (i, article) in batch.into_iter().enumerate() {
            let outcome = self.chain.summarize(&article.title, &article.raw_content).await;
            stats.record(&outcome);
            let Some(summary) = outcome.into_summary().filter(|s| !s.trim().is_empty()) else {
                tracing::warn!(n = i + 1, of = total, id = %article.id, "no summary, will retry next run");
                report.skipped += 1;
                continue;
            };
            tracing::info!(
                n = i + 1,
                of = total,
                source = %article.source_name,
                title = truncate_chars(&article.title, 60).0,
                "summarized"
            );
            working.insert(article.id.clone());
            summarized.push(article.with_summary(summary));
        }
        report.summarized = summarized.len();
        report.stats = stats;
        log_stats(&stats);

        if !summarized.is_empty() {
            enter(Stage::Notify);
            match self.notifier.send(&summarized).await {
                Ok(()) => report.notified = true,
                Err(e) => {
                    tracing::error!(error = ?e, notifier = self.notifier.name(), "notification failed");
                    counter!("digest_notify_errors_total").increment(1);
                    report.notify_error = Some(format!("{e:#}"));
                }
            }
        }

        // Persist regardless of the notification outcome.
        enter(Stage::PersistDedup);
        let saved = self.store.save(working.as_slice()).await;
        report.persisted = Some(saved);
        report.known_after = working.len().min(self.store.cap());
        gauge!("digest_dedup_size").set(report.known_after as f64);

        enter(Stage::Done);
        report
    }
}

fn enter(stage: Stage) {
    tracing::debug!(?stage, "stage");
}

fn log_stats(stats: &SummaryStats) {
    if let Some(rate) = stats.success_rate() {
        tracing::info!(
            success = stats.success,
            fail = stats.fail,
            total = stats.total(),
            rate = %format!("{rate:.1}%"),
            "summary stats"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::article_id;

    fn art(url: &str) -> Article {
        let feed = FeedDescriptor::new("https://f.test", "F", "Tech");
        Article::new(&feed, url, url, "", "")
    }

    #[test]
    fn filter_is_stable_and_excludes_known() {
        let known: DedupSet = [article_id("a")].into_iter().collect();
        let out = filter_new(vec![art("c"), art("a"), art("b")], &known);
        let links: Vec<_> = out.iter().map(|a| a.link.as_str()).collect();
        assert_eq!(links, vec!["c", "b"]);
    }

    #[test]
    fn cap_defers_the_tail() {
        let arts: Vec<_> = (0..35).map(|i| art(&i.to_string())).collect();
        let (kept, deferred) = cap_batch(arts, MAX_ARTICLES_PER_RUN);
        assert_eq!(kept.len(), 20);
        assert_eq!(deferred, 15);
        assert_eq!(kept[19].link, "19");

        let (kept, deferred) = cap_batch(vec![art("x")], MAX_ARTICLES_PER_RUN);
        assert_eq!((kept.len(), deferred), (1, 0));
    }
}
