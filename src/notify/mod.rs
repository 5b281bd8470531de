// src/notify/mod.rs
//! Chat notification channel.
//!
//! Articles go out in small sub-batches with a fixed pause in between, which keeps
//! us under webhook rate limits without having to react to 429s.

pub mod discord;
pub mod slack;

use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::ingest::truncate_chars;
use crate::ingest::types::Article;

pub use discord::DiscordNotifier;
pub use slack::SlackNotifier;

pub const BATCH_SIZE: usize = 5;
pub const BATCH_PAUSE: Duration = Duration::from_secs(1);
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver summarized articles. Partial delivery is reported as an error.
    async fn send(&self, articles: &[Article]) -> Result<()>;
    /// Best-effort failure alert.
    async fn send_error(&self, message: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Sub-batch size and the pause between sub-batches.
#[derive(Debug, Clone, Copy)]
pub struct BatchPolicy {
    pub size: usize,
    pub pause: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            size: BATCH_SIZE,
            pause: BATCH_PAUSE,
        }
    }
}

/// Retry settings for one webhook POST. Only transport errors and 5xx are retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

pub(crate) async fn post_json_with_retry<T: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    payload: &T,
    retry: RetryPolicy,
) -> Result<()> {
    let mut attempt: u8 = 0;
    loop {
        attempt += 1;
        let res = client
            .post(url)
            .timeout(WEBHOOK_TIMEOUT)
            .json(payload)
            .send()
            .await;

        let retryable = match res {
            Ok(rsp) => {
                let status = rsp.status();
                if status.is_success() {
                    return Ok(());
                }
                if status == StatusCode::TOO_MANY_REQUESTS {
                    return Err(anyhow!("webhook rate limited (429)"));
                }
                if !status.is_server_error() {
                    let body = rsp.text().await.unwrap_or_default();
                    return Err(anyhow!("webhook HTTP error {status}: {body}"));
                }
                anyhow!("webhook HTTP error {status}")
            }
            Err(e) => anyhow!("webhook request failed: {e}"),
        };

        if attempt >= retry.max_attempts {
            return Err(retryable);
        }
        tracing::debug!(attempt, error = %retryable, "webhook post failed, retrying");
        tokio::time::sleep(retry.backoff * (1u32 << (attempt - 1))).await;
    }
}

/// Send `articles` chunk by chunk through `post`, pausing between chunks.
/// Every chunk is attempted; failures are collected into one error.
pub(crate) async fn deliver_in_batches<'a, F, Fut>(
    articles: &'a [Article],
    policy: BatchPolicy,
    mut post: F,
) -> Result<()>
where
    F: FnMut(usize, usize, &'a [Article]) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    let size = policy.size.max(1);
    let total = articles.len().div_ceil(size);
    let mut failed = 0usize;
    let mut last_err = None;

    for (idx, chunk) in articles.chunks(size).enumerate() {
        if idx > 0 && !policy.pause.is_zero() {
            tokio::time::sleep(policy.pause).await;
        }
        if let Err(e) = post(idx, total, chunk).await {
            tracing::warn!(error = ?e, batch = idx + 1, of = total, "sub-batch delivery failed");
            failed += 1;
            last_err = Some(e);
        }
    }

    match last_err {
        None => {
            tracing::info!(articles = articles.len(), batches = total, "notification delivered");
            Ok(())
        }
        Some(e) => Err(e.context(format!("{failed} of {total} sub-batches failed"))),
    }
}

/// Categories in first-seen order with their articles.
pub fn group_by_category(articles: &[Article]) -> Vec<(&str, Vec<&Article>)> {
    let mut groups: Vec<(&str, Vec<&Article>)> = Vec::new();
    for a in articles {
        match groups.iter_mut().find(|(c, _)| *c == a.category) {
            Some((_, items)) => items.push(a),
            None => groups.push((a.category.as_str(), vec![a])),
        }
    }
    groups
}

/// Clip to `max` chars, replacing the tail with "..." when it does not fit.
pub fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let (head, _) = truncate_chars(s, max.saturating_sub(3));
    format!("{head}...")
}

// Lets the binary keep a handle for failure alerts after the pipeline owns the notifier.
#[async_trait::async_trait]
impl<T: Notifier + ?Sized> Notifier for std::sync::Arc<T> {
    async fn send(&self, articles: &[Article]) -> Result<()> {
        (**self).send(articles).await
    }
    async fn send_error(&self, message: &str) -> Result<()> {
        (**self).send_error(message).await
    }
    fn name(&self) -> &'static str {
        (**self).name()
    }
}

// --- Test helper ---
#[derive(Default)]
pub struct MockNotifier {
    /// Article links per `send` call.
    pub sent: std::sync::Mutex<Vec<Vec<String>>>,
    pub errors: std::sync::Mutex<Vec<String>>,
    pub fail: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Vec<String>> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, articles: &[Article]) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push(articles.iter().map(|a| a.link.clone()).collect());
        if self.fail {
            return Err(anyhow!("mock notifier down"));
        }
        Ok(())
    }

    async fn send_error(&self, message: &str) -> Result<()> {
        self.errors.lock().unwrap().push(message.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
