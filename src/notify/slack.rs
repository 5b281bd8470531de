// src/notify/slack.rs
use anyhow::Result;
use reqwest::Client;

use super::{clip, deliver_in_batches, group_by_category, post_json_with_retry, BatchPolicy, Notifier, RetryPolicy};
use crate::ingest::types::Article;

const SUMMARY_MAX: usize = 300;

pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
    batch: BatchPolicy,
    retry: RetryPolicy,
}

impl SlackNotifier {
    pub fn new(url: String) -> Self {
        Self {
            webhook_url: url,
            client: Client::new(),
            batch: BatchPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_batch(mut self, batch: BatchPolicy) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn post_text(&self, text: String) -> Result<()> {
        let body = serde_json::json!({ "text": text });
        post_json_with_retry(&self.client, &self.webhook_url, &body, self.retry).await
    }
}

/// mrkdwn body for one sub-batch.
fn digest_text(chunk: &[Article], idx: usize, total_batches: usize, total_articles: usize) -> String {
    let mut text = format!("*News digest* - {total_articles} new articles");
    if total_batches > 1 {
        text.push_str(&format!(" ({}/{total_batches})", idx + 1));
    }
    for (category, items) in group_by_category(chunk) {
        text.push_str(&format!("\n\n*{category}*"));
        for a in items {
            let title = if a.title.trim().is_empty() { "(untitled)" } else { a.title.as_str() };
            if a.link.trim().is_empty() {
                text.push_str(&format!("\n• *{title}*"));
            } else {
                text.push_str(&format!("\n• *<{}|{title}>*", a.link));
            }
            if let Some(s) = a.summary.as_deref().filter(|s| !s.trim().is_empty()) {
                text.push_str(&format!("\n  {}", clip(s, SUMMARY_MAX)));
            }
            text.push_str(&format!("\n  _{}_", a.source_name));
        }
    }
    text
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, articles: &[Article]) -> Result<()> {
        if articles.is_empty() {
            return Ok(());
        }
        let total_articles = articles.len();
        deliver_in_batches(articles, self.batch, |idx, total, chunk| {
            let text = digest_text(chunk, idx, total, total_articles);
            async move { self.post_text(text).await }
        })
        .await
    }

    async fn send_error(&self, message: &str) -> Result<()> {
        self.post_text(format!(":warning: *RSS Bot run failed*\n```{}```", clip(message, 2000)))
            .await
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
