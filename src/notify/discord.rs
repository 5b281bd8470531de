// src/notify/discord.rs
use anyhow::Result;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;

use super::{clip, deliver_in_batches, group_by_category, post_json_with_retry, BatchPolicy, Notifier, RetryPolicy};
use crate::ingest::types::Article;

const USERNAME: &str = "RSS Bot";
const FIELDS_PER_EMBED: usize = 5;
const MAX_EMBEDS: usize = 10;
const TITLE_MAX: usize = 100;
const SUMMARY_MAX: usize = 200;
const ERROR_MAX: usize = 1800;

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    batch: BatchPolicy,
    retry: RetryPolicy,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
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

    async fn post(&self, payload: &DiscordWebhookPayload) -> Result<()> {
        post_json_with_retry(&self.client, &self.webhook, payload, self.retry).await
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, articles: &[Article]) -> Result<()> {
        if articles.is_empty() {
            return Ok(());
        }
        let total_articles = articles.len();
        deliver_in_batches(articles, self.batch, |idx, total, chunk| {
            let payload = DiscordWebhookPayload::digest(chunk, idx, total, total_articles);
            async move { self.post(&payload).await }
        })
        .await
    }

    async fn send_error(&self, message: &str) -> Result<()> {
        let payload = DiscordWebhookPayload {
            content: Some(format!(
                "⚠️ **RSS Bot run failed**\n```\n{}\n```",
                clip(message, ERROR_MAX)
            )),
            username: USERNAME,
            embeds: Vec::new(),
        };
        self.post(&payload).await
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DiscordEmbedField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct DiscordEmbedFooter {
    text: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct DiscordEmbed {
    title: String,
    description: String,
    color: u32,
    fields: Vec<DiscordEmbedField>,
    timestamp: String,
    footer: DiscordEmbedFooter,
}

#[derive(Debug, Serialize)]
pub(crate) struct DiscordWebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    username: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    /// One message for one sub-batch: header line plus one embed per category.
    fn digest(chunk: &[Article], idx: usize, total_batches: usize, total_articles: usize) -> Self {
        let header = if total_batches > 1 {
            format!(
                "🌅 **News digest** - {total_articles} new articles ({}/{total_batches})",
                idx + 1
            )
        } else {
            format!("🌅 **News digest** - {total_articles} new articles")
        };
        let now = Utc::now().to_rfc3339();

        let embeds = group_by_category(chunk)
            .into_iter()
            .take(MAX_EMBEDS)
            .map(|(category, items)| {
                let mut fields: Vec<DiscordEmbedField> = items
                    .iter()
                    .take(FIELDS_PER_EMBED)
                    .map(|a| article_field(a))
                    .collect();
                if items.len() > FIELDS_PER_EMBED {
                    fields.push(DiscordEmbedField {
                        name: "📚 More articles".to_string(),
                        value: format!("{} more not shown", items.len() - FIELDS_PER_EMBED),
                        inline: false,
                    });
                }
                DiscordEmbed {
                    title: format!("📰 {category}"),
                    description: format!("{} new articles", items.len()),
                    color: category_color(category),
                    fields,
                    timestamp: now.clone(),
                    footer: DiscordEmbedFooter {
                        text: "RSS AI digest",
                    },
                }
            })
            .collect();

        Self {
            content: Some(header),
            username: USERNAME,
            embeds,
        }
    }
}

fn article_field(a: &Article) -> DiscordEmbedField {
    let title = if a.title.trim().is_empty() {
        "(untitled)"
    } else {
        a.title.as_str()
    };
    let summary = a
        .summary
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("(no summary)");

    let mut value = clip(summary, SUMMARY_MAX);
    if a.link.trim().is_empty() {
        value.push_str(&format!("\nSource: {}", a.source_name));
    } else {
        value.push_str(&format!("\n[Read more]({}) • Source: {}", a.link, a.source_name));
    }
    DiscordEmbedField {
        name: format!("🔗 {}", clip(title, TITLE_MAX)),
        value,
        inline: false,
    }
}

/// Embed colour for well-known categories, grey otherwise.
pub fn category_color(category: &str) -> u32 {
    match category.trim().to_lowercase().as_str() {
        "tech" | "technology" | "科技" => 0x3498db,
        "news" | "新聞" => 0xe74c3c,
        "finance" | "business" | "財經" => 0x2ecc71,
        "entertainment" | "娛樂" => 0x9b59b6,
        "sports" | "運動" => 0xf39c12,
        "lifestyle" | "life" | "生活" => 0x1abc9c,
        _ => 0x95a5a6,
    }
}
