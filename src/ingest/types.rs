// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::identity::article_id;

pub const DEFAULT_CATEGORY: &str = "Uncategorized";

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// One configured feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedDescriptor {
    pub url: String,
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
}

impl FeedDescriptor {
    pub fn new(url: impl Into<String>, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            category: category.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    pub id: String,          // md5 of `link`
    pub title: String,
    pub link: String,
    pub raw_content: String, // tags stripped, whitespace collapsed
    pub published: String,   // RFC 3339 when parseable, else as found in the feed
    pub source_name: String,
    pub category: String,
    pub summary: Option<String>,
}

impl Article {
    /// Builds an article for `feed`; the id is always derived from `link`.
    pub fn new(
        feed: &FeedDescriptor,
        title: impl Into<String>,
        link: impl Into<String>,
        raw_content: impl Into<String>,
        published: impl Into<String>,
    ) -> Self {
        let link = link.into();
        Self {
            id: article_id(&link),
            title: title.into(),
            link,
            raw_content: raw_content.into(),
            published: published.into(),
            source_name: feed.name.clone(),
            category: feed.category.clone(),
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: String) -> Self {
        self.summary = Some(summary);
        self
    }
}

/// Turns one feed descriptor into articles.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, feed: &FeedDescriptor) -> Result<Vec<Article>>;
    fn name(&self) -> &'static str;
}
