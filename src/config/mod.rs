// src/config/mod.rs
//! Runtime configuration: feed list from file, everything else from the environment.

pub mod feeds;

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::ingest::types::FeedDescriptor;
use crate::ingest::DEFAULT_ITEMS_PER_FEED;
use crate::pipeline::MAX_ARTICLES_PER_RUN;
use crate::store::gist::DEFAULT_GIST_FILENAME;
use crate::summarize::prompt::DEFAULT_LANGUAGE;

pub use feeds::{load_feeds_default, load_feeds_from};

pub const DEFAULT_PROVIDER_ORDER: &str = "deepseek,gemini,openai";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    DeepSeek,
    Gemini,
    OpenAi,
}

impl ProviderKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "deepseek" => Some(Self::DeepSeek),
            "gemini" => Some(Self::Gemini),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }

    fn key_var(self) -> &'static str {
        match self {
            Self::DeepSeek => "DEEPSEEK_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }

    fn model_var(self) -> &'static str {
        match self {
            Self::DeepSeek => "DEEPSEEK_MODEL",
            Self::Gemini => "GEMINI_MODEL",
            Self::OpenAi => "OPENAI_MODEL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Absent key means the provider is skipped by the chain.
    pub api_key: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierConfig {
    Discord { webhook: String },
    Slack { webhook: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Gist {
        id: String,
        token: String,
        filename: String,
    },
    File {
        path: PathBuf,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub feeds: Vec<FeedDescriptor>,
    pub notifier: NotifierConfig,
    pub store: StoreConfig,
    pub providers: Vec<ProviderConfig>,
    pub language: String,
    pub max_per_run: usize,
    pub items_per_feed: usize,
}

impl AppConfig {
    /// Feeds via [`load_feeds_default`], the rest from process env.
    pub fn from_env() -> Result<Self> {
        let feeds = load_feeds_default()?;
        Self::from_lookup(feeds, |k| std::env::var(k).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(feeds: Vec<FeedDescriptor>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if feeds.is_empty() {
            bail!("no feeds configured");
        }

        let notifier = if let Some(webhook) = var("DISCORD_WEBHOOK_URL") {
            NotifierConfig::Discord { webhook }
        } else if let Some(webhook) = var("SLACK_WEBHOOK_URL") {
            NotifierConfig::Slack { webhook }
        } else {
            bail!("missing DISCORD_WEBHOOK_URL or SLACK_WEBHOOK_URL");
        };

        let store = match (var("GIST_TOKEN"), var("GIST_ID"), var("DEDUP_STORE_PATH")) {
            (Some(token), Some(id), _) => StoreConfig::Gist {
                id,
                token,
                filename: var("GIST_FILENAME").unwrap_or_else(|| DEFAULT_GIST_FILENAME.to_string()),
            },
            (_, _, Some(path)) => StoreConfig::File { path: path.into() },
            (Some(_), None, None) => bail!("GIST_TOKEN set but GIST_ID missing"),
            (None, Some(_), None) => bail!("GIST_ID set but GIST_TOKEN missing"),
            (None, None, None) => bail!("missing GIST_TOKEN/GIST_ID or DEDUP_STORE_PATH"),
        };

        let order = var("SUMMARY_PROVIDERS").unwrap_or_else(|| DEFAULT_PROVIDER_ORDER.to_string());
        let mut providers: Vec<ProviderConfig> = Vec::new();
        for name in order.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let Some(kind) = ProviderKind::parse(name) else {
                bail!("unknown provider in SUMMARY_PROVIDERS: {name}");
            };
            if providers.iter().any(|p| p.kind == kind) {
                continue;
            }
            providers.push(ProviderConfig {
                kind,
                api_key: var(kind.key_var()),
                model: var(kind.model_var()),
            });
        }
        if !providers.iter().any(|p| p.api_key.is_some()) {
            tracing::warn!("no summarization provider has an API key; summaries will be degraded");
        }

        Ok(Self {
            feeds,
            notifier,
            store,
            providers,
            language: var("SUMMARY_LANGUAGE").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            max_per_run: positive_or(var("MAX_ARTICLES_PER_RUN"), "MAX_ARTICLES_PER_RUN", MAX_ARTICLES_PER_RUN),
            items_per_feed: positive_or(var("ITEMS_PER_FEED"), "ITEMS_PER_FEED", DEFAULT_ITEMS_PER_FEED),
        })
    }
}

fn positive_or(raw: Option<String>, key: &str, default: usize) -> usize {
    match raw.map(|s| s.parse::<usize>()) {
        None => default,
        Some(Ok(n)) if n > 0 => n,
        Some(_) => {
            tracing::warn!(key, default, "invalid value, using default");
            default
        }
    }
}
