// src/app.rs
//! Turns an [`AppConfig`] into live components.

use std::sync::Arc;

use anyhow::Result;

use crate::config::{AppConfig, NotifierConfig, ProviderConfig, ProviderKind, StoreConfig};
use crate::ingest::providers::rss::RssFeedSource;
use crate::notify::{DiscordNotifier, Notifier, SlackNotifier};
use crate::pipeline::Pipeline;
use crate::store::{BlobStore, DedupStore, FileBlob, GistBlob};
use crate::summarize::providers::{ChatCompletionsProvider, GeminiProvider};
use crate::summarize::{FallbackChain, Summarizer};

pub fn build_notifier(cfg: &NotifierConfig) -> Arc<dyn Notifier> {
    match cfg {
        NotifierConfig::Discord { webhook } => Arc::new(DiscordNotifier::new(webhook.clone())),
        NotifierConfig::Slack { webhook } => Arc::new(SlackNotifier::new(webhook.clone())),
    }
}

pub fn build_store(cfg: &StoreConfig) -> Result<DedupStore> {
    let blob: Box<dyn BlobStore> = match cfg {
        StoreConfig::Gist { id, token, filename } => {
            Box::new(GistBlob::new(id.clone(), token.clone())?.with_filename(filename.clone()))
        }
        StoreConfig::File { path } => Box::new(FileBlob::new(path.clone())),
    };
    Ok(DedupStore::new(blob))
}

fn build_provider(p: &ProviderConfig, language: &str) -> Result<Box<dyn Summarizer>> {
    let model = p.model.as_deref();
    let key = p.api_key.clone();
    Ok(match p.kind {
        ProviderKind::DeepSeek => {
            Box::new(ChatCompletionsProvider::deepseek(key, model)?.with_language(language))
        }
        ProviderKind::OpenAi => {
            Box::new(ChatCompletionsProvider::openai(key, model)?.with_language(language))
        }
        ProviderKind::Gemini => Box::new(GeminiProvider::new(key, model)?.with_language(language)),
    })
}

/// Providers in configured order. Keyless ones are kept; the chain skips them.
pub fn build_chain(providers: &[ProviderConfig], language: &str) -> Result<FallbackChain> {
    let built = providers
        .iter()
        .map(|p| build_provider(p, language))
        .collect::<Result<Vec<_>>>()?;
    let chain = FallbackChain::new(built);
    tracing::info!(providers = ?chain.active_providers(), language, "summarization chain ready");
    Ok(chain)
}

/// Full pipeline over HTTP collaborators. `notifier` is shared so the caller can
/// still raise an alert if the run aborts.
pub fn build_pipeline(cfg: &AppConfig, notifier: Arc<dyn Notifier>) -> Result<Pipeline> {
    let source = RssFeedSource::http(cfg.items_per_feed)?;
    let chain = build_chain(&cfg.providers, &cfg.language)?;
    let store = build_store(&cfg.store)?;
    Ok(Pipeline::new(
        cfg.feeds.clone(),
        Box::new(source),
        chain,
        Box::new(notifier),
        store,
    )
    .with_max_per_run(cfg.max_per_run)
    .with_items_per_feed(cfg.items_per_feed))
}
