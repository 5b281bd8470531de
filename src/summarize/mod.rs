// src/summarize/mod.rs
//! Summarization fallback chain.
//!
//! Providers are tried in configured order. The first non-empty answer wins and
//! later providers are never called. When every provider fails (or none is
//! configured) the chain falls back to a mechanical prefix of the article text,
//! so a well-formed article always gets some summary.

pub mod prompt;
pub mod providers;

use std::time::Duration;

use anyhow::Result;
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::ingest::truncate_chars;

/// Input budget sent to providers, in chars.
pub const MAX_INPUT_CHARS: usize = 5000;
/// Length of the degraded (non-AI) summary, in chars.
pub const DEGRADED_CHARS: usize = 150;
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

/// One summarization backend.
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    /// Raw summary text. `content` is already normalized and may be empty.
    async fn summarize(&self, title: &str, content: &str) -> Result<String>;
    fn name(&self) -> &'static str;
    /// Unconfigured providers (no credential) are skipped without error.
    fn is_configured(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Success { provider: &'static str, text: String },
    Degraded(String),
    /// Every provider failed and there was no content to fall back on.
    Failure,
}

impl SummaryOutcome {
    /// Success and degraded text are both usable summaries.
    pub fn into_summary(self) -> Option<String> {
        match self {
            SummaryOutcome::Success { text, .. } | SummaryOutcome::Degraded(text) => Some(text),
            SummaryOutcome::Failure => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            SummaryOutcome::Success { text, .. } | SummaryOutcome::Degraded(text) => Some(text),
            SummaryOutcome::Failure => None,
        }
    }
}

/// Provider health for one run. Degraded summaries count as failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummaryStats {
    pub success: u32,
    pub fail: u32,
}

impl SummaryStats {
    pub fn record(&mut self, outcome: &SummaryOutcome) {
        match outcome {
            SummaryOutcome::Success { .. } => self.success += 1,
            SummaryOutcome::Degraded(_) | SummaryOutcome::Failure => self.fail += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.success + self.fail
    }

    /// Percentage of AI successes; `None` before any attempt.
    pub fn success_rate(&self) -> Option<f64> {
        (self.total() > 0).then(|| f64::from(self.success) * 100.0 / f64::from(self.total()))
    }
}

pub struct FallbackChain {
    providers: Vec<Box<dyn Summarizer>>,
    timeout: Duration,
    max_input_chars: usize,
}

impl FallbackChain {
    pub fn new(providers: Vec<Box<dyn Summarizer>>) -> Self {
        Self {
            providers,
            timeout: PROVIDER_TIMEOUT,
            max_input_chars: MAX_INPUT_CHARS,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Names of providers that will actually be tried, in order.
    pub fn active_providers(&self) -> Vec<&'static str> {
        self.providers
            .iter()
            .filter(|p| p.is_configured())
            .map(|p| p.name())
            .collect()
    }

    pub async fn summarize(&self, title: &str, content: &str) -> SummaryOutcome {
        let content = prepare_content(content, self.max_input_chars);

        for provider in &self.providers {
            if !provider.is_configured() {
                tracing::debug!(provider = provider.name(), "provider not configured, skipping");
                continue;
            }
            match tokio::time::timeout(self.timeout, provider.summarize(title, &content)).await {
                Ok(Ok(raw)) => {
                    let text = strip_boilerplate(&raw);
                    if !text.is_empty() {
                        counter!("digest_summaries_total", "outcome" => "success", "provider" => provider.name())
                            .increment(1);
                        return SummaryOutcome::Success {
                            provider: provider.name(),
                            text,
                        };
                    }
                    tracing::warn!(provider = provider.name(), "provider returned an empty summary");
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = ?e, provider = provider.name(), "provider failed, trying next");
                }
                Err(_) => {
                    tracing::warn!(provider = provider.name(), timeout_s = self.timeout.as_secs(), "provider timed out, trying next");
                }
            }
        }

        let fallback = degraded_summary(&content, DEGRADED_CHARS);
        if fallback.is_empty() {
            counter!("digest_summaries_total", "outcome" => "failure").increment(1);
            return SummaryOutcome::Failure;
        }
        counter!("digest_summaries_total", "outcome" => "degraded").increment(1);
        SummaryOutcome::Degraded(fallback)
    }
}

/// Collapse whitespace and cap at `max_chars`. Input is already normalized at
/// ingest, so literal `<`/`>` left over from decoded entities are kept.
pub fn prepare_content(raw: &str, max_chars: usize) -> String {
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&text, max_chars).0.to_string()
}

/// First `max_chars` of `content`, with "..." when something was cut.
pub fn degraded_summary(content: &str, max_chars: usize) -> String {
    let (head, cut) = truncate_chars(content, max_chars);
    let mut out = head.trim().to_string();
    if cut {
        out.push_str("...");
    }
    out
}

static RE_BOILERPLATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:\*\*)?(?:summary|tl;?dr|摘要|總結|总结)(?:\*\*)?\s*[:：]\s*(?:\*\*)?")
        .expect("boilerplate regex")
});

/// Remove a leading "Summary:"-style label and surrounding whitespace.
pub fn strip_boilerplate(raw: &str) -> String {
    RE_BOILERPLATE.replace(raw.trim(), "").trim().to_string()
}
