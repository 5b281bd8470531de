// src/summarize/providers.rs
//! Concrete summarization backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::prompt::{system_prompt, user_prompt, DEFAULT_LANGUAGE};
use super::{Summarizer, PROVIDER_TIMEOUT};

pub const DEEPSEEK_BASE: &str = "https://api.deepseek.com";
pub const OPENAI_BASE: &str = "https://api.openai.com/v1";
pub const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 300;

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("rss-ai-digest/0.1")
        .connect_timeout(Duration::from_secs(4))
        .timeout(PROVIDER_TIMEOUT)
        .build()
        .context("building provider http client")
}

fn present(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

// ------------------------------------------------------------
// OpenAI-compatible chat completions (DeepSeek, OpenAI)
// ------------------------------------------------------------

pub struct ChatCompletionsProvider {
    name: &'static str,
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    language: String,
}

impl ChatCompletionsProvider {
    pub fn new(
        name: &'static str,
        base_url: &str,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            name,
            http: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: present(api_key),
            model: model.into(),
            language: DEFAULT_LANGUAGE.to_string(),
        })
    }

    pub fn deepseek(api_key: Option<String>, model: Option<&str>) -> Result<Self> {
        Self::new("deepseek", DEEPSEEK_BASE, api_key, model.unwrap_or("deepseek-chat"))
    }

    pub fn openai(api_key: Option<String>, model: Option<&str>) -> Result<Self> {
        Self::new("openai", OPENAI_BASE, api_key, model.unwrap_or("gpt-4o-mini"))
    }

    pub fn with_base_url(mut self, base: &str) -> Self {
        self.base_url = base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

#[derive(Serialize)]
struct ChatMsg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatReq<'a> {
    model: &'a str,
    messages: Vec<ChatMsg<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResp {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMsg,
}

#[derive(Deserialize)]
struct ChatChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl Summarizer for ChatCompletionsProvider {
    async fn summarize(&self, title: &str, content: &str) -> Result<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(anyhow!("{} api key missing", self.name));
        };
        let sys = system_prompt(&self.language);
        let user = user_prompt(title, content);
        let req = ChatReq {
            model: &self.model,
            messages: vec![
                ChatMsg {
                    role: "system",
                    content: &sys,
                },
                ChatMsg {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            stream: false,
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&req)
            .send()
            .await
            .with_context(|| format!("{} request", self.name))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("{} returned {status}", self.name));
        }
        let body: ChatResp = resp
            .json()
            .await
            .with_context(|| format!("{} response decode", self.name))?;
        body.choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("{} returned no summary", self.name))
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

// ------------------------------------------------------------
// Google Gemini (generateContent)
// ------------------------------------------------------------

pub struct GeminiProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    language: String,
}

impl GeminiProvider {
    pub fn new(api_key: Option<String>, model: Option<&str>) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            base_url: GEMINI_BASE.to_string(),
            api_key: present(api_key),
            model: model.unwrap_or("gemini-2.0-flash").to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base: &str) -> Self {
        self.base_url = base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiReq {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenCfg,
}

#[derive(Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenCfg {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GeminiResp {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
}

#[async_trait]
impl Summarizer for GeminiProvider {
    async fn summarize(&self, title: &str, content: &str) -> Result<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(anyhow!("gemini api key missing"));
        };
        let req = GeminiReq {
            system_instruction: GeminiContent {
                parts: vec![GeminiPart {
                    text: system_prompt(&self.language),
                }],
            },
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: user_prompt(title, content),
                }],
            }],
            generation_config: GeminiGenCfg {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_TOKENS,
            },
        };

        let resp = self
            .http
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", api_key)
            .json(&req)
            .send()
            .await
            .context("gemini request")?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("gemini returned {status}"));
        }
        let body: GeminiResp = resp.json().await.context("gemini response decode")?;
        body.candidates
            .into_iter()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<String>()
            })
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("gemini returned no summary"))
    }

    fn name(&self) -> &'static str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

// ------------------------------------------------------------
// Deterministic mock for tests/local runs
// ------------------------------------------------------------

/// Replies with a fixed text (or fails) and counts its calls.
#[derive(Clone)]
pub struct MockSummarizer {
    name: &'static str,
    reply: Option<String>,
    configured: bool,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockSummarizer {
    pub fn replying(name: &'static str, reply: impl Into<String>) -> Self {
        Self {
            name,
            reply: Some(reply.into()),
            configured: true,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(name: &'static str) -> Self {
        Self {
            reply: None,
            ..Self::replying(name, "")
        }
    }

    pub fn unconfigured(name: &'static str) -> Self {
        Self {
            configured: false,
            ..Self::replying(name, "never")
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared call counter; clone it before boxing the mock.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&self, _title: &str, _content: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        self.reply
            .clone()
            .ok_or_else(|| anyhow!("{} mock failure", self.name))
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}
