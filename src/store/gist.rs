// src/store/gist.rs
//! GitHub gist as the durable blob: one file inside one gist.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::BlobStore;

pub const GITHUB_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_GIST_FILENAME: &str = "read_articles.json";

#[derive(Clone)]
pub struct GistBlob {
    client: Client,
    api_base: String,
    gist_id: String,
    token: String,
    filename: String,
}

#[derive(Deserialize)]
struct GistResp {
    #[serde(default)]
    files: HashMap<String, Option<GistFile>>,
}

#[derive(Deserialize)]
struct GistFile {
    content: Option<String>,
}

#[derive(Serialize)]
struct GistPatch<'a> {
    files: HashMap<&'a str, GistPatchFile<'a>>,
}

#[derive(Serialize)]
struct GistPatchFile<'a> {
    content: &'a str,
}

impl GistBlob {
    pub fn new(gist_id: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent("rss-ai-digest/0.1")
            .timeout(Duration::from_secs(10))
            .build()
            .context("building gist http client")?;
        Ok(Self {
            client,
            api_base: GITHUB_API_BASE.to_string(),
            gist_id: gist_id.into(),
            token: token.into(),
            filename: DEFAULT_GIST_FILENAME.to_string(),
        })
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Point at a different API host (GitHub Enterprise, tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self) -> String {
        format!("{}/gists/{}", self.api_base, self.gist_id)
    }
}

#[async_trait::async_trait]
impl BlobStore for GistBlob {
    async fn get(&self) -> Result<Option<String>> {
        let resp = self
            .client
            .get(self.url())
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .context("gist get")?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("gist get returned {status}"));
        }
        let body: GistResp = resp.json().await.context("decoding gist response")?;
        Ok(body
            .files
            .get(&self.filename)
            .and_then(|f| f.as_ref())
            .and_then(|f| f.content.clone()))
    }

    async fn put(&self, blob: String) -> Result<()> {
        let patch = GistPatch {
            files: HashMap::from([(self.filename.as_str(), GistPatchFile { content: &blob })]),
        };
        self.client
            .patch(self.url())
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .json(&patch)
            .send()
            .await
            .context("gist patch")?
            .error_for_status()
            .context("gist patch non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "gist"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use httpmock::Method::PATCH;

    #[tokio::test]
    async fn reads_named_file_content() {
        let server = MockServer::start_async().await;
        let m = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/gists/abc")
                    .header("Authorization", "token t0k");
                then.status(200).json_body(serde_json::json!({
                    "files": {
                        "read_articles.json": { "content": "[\"x\",\"y\"]" },
                        "other.txt": { "content": "ignored" }
                    }
                }));
            })
            .await;

        let blob = GistBlob::new("abc", "t0k").unwrap().with_api_base(server.base_url());
        assert_eq!(blob.get().await.unwrap().as_deref(), Some("[\"x\",\"y\"]"));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn missing_file_is_none_and_http_error_is_err() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/gists/empty");
                then.status(200).json_body(serde_json::json!({ "files": {} }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/gists/gone");
                then.status(404);
            })
            .await;

        let empty = GistBlob::new("empty", "t").unwrap().with_api_base(server.base_url());
        assert!(empty.get().await.unwrap().is_none());

        let gone = GistBlob::new("gone", "t").unwrap().with_api_base(server.base_url());
        assert!(gone.get().await.is_err());
    }

    #[tokio::test]
    async fn put_patches_named_file() {
        let server = MockServer::start_async().await;
        let m = server
            .mock_async(|when, then| {
                when.method(PATCH)
                    .path("/gists/abc")
                    .json_body(serde_json::json!({
                        "files": { "seen.json": { "content": "[]" } }
                    }));
                then.status(200).json_body(serde_json::json!({}));
            })
            .await;

        let blob = GistBlob::new("abc", "t")
            .unwrap()
            .with_api_base(server.base_url())
            .with_filename("seen.json");
        blob.put("[]".to_string()).await.unwrap();
        m.assert_async().await;
    }
}
