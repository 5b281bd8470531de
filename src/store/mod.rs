// src/store/mod.rs
//! Dedup store: the bounded, durable list of article ids already processed.

pub mod file;
pub mod gist;

use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::{Context, Result};
use metrics::counter;

pub use file::FileBlob;
pub use gist::GistBlob;

/// Newest ids kept across runs.
pub const DEDUP_CAP: usize = 1000;

/// A single JSON blob in durable storage.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// `Ok(None)` when the blob does not exist yet.
    async fn get(&self) -> Result<Option<String>>;
    async fn put(&self, blob: String) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Insertion-ordered id set. Order only matters for trimming.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupSet {
    order: Vec<String>,
    members: HashSet<String>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    /// Appends `id` unless already present. Returns whether it was added.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.members.contains(&id) {
            return false;
        }
        self.members.insert(id.clone());
        self.order.push(id);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Ids oldest first.
    pub fn as_slice(&self) -> &[String] {
        &self.order
    }

    /// Copy holding only the newest `cap` ids.
    pub fn trimmed(&self, cap: usize) -> Self {
        trim_newest(&self.order, cap).iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for DedupSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = DedupSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// Last `cap` entries of `ids`.
pub fn trim_newest(ids: &[String], cap: usize) -> &[String] {
    let start = ids.len().saturating_sub(cap);
    &ids[start..]
}

pub struct DedupStore {
    blob: Box<dyn BlobStore>,
    cap: usize,
}

impl DedupStore {
    pub fn new(blob: Box<dyn BlobStore>) -> Self {
        Self {
            blob,
            cap: DEDUP_CAP,
        }
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Never fails: any retrieval or decode problem yields an empty set (cold start).
    pub async fn load(&self) -> DedupSet {
        match self.try_load().await {
            Ok(set) => {
                tracing::info!(count = set.len(), store = self.blob.name(), "dedup set loaded");
                set
            }
            Err(e) => {
                tracing::warn!(error = ?e, store = self.blob.name(), "dedup load failed, starting empty");
                counter!("digest_store_errors_total", "op" => "load").increment(1);
                DedupSet::new()
            }
        }
    }

    async fn try_load(&self) -> Result<DedupSet> {
        let Some(raw) = self.blob.get().await? else {
            return Ok(DedupSet::new());
        };
        let ids: Vec<String> = serde_json::from_str(&raw).context("decoding dedup blob")?;
        Ok(ids.into_iter().collect())
    }

    /// Writes the newest `cap` ids. Returns `false` (and logs) on failure.
    pub async fn save(&self, ids: &[String]) -> bool {
        let kept = trim_newest(ids, self.cap);
        if kept.len() < ids.len() {
            tracing::info!(dropped = ids.len() - kept.len(), cap = self.cap, "trimming oldest dedup ids");
        }
        let result = match serde_json::to_string_pretty(kept) {
            Ok(json) => self.blob.put(json).await,
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(()) => {
                tracing::info!(count = kept.len(), store = self.blob.name(), "dedup set saved");
                true
            }
            Err(e) => {
                tracing::error!(error = ?e, store = self.blob.name(), "dedup save failed");
                counter!("digest_store_errors_total", "op" => "save").increment(1);
                false
            }
        }
    }
}

/// In-process blob for tests and dry runs.
#[derive(Default)]
pub struct MemoryBlob {
    pub content: Mutex<Option<String>>,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl MemoryBlob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: Mutex::new(Some(content.into())),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_reads: true,
            fail_writes: true,
            ..Default::default()
        }
    }

    /// Current blob decoded as an id list (empty when unset or malformed).
    pub fn ids(&self) -> Vec<String> {
        self.snapshot()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Option<String> {
        self.content.lock().expect("memory blob poisoned").clone()
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryBlob {
    async fn get(&self) -> Result<Option<String>> {
        if self.fail_reads {
            anyhow::bail!("memory blob read failure");
        }
        Ok(self.snapshot())
    }

    async fn put(&self, blob: String) -> Result<()> {
        if self.fail_writes {
            anyhow::bail!("memory blob write failure");
        }
        *self.content.lock().expect("memory blob poisoned") = Some(blob);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// Shared handle so tests can inspect the blob after the store consumed it.
#[async_trait::async_trait]
impl<T: BlobStore> BlobStore for std::sync::Arc<T> {
    async fn get(&self) -> Result<Option<String>> {
        (**self).get().await
    }
    async fn put(&self, blob: String) -> Result<()> {
        (**self).put(blob).await
    }
    fn name(&self) -> &'static str {
        (**self).name()
    }
}
