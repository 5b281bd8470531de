// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod app;
pub mod config;
pub mod identity;
pub mod ingest;
pub mod notify;
pub mod pipeline;
pub mod store;
pub mod summarize;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::identity::article_id;
pub use crate::ingest::types::{Article, FeedDescriptor, FeedSource};
pub use crate::notify::Notifier;
pub use crate::pipeline::{Pipeline, RunReport};
pub use crate::store::{BlobStore, DedupSet, DedupStore};
pub use crate::summarize::{FallbackChain, Summarizer, SummaryOutcome, SummaryStats};
