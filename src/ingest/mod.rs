// src/ingest/mod.rs
pub mod extract;
pub mod providers;
pub mod types;

use crate::ingest::types::{Article, FeedDescriptor, FeedSource};
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;

pub const DEFAULT_ITEMS_PER_FEED: usize = 10;

/// Normalize markup-bearing feed text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // Tags first so encoded `&lt;b&gt;` survives as literal text.
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]+>").expect("tag regex"));
    let out = re_tags.replace_all(s, " ");

    let out = html_escape::decode_html_entities(&out).replace('\u{00A0}', " ");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("ws regex"));
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// First `max` chars of `s` (char boundary safe) and whether anything was cut.
pub fn truncate_chars(s: &str, max: usize) -> (&str, bool) {
    match s.char_indices().nth(max) {
        Some((idx, _)) => (&s[..idx], true),
        None => (s, false),
    }
}

/// Fetch every feed in configured order. A failing feed is logged and contributes nothing.
pub async fn collect_articles(
    source: &dyn FeedSource,
    feeds: &[FeedDescriptor],
    items_per_feed: usize,
) -> Vec<Article> {
    let mut all = Vec::new();
    for feed in feeds {
        match source.fetch(feed).await {
            Ok(mut articles) => {
                articles.truncate(items_per_feed);
                tracing::info!(feed = %feed.name, count = articles.len(), "feed fetched");
                all.append(&mut articles);
            }
            Err(e) => {
                tracing::warn!(error = ?e, feed = %feed.name, url = %feed.url, provider = source.name(), "feed error");
                counter!("digest_feed_errors_total").increment(1);
            }
        }
    }
    tracing::info!(total = all.len(), feeds = feeds.len(), "fetch finished");
    all
}
