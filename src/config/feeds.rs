// src/config/feeds.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::FeedDescriptor;

pub const ENV_FEEDS_PATH: &str = "FEEDS_CONFIG_PATH";

#[derive(Deserialize)]
struct FeedsFile {
    #[serde(default)]
    feeds: Vec<FeedDescriptor>,
}

/// Load feeds from an explicit path. TOML or JSON, picked by extension with a fallback.
pub fn load_feeds_from(path: &Path) -> Result<Vec<FeedDescriptor>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading feeds from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let feeds = parse_feeds(&content, ext.as_str())
        .with_context(|| format!("parsing {}", path.display()))?;
    if feeds.is_empty() {
        bail!("no feeds configured in {}", path.display());
    }
    Ok(feeds)
}

/// Resolution order:
/// 1) $FEEDS_CONFIG_PATH
/// 2) config/feeds.toml
/// 3) config/feeds.json
pub fn load_feeds_default() -> Result<Vec<FeedDescriptor>> {
    if let Ok(p) = std::env::var(ENV_FEEDS_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_feeds_from(&pb);
        }
        bail!("{ENV_FEEDS_PATH} points to non-existent path {}", pb.display());
    }
    for candidate in ["config/feeds.toml", "config/feeds.json"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_feeds_from(&p);
        }
    }
    Err(anyhow!("no feeds file found (set {ENV_FEEDS_PATH} or add config/feeds.json)"))
}

fn parse_feeds(s: &str, hint_ext: &str) -> Result<Vec<FeedDescriptor>> {
    let parsed = match hint_ext {
        "toml" => toml::from_str::<FeedsFile>(s).map_err(anyhow::Error::from),
        "json" => serde_json::from_str::<FeedsFile>(s).map_err(anyhow::Error::from),
        _ => serde_json::from_str::<FeedsFile>(s)
            .map_err(anyhow::Error::from)
            .or_else(|_| toml::from_str::<FeedsFile>(s).map_err(anyhow::Error::from)),
    }?;
    Ok(clean_list(parsed.feeds))
}

/// Trim fields, drop entries without url or name, blank category -> default.
fn clean_list(feeds: Vec<FeedDescriptor>) -> Vec<FeedDescriptor> {
    feeds
        .into_iter()
        .filter_map(|f| {
            let url = f.url.trim();
            let name = f.name.trim();
            if url.is_empty() || name.is_empty() {
                tracing::warn!(url, name, "ignoring incomplete feed entry");
                return None;
            }
            let category = match f.category.trim() {
                "" => crate::ingest::types::DEFAULT_CATEGORY,
                c => c,
            };
            Some(FeedDescriptor::new(url, name, category))
        })
        .collect()
}
