// src/ingest/extract.rs
//! Field extraction from heterogeneous feed entries.
//!
//! RSS and Atom expose the article body under different elements, and feeds
//! fill them inconsistently. Each concern has an ordered list of small extractor
//! functions; the first non-empty result wins.

use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::{OffsetDateTime, UtcOffset};

/// Format-agnostic view of one feed entry, filled by the RSS/Atom parsers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
}

pub type Extractor = fn(&RawEntry) -> Option<&str>;

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn full_content(e: &RawEntry) -> Option<&str> {
    non_empty(&e.content)
}
fn summary(e: &RawEntry) -> Option<&str> {
    non_empty(&e.summary)
}
fn description(e: &RawEntry) -> Option<&str> {
    non_empty(&e.description)
}
fn published(e: &RawEntry) -> Option<&str> {
    non_empty(&e.published)
}
fn updated(e: &RawEntry) -> Option<&str> {
    non_empty(&e.updated)
}

/// Full body first, then the teaser fields.
pub const CONTENT_EXTRACTORS: &[Extractor] = &[full_content, summary, description];

pub const PUBLISHED_EXTRACTORS: &[Extractor] = &[published, updated];

/// Run extractors in order and return the first hit.
pub fn first_match<'a>(entry: &'a RawEntry, extractors: &[Extractor]) -> Option<&'a str> {
    extractors.iter().find_map(|f| f(entry))
}

pub fn extract_content(entry: &RawEntry) -> String {
    first_match(entry, CONTENT_EXTRACTORS)
        .map(super::normalize_text)
        .unwrap_or_default()
}

/// Publication time as RFC 3339; unparseable values are kept verbatim, missing ones become `now`.
pub fn extract_published(entry: &RawEntry, now: OffsetDateTime) -> String {
    match first_match(entry, PUBLISHED_EXTRACTORS) {
        Some(raw) => normalize_timestamp(raw),
        None => format_rfc3339(now),
    }
}

pub fn normalize_timestamp(raw: &str) -> String {
    let raw = raw.trim();
    OffsetDateTime::parse(raw, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(raw, &Rfc3339))
        .map(format_rfc3339)
        .unwrap_or_else(|_| raw.to_string())
}

fn format_rfc3339(dt: OffsetDateTime) -> String {
    let utc = dt.to_offset(UtcOffset::UTC);
    utc.format(&Rfc3339)
        .unwrap_or_else(|_| utc.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> RawEntry {
        RawEntry {
            title: Some("T".into()),
            link: Some("https://x.test/1".into()),
            ..Default::default()
        }
    }

    #[test]
    fn content_prefers_full_body_then_summary_then_description() {
        let mut e = entry();
        e.description = Some("<p>desc</p>".into());
        assert_eq!(extract_content(&e), "desc");

        e.summary = Some("sum".into());
        assert_eq!(extract_content(&e), "sum");

        e.content = Some("   ".into()); // blank does not count
        assert_eq!(extract_content(&e), "sum");

        e.content = Some("<div>full <i>body</i></div>".into());
        assert_eq!(extract_content(&e), "full body");
    }

    #[test]
    fn missing_content_is_empty() {
        assert_eq!(extract_content(&entry()), "");
    }

    #[test]
    fn published_is_normalized_to_rfc3339() {
        let mut e = entry();
        e.published = Some("Tue, 10 Jun 2025 04:00:00 +0000".into());
        assert_eq!(
            extract_published(&e, OffsetDateTime::UNIX_EPOCH),
            "2025-06-10T04:00:00Z"
        );

        e.published = None;
        e.updated = Some("2025-06-10T06:00:00+02:00".into());
        assert_eq!(
            extract_published(&e, OffsetDateTime::UNIX_EPOCH),
            "2025-06-10T04:00:00Z"
        );
    }

    #[test]
    fn odd_dates_kept_and_missing_defaults_to_now() {
        let mut e = entry();
        e.published = Some("yesterday-ish".into());
        assert_eq!(extract_published(&e, OffsetDateTime::UNIX_EPOCH), "yesterday-ish");

        e.published = None;
        assert_eq!(
            extract_published(&e, OffsetDateTime::UNIX_EPOCH),
            "1970-01-01T00:00:00Z"
        );
    }
}
