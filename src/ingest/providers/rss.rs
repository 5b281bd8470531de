// src/ingest/providers/rss.rs
use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use quick_xml::de::from_str;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::ingest::extract::{extract_content, extract_published, RawEntry};
use crate::ingest::normalize_text;
use crate::ingest::types::{Article, FeedDescriptor, FeedSource};

const USER_AGENT: &str = "rss-ai-digest/0.1";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

// --- RSS 2.0 ---

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "encoded", alias = "content:encoded")]
    encoded: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "date", alias = "dc:date")]
    dc_date: Option<String>,
}

impl From<Item> for RawEntry {
    fn from(it: Item) -> Self {
        RawEntry {
            title: it.title,
            link: it.link,
            content: it.encoded,
            summary: None,
            description: it.description,
            published: it.pub_date,
            updated: it.dc_date,
        }
    }
}

// --- Atom ---

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    link: Vec<AtomLink>,
    content: Option<AtomText>,
    summary: Option<AtomText>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

impl From<AtomEntry> for RawEntry {
    fn from(e: AtomEntry) -> Self {
        // rel="alternate" (or no rel) is the article page
        let link = e
            .link
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| e.link.first())
            .map(|l| l.href.clone());
        RawEntry {
            title: e.title.map(|t| t.value),
            link,
            content: e.content.map(|t| t.value),
            summary: e.summary.map(|t| t.value),
            description: None,
            published: e.published,
            updated: e.updated,
        }
    }
}

/// Local name of the document's root element.
fn root_element(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event().context("reading xml")? {
            Event::Start(e) | Event::Empty(e) => {
                return Ok(String::from_utf8_lossy(e.local_name().as_ref()).into_owned())
            }
            Event::Eof => return Err(anyhow!("empty document")),
            _ => {}
        }
    }
}

fn is_xhtml(e: &BytesStart) -> bool {
    e.attributes()
        .flatten()
        .any(|a| a.key.local_name().as_ref() == b"type" && a.value.as_ref() == b"xhtml")
}

/// Atom `type="xhtml"` text constructs carry child elements instead of text.
/// Rewrite each one as a plain text element holding the inner text.
fn flatten_xhtml(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    // (element name, nesting depth inside it, collected text)
    let mut inside: Option<(String, usize, String)> = None;
    loop {
        let event = reader.read_event().context("reading xml")?;
        if let Some((name, depth, text)) = inside.as_mut() {
            match event {
                Event::Start(_) => *depth += 1,
                Event::End(_) if *depth > 0 => *depth -= 1,
                Event::End(_) => {
                    writer.write_event(Event::Text(BytesText::new(text.trim())))?;
                    writer.write_event(Event::End(BytesEnd::new(name.clone())))?;
                    inside = None;
                }
                Event::Text(t) => {
                    text.push_str(&t.unescape().context("decoding xhtml text")?);
                    text.push(' ');
                }
                Event::CData(c) => {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                    text.push(' ');
                }
                Event::Eof => return Err(anyhow!("unterminated xhtml element")),
                _ => {}
            }
            continue;
        }
        match event {
            Event::Start(e) if is_xhtml(&e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(e))?;
                inside = Some((name, 0, String::new()));
            }
            Event::Eof => break,
            other => writer.write_event(other)?,
        }
    }
    String::from_utf8(writer.into_inner()).context("re-encoding xml")
}

/// Parse an RSS 2.0 or Atom document into raw entries.
pub fn parse_entries(xml: &str) -> Result<Vec<RawEntry>> {
    let mut xml = scrub_html_entities_for_xml(xml);
    if xml.contains("xhtml") {
        xml = flatten_xhtml(&xml)?;
    }
    match root_element(&xml)?.as_str() {
        "rss" => {
            let rss: Rss = from_str(&xml).context("parsing rss xml")?;
            Ok(rss.channel.item.into_iter().map(RawEntry::from).collect())
        }
        "feed" => {
            let atom: AtomFeed = from_str(&xml).context("parsing atom xml")?;
            Ok(atom.entry.into_iter().map(RawEntry::from).collect())
        }
        other => Err(anyhow!("unsupported feed root element <{other}>")),
    }
}

/// Parse a feed document into at most `limit` articles for `feed`. Entries without a link are skipped.
pub fn parse_feed(xml: &str, feed: &FeedDescriptor, limit: usize) -> Result<Vec<Article>> {
    let now = OffsetDateTime::now_utc();
    let entries = parse_entries(xml).with_context(|| format!("parsing feed {}", feed.name))?;

    let mut out = Vec::with_capacity(entries.len().min(limit));
    for entry in entries.into_iter().take(limit) {
        let Some(link) = entry.link.as_deref().map(str::trim).filter(|l| !l.is_empty()) else {
            tracing::debug!(feed = %feed.name, "entry without link skipped");
            continue;
        };
        let title = entry
            .title
            .as_deref()
            .map(normalize_text)
            .unwrap_or_default();
        out.push(Article::new(
            feed,
            title,
            link,
            extract_content(&entry),
            extract_published(&entry, now),
        ));
    }
    counter!("digest_articles_fetched_total").increment(out.len() as u64);
    Ok(out)
}

pub struct RssFeedSource {
    mode: Mode,
    limit: usize,
}

enum Mode {
    Http(reqwest::Client),
    /// Feed url -> document; used by tests and offline runs.
    Fixture(HashMap<String, String>),
}

impl RssFeedSource {
    pub fn http(limit: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("building feed http client")?;
        Ok(Self {
            mode: Mode::Http(client),
            limit,
        })
    }

    pub fn from_fixtures<I, K, V>(docs: I, limit: usize) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = docs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            mode: Mode::Fixture(map),
            limit,
        }
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    async fn fetch(&self, feed: &FeedDescriptor) -> Result<Vec<Article>> {
        let body = match &self.mode {
            Mode::Fixture(docs) => docs
                .get(&feed.url)
                .cloned()
                .ok_or_else(|| anyhow!("no fixture for {}", feed.url))?,
            Mode::Http(client) => client
                .get(&feed.url)
                .send()
                .await
                .context("feed http get()")?
                .error_for_status()
                .context("feed non-2xx")?
                .text()
                .await
                .context("feed http .text()")?,
        };
        parse_feed(&body, feed, self.limit)
    }

    fn name(&self) -> &'static str {
        "rss"
    }
}

// HTML entities that are not valid XML but show up in real feeds.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", "&#160;")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
