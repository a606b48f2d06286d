// src/ingest/providers/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use std::time::Duration;

use crate::ingest::normalize_text;
use crate::ingest::types::{SourceItem, SourceProvider};

/// Entries taken from a single feed when no cap is configured.
pub const DEFAULT_PER_FEED_CAP: usize = 8;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    title: Option<String>,
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    title: Option<AtomText>,
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    link: Vec<AtomLink>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
}

/// Text construct; `type="html"` bodies arrive unescaped here.
#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

impl AtomEntry {
    /// `rel="alternate"` (or no rel) first, else whatever link there is.
    fn best_link(&self) -> Option<&str> {
        self.link
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| self.link.first())
            .and_then(|l| l.href.as_deref())
    }
}

/// Feed title plus (title, link, summary) per entry, in document order.
type Parsed = (Option<String>, Vec<(Option<String>, Option<String>, Option<String>)>);

fn atom_text(t: Option<AtomText>) -> Option<String> {
    t.and_then(|t| t.text)
}

/// Local name of the document element, skipping the prolog.
fn root_element(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).to_string())
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

/// RSS 2.0 or Atom feed provider, picked by the document element. Fixture
/// mode parses a stored document; HTTP mode downloads the feed on every
/// `fetch_latest`.
pub struct RssProvider {
    name: String,
    per_feed_cap: usize,
    mode: Mode,
}

impl RssProvider {
    pub fn from_fixture(name: impl Into<String>, xml: &str) -> Self {
        Self {
            name: name.into(),
            per_feed_cap: DEFAULT_PER_FEED_CAP,
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_url(name: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("paddock-pub-chat/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("building feed http client")?;
        Ok(Self {
            name: name.into(),
            per_feed_cap: DEFAULT_PER_FEED_CAP,
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        })
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.per_feed_cap = cap;
        self
    }

    fn parse_items_from_str(&self, s: &str) -> Result<Vec<SourceItem>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let (feed_title, entries) = if root_element(&xml_clean).as_deref() == Some("feed") {
            self.parse_atom(&xml_clean)?
        } else {
            self.parse_rss(&xml_clean)?
        };

        // Feed title wins over the configured name, like a feed reader would show it.
        let source = feed_title
            .as_deref()
            .map(normalize_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.name.clone());

        let out: Vec<SourceItem> = entries
            .into_iter()
            .take(self.per_feed_cap)
            .map(|(title, link, summary)| SourceItem {
                title: normalize_text(title.as_deref().unwrap_or_default()),
                summary: normalize_text(summary.as_deref().unwrap_or_default()),
                link: link.map(|l| l.trim().to_string()).unwrap_or_default(),
                source: source.clone(),
            })
            .collect();

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_items_total").increment(out.len() as u64);
        Ok(out)
    }
}

impl RssProvider {
    fn parse_rss(&self, xml: &str) -> Result<Parsed> {
        let rss: Rss = from_str(xml).with_context(|| format!("parsing {} rss xml", self.name))?;
        let entries = rss
            .channel
            .item
            .into_iter()
            .map(|it| (it.title, it.link, it.description))
            .collect();
        Ok((rss.channel.title, entries))
    }

    fn parse_atom(&self, xml: &str) -> Result<Parsed> {
        let feed: AtomFeed = from_str(xml).with_context(|| format!("parsing {} atom xml", self.name))?;
        let entries = feed
            .entry
            .into_iter()
            .map(|e| {
                let link = e.best_link().map(str::to_string);
                let summary = atom_text(e.summary).or_else(|| atom_text(e.content));
                (atom_text(e.title), link, summary)
            })
            .collect();
        Ok((atom_text(feed.title), entries))
    }
}

#[async_trait]
impl SourceProvider for RssProvider {
    async fn fetch_latest(&self) -> Result<Vec<SourceItem>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s),
            Mode::Http { url, client } => {
                let body = client
                    .get(url.as_str())
                    .send()
                    .await
                    .with_context(|| format!("{} http get()", self.name))?
                    .error_for_status()
                    .with_context(|| format!("{} non-2xx", self.name))?
                    .text()
                    .await
                    .with_context(|| format!("{} http .text()", self.name))?;
                self.parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// XML only knows five named entities; feeds routinely ship HTML ones.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
