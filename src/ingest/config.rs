// src/ingest/config.rs
//! Feed list + forecast location. Supports TOML (`[[feeds]]` tables) or a
//! JSON array of `{name, url}` objects.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::ingest::providers::rss::{RssProvider, DEFAULT_PER_FEED_CAP};
use crate::ingest::types::SourceProvider;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSpec {
    pub name: String,
    pub url: String,
}

impl FeedSpec {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// The default paddock reading list.
pub fn default_feeds() -> Vec<FeedSpec> {
    vec![
        FeedSpec::new("PlanetF1", "https://www.planetf1.com/feed"),
        FeedSpec::new("BBC Sport F1", "https://feeds.bbci.co.uk/sport/formula1/rss.xml"),
        FeedSpec::new("Sky Sports F1", "https://www.skysports.com/rss/12040"),
        FeedSpec::new("GPblog", "https://www.gpblog.com/en/rss/index.xml"),
        FeedSpec::new("Motorsport Week", "https://www.motorsportweek.com/feed/"),
        FeedSpec::new("RACER F1", "https://racer.com/f1/feed/"),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSpec {
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u8,
}

fn default_timezone() -> String {
    "Europe/London".to_string()
}

fn default_forecast_days() -> u8 {
    3
}

impl Default for WeatherSpec {
    /// Silverstone; swap lat/lon for the next venue.
    fn default() -> Self {
        Self {
            location: "Silverstone".to_string(),
            latitude: 52.07,
            longitude: -1.02,
            timezone: default_timezone(),
            forecast_days: default_forecast_days(),
        }
    }
}

/// Load a feed list from an explicit path. Supports TOML or JSON formats.
pub fn load_feeds_from(path: &Path) -> Result<Vec<FeedSpec>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading feed list from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_feeds(&content, ext.as_str())
}

fn parse_feeds(s: &str, hint_ext: &str) -> Result<Vec<FeedSpec>> {
    let try_toml = hint_ext == "toml" || s.contains("[[feeds]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported feed list format"))
}

fn parse_toml(s: &str) -> Result<Vec<FeedSpec>> {
    #[derive(Deserialize)]
    struct TomlFeeds {
        feeds: Vec<FeedSpec>,
    }
    let v: TomlFeeds = toml::from_str(s)?;
    Ok(clean_list(v.feeds))
}

fn parse_json(s: &str) -> Result<Vec<FeedSpec>> {
    let v: Vec<FeedSpec> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

/// Trim, drop blank urls, drop repeated urls (first one wins, order kept).
pub fn clean_list(items: Vec<FeedSpec>) -> Vec<FeedSpec> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let url = it.url.trim().to_string();
        if url.is_empty() || !seen.insert(url.clone()) {
            continue;
        }
        let name = match it.name.trim() {
            "" => url.clone(),
            n => n.to_string(),
        };
        out.push(FeedSpec { name, url });
    }
    out
}

/// Build HTTP providers for a feed list.
pub fn build_providers(
    feeds: &[FeedSpec],
    per_feed_cap: usize,
    timeout: Duration,
) -> Result<Vec<Box<dyn SourceProvider>>> {
    let cap = if per_feed_cap == 0 {
        DEFAULT_PER_FEED_CAP
    } else {
        per_feed_cap
    };
    feeds
        .iter()
        .map(|f| {
            RssProvider::from_url(f.name.clone(), f.url.clone(), timeout)
                .map(|p| Box::new(p.with_cap(cap)) as Box<dyn SourceProvider>)
        })
        .collect()
}
