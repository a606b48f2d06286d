// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod types;

use crate::ingest::types::{SourceItem, SourceProvider};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Total items parsed from feeds.");
        describe_counter!(
            "ingest_provider_errors_total",
            "Feed fetch/parse errors (source omitted from the run)."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!(
            "ingest_last_run_ts",
            "Unix ts when the ingest step last ran."
        );
    });
}

/// Summary text cap, in chars.
pub const MAX_TEXT_CHARS: usize = 1500;

/// Normalize feed text: decode entities, strip tags, collapse whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }

    out
}

/// What survived a fetch across all providers.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub items: Vec<SourceItem>,
    /// Providers that failed and were omitted.
    pub failed_sources: Vec<String>,
}

impl FetchReport {
    pub fn is_partial(&self) -> bool {
        !self.failed_sources.is_empty()
    }
}

/// Fetch from every provider in order. A failing provider is logged and
/// omitted; the rest of the run keeps whatever the others returned.
pub async fn fetch_all(providers: &[Box<dyn SourceProvider>]) -> FetchReport {
    ensure_metrics_described();

    let mut report = FetchReport::default();
    for p in providers {
        match p.fetch_latest().await {
            Ok(mut v) => {
                tracing::debug!(target: "ingest", provider = p.name(), items = v.len(), "provider ok");
                report.items.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, provider = p.name(), "provider error, source omitted");
                counter!("ingest_provider_errors_total").increment(1);
                report.failed_sources.push(p.name().to_string());
            }
        }
    }

    let now = chrono::Utc::now().timestamp().max(0) as u64;
    gauge!("ingest_last_run_ts").set(now as f64);

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    struct Fixed(&'static str, Vec<SourceItem>);
    struct Broken;

    #[async_trait]
    impl SourceProvider for Fixed {
        async fn fetch_latest(&self) -> Result<Vec<SourceItem>> {
            Ok(self.1.clone())
        }
        fn name(&self) -> &str {
            self.0
        }
    }

    #[async_trait]
    impl SourceProvider for Broken {
        async fn fetch_latest(&self) -> Result<Vec<SourceItem>> {
            Err(anyhow!("connection reset"))
        }
        fn name(&self) -> &str {
            "broken"
        }
    }

    #[test]
    fn normalize_text_decodes_and_collapses() {
        let s = "  <p>Hamilton&nbsp;&nbsp; \u{201C}happy\u{201D}</p>\n with   car!  ";
        assert_eq!(normalize_text(s), "Hamilton \"happy\" with car!");
    }

    #[test]
    fn normalize_text_caps_length() {
        let long = "a".repeat(MAX_TEXT_CHARS + 50);
        assert_eq!(normalize_text(&long).chars().count(), MAX_TEXT_CHARS);
    }

    #[tokio::test]
    async fn failing_provider_is_omitted_not_fatal() {
        let providers: Vec<Box<dyn SourceProvider>> = vec![
            Box::new(Fixed("a", vec![SourceItem::new("One", "a")])),
            Box::new(Broken),
            Box::new(Fixed("b", vec![SourceItem::new("Two", "b")])),
        ];
        let report = fetch_all(&providers).await;
        let titles: Vec<_> = report.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Two"]);
        assert_eq!(report.failed_sources, vec!["broken".to_string()]);
        assert!(report.is_partial());
    }
}
