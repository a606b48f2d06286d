// src/ingest/types.rs
use anyhow::Result;

/// One fetched headline. Read-only once built by a provider.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct SourceItem {
    pub title: String,   // sole dedup key
    pub summary: String, // may be empty
    pub link: String,    // may be empty
    pub source: String,  // e.g. "BBC Sport - Formula 1"
}

impl SourceItem {
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<SourceItem>>;
    fn name(&self) -> &str;
}
