// src/persist/file.rs
//! JSON file store: one object mapping key -> record.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{write_atomic, IssueRecord, PersistOutcome, Persister};

pub struct FilePersister {
    path: PathBuf,
}

impl FilePersister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<BTreeMap<String, IssueRecord>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading store {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).with_context(|| format!("parsing store {}", self.path.display()))
    }

    fn try_upsert(&self, record: &IssueRecord) -> Result<()> {
        let mut all = self.load()?;
        all.insert(record.key.clone(), record.clone());
        let json = serde_json::to_string_pretty(&all)?;
        write_atomic(&self.path, &json)
    }
}

#[async_trait]
impl Persister for FilePersister {
    async fn upsert(&self, record: &IssueRecord) -> PersistOutcome {
        let store = FilePersister::new(self.path.clone());
        let owned = record.clone();
        let result = tokio::task::spawn_blocking(move || store.try_upsert(&owned))
            .await
            .map_err(|e| anyhow::anyhow!("file store task failed: {e}"))
            .and_then(|r| r);
        PersistOutcome::from_result(&record.key, result)
    }

    fn name(&self) -> &str {
        "file"
    }
}
