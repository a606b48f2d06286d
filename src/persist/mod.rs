// src/persist/mod.rs
//! Key-value upsert of the finished issue, plus the local HTML file.
//!
//! Persistence is a best-effort side effect after the issue exists. Every
//! `Persister` reports an explicit `PersistOutcome`; the caller logs it and
//! the run's success does not depend on it.

pub mod file;
pub mod firestore;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub use file::FilePersister;
pub use firestore::FirestorePersister;

use crate::config::pipeline::PersistConfig;

pub const UPDATED_BY: &str = "paddock_pub_chat";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub key: String,
    pub content: String,
    pub content_sha256: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl IssueRecord {
    pub fn new(key: impl Into<String>, content: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        let content = content.into();
        Self {
            key: key.into(),
            content_sha256: sha256_hex(&content),
            content,
            updated_at,
            updated_by: UPDATED_BY.to_string(),
        }
    }
}

pub fn sha256_hex(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersistOutcome {
    Stored { key: String },
    Skipped,
    Failed { reason: String },
}

impl PersistOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, PersistOutcome::Stored { .. })
    }

    /// Fold an I/O result into an outcome for `key`.
    pub fn from_result(key: &str, r: Result<()>) -> Self {
        match r {
            Ok(()) => PersistOutcome::Stored { key: key.to_string() },
            Err(e) => PersistOutcome::Failed {
                reason: format!("{e:#}"),
            },
        }
    }
}

#[async_trait]
pub trait Persister: Send + Sync {
    /// Insert or replace the record under `record.key`. Never panics, never
    /// returns early with an error: the outcome carries success or failure.
    async fn upsert(&self, record: &IssueRecord) -> PersistOutcome;
    fn name(&self) -> &str;
}

pub type DynPersister = Arc<dyn Persister>;

/// Persistence disabled.
pub struct NoopPersister;

#[async_trait]
impl Persister for NoopPersister {
    async fn upsert(&self, _record: &IssueRecord) -> PersistOutcome {
        PersistOutcome::Skipped
    }
    fn name(&self) -> &str {
        "none"
    }
}

/// In-process store, mostly for tests. Can be told to fail.
#[derive(Default)]
pub struct MemoryPersister {
    records: Mutex<BTreeMap<String, IssueRecord>>,
    fail_with: Option<String>,
}

impl MemoryPersister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            records: Mutex::default(),
            fail_with: Some(reason.into()),
        }
    }

    pub fn get(&self, key: &str) -> Option<IssueRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Persister for MemoryPersister {
    async fn upsert(&self, record: &IssueRecord) -> PersistOutcome {
        if let Some(reason) = &self.fail_with {
            return PersistOutcome::Failed { reason: reason.clone() };
        }
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(record.key.clone(), record.clone());
        PersistOutcome::Stored {
            key: record.key.clone(),
        }
    }
    fn name(&self) -> &str {
        "memory"
    }
}

/// Build the persister named by config. `firestore` resolves its
/// credentials and project as described on `FirestorePersister::from_config`.
pub fn build_persister(cfg: &PersistConfig, timeout: std::time::Duration) -> Result<DynPersister> {
    match cfg.kind.to_ascii_lowercase().as_str() {
        "none" | "" => Ok(Arc::new(NoopPersister)),
        "memory" => Ok(Arc::new(MemoryPersister::new())),
        "file" => {
            let path = cfg
                .path
                .clone()
                .unwrap_or_else(|| std::path::PathBuf::from("pub_chat_store.json"));
            Ok(Arc::new(FilePersister::new(path)))
        }
        "firestore" => Ok(Arc::new(FirestorePersister::from_config(cfg, timeout)?)),
        other => anyhow::bail!("unsupported persist kind: {other}"),
    }
}

/// Write `contents` to `path` via a sibling temp file and rename, so readers
/// never see a half-written file.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let tmp = dir.join(format!(".{file_name}.{}.tmp", std::process::id()));
    let written = write_new(&tmp, contents)
        .and_then(|()| fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display())));
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}

fn write_new(path: &Path, contents: &str) -> Result<()> {
    let mut f = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    f.write_all(contents.as_bytes())
        .with_context(|| format!("writing {}", path.display()))?;
    f.sync_all().ok();
    Ok(())
}

/// Write the rendered document.
pub fn write_html(path: &Path, html: &str) -> Result<()> {
    write_atomic(path, html)?;
    tracing::info!(target: "persist", path = %path.display(), bytes = html.len(), "issue html written");
    Ok(())
}
