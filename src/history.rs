//! history.rs: capped in-memory log of issue runs, for /debug/runs.

use serde::Serialize;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    pub ts_unix: u64,
    pub ok: bool,
    pub fetched: usize,
    pub curated: usize,
    pub words: usize,
    pub persisted: bool,
    pub error: Option<String>,
}

impl RunRecord {
    pub fn failed(error: impl ToString) -> Self {
        Self {
            ts_unix: now_unix(),
            ok: false,
            fetched: 0,
            curated: 0,
            words: 0,
            persisted: false,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug)]
pub struct RunHistory {
    inner: Mutex<Vec<RunRecord>>,
    cap: usize,
}

impl RunHistory {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 10_000);
        Self {
            inner: Mutex::new(Vec::with_capacity(cap)),
            cap,
        }
    }

    pub fn push(&self, rec: RunRecord) {
        let mut v = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        v.push(rec);
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
    }

    /// Oldest first.
    pub fn snapshot_last_n(&self, n: usize) -> Vec<RunRecord> {
        let v = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let start = v.len().saturating_sub(n);
        v[start..].to_vec()
    }

    pub fn last(&self) -> Option<RunRecord> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
