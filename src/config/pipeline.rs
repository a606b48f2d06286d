// src/config/pipeline.rs
//! Run configuration: which feeds, how many headlines, dedup tuning, where
//! the forecast is for, and where the issue goes. Passed explicitly into the
//! pipeline; nothing here is process-global.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::analyze::dedup::{DedupParams, DEFAULT_MAX_ITEMS, DEFAULT_SIMILARITY_THRESHOLD};
use crate::analyze::similarity::SimilarityMetric;
use crate::ingest::config::{clean_list, default_feeds, FeedSpec, WeatherSpec};
use crate::ingest::providers::rss::DEFAULT_PER_FEED_CAP;

pub const DEFAULT_PIPELINE_CONFIG_PATH: &str = "config/pipeline.toml";
pub const ENV_PIPELINE_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const ENV_MAX_ITEMS: &str = "MAX_ITEMS";
pub const ENV_SIMILARITY_THRESHOLD: &str = "SIMILARITY_THRESHOLD";
pub const ENV_OUTPUT_PATH: &str = "OUTPUT_PATH";

fn default_per_feed_cap() -> usize {
    DEFAULT_PER_FEED_CAP
}
fn default_max_items() -> usize {
    DEFAULT_MAX_ITEMS
}
fn default_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}
fn default_fetch_timeout_secs() -> u64 {
    15
}
fn default_output_path() -> PathBuf {
    PathBuf::from("prix_six_chat.html")
}
fn default_contract_path() -> PathBuf {
    PathBuf::from("config/contract.toml")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistConfig {
    /// "firestore" | "file" | "none"
    pub kind: String,
    /// Document key, e.g. "app-settings/pub-chat".
    #[serde(default = "default_doc_key")]
    pub key: String,
    /// Target file for kind = "file".
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Service-account key for kind = "firestore". Falls back to
    /// `$GOOGLE_APPLICATION_CREDENTIALS`, then `service-account.json`.
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
    /// Firestore project; defaults to `$FIRESTORE_PROJECT`, then the key file's project.
    #[serde(default)]
    pub project: Option<String>,
}

fn default_doc_key() -> String {
    "app-settings/pub-chat".to_string()
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            kind: "none".to_string(),
            key: default_doc_key(),
            path: None,
            credentials_path: None,
            project: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedSpec>,
    #[serde(default = "default_per_feed_cap")]
    pub per_feed_cap: usize,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f64,
    #[serde(default)]
    pub similarity_metric: SimilarityMetric,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default)]
    pub weather: WeatherSpec,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    #[serde(default = "default_contract_path")]
    pub contract_path: PathBuf,
    /// Fail the run when the finished issue still contains a forbidden term.
    #[serde(default)]
    pub strict_contract: bool,
    #[serde(default)]
    pub persist: PersistConfig,
    /// Service mode only: run an issue every N seconds.
    #[serde(default)]
    pub schedule_interval_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            feeds: default_feeds(),
            per_feed_cap: default_per_feed_cap(),
            max_items: default_max_items(),
            similarity_threshold: default_threshold(),
            similarity_metric: SimilarityMetric::default(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            weather: WeatherSpec::default(),
            output_path: default_output_path(),
            contract_path: default_contract_path(),
            strict_contract: false,
            persist: PersistConfig::default(),
            schedule_interval_secs: None,
        }
    }
}

// parse optional float env and clamp to <0.0..=1.0>
fn parse_threshold_env(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

impl PipelineConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let cfg: PipelineConfig = toml::from_str(&raw)
            .with_context(|| format!("parsing pipeline config {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $PIPELINE_CONFIG_PATH
    /// 2) config/pipeline.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        let base = if let Ok(p) = std::env::var(ENV_PIPELINE_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("PIPELINE_CONFIG_PATH points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let p = PathBuf::from(DEFAULT_PIPELINE_CONFIG_PATH);
            if p.exists() {
                Self::load_from(&p)?
            } else {
                Self::default()
            }
        };
        Ok(base.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(n) = std::env::var(ENV_MAX_ITEMS)
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
        {
            self.max_items = n;
        }
        if let Some(t) = parse_threshold_env(std::env::var(ENV_SIMILARITY_THRESHOLD).ok()) {
            self.similarity_threshold = t;
        }
        if let Ok(p) = std::env::var(ENV_OUTPUT_PATH) {
            if !p.trim().is_empty() {
                self.output_path = PathBuf::from(p);
            }
        }
        self
    }

    fn sanitized(mut self) -> Self {
        self.feeds = clean_list(self.feeds);
        if !self.similarity_threshold.is_finite() {
            self.similarity_threshold = default_threshold();
        }
        self.similarity_threshold = self.similarity_threshold.clamp(0.0, 1.0);
        if self.per_feed_cap == 0 {
            self.per_feed_cap = default_per_feed_cap();
        }
        self
    }

    pub fn dedup_params(&self) -> DedupParams {
        DedupParams {
            max_count: self.max_items,
            threshold: self.similarity_threshold,
            metric: self.similarity_metric,
        }
    }
}
