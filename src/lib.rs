// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod analyze;
pub mod api;
pub mod auth;
pub mod cancel;
pub mod config;
pub mod contract;
pub mod generate;
pub mod history;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod persist;
pub mod pipeline;
pub mod render;
pub mod scheduler;

// ---- Re-exports for stable public API ----
pub use crate::analyze::{deduplicate, DedupParams};
pub use crate::api::{router, AppState};
pub use crate::cancel::CancelToken;
pub use crate::config::{GenerationConfig, PipelineConfig};
pub use crate::contract::PipelineContract;
pub use crate::ingest::types::{SourceItem, SourceProvider};
pub use crate::orchestrator::{Orchestrator, PhaseSettings, RunError};
pub use crate::pipeline::{IssueOutcome, PipelineRunner};

use shuttle_axum::axum::Router;

/// Build the full service router from config on disk / env: API routes plus
/// `/metrics` when `with_metrics` is set. Returns the state too so the
/// caller can start the scheduler or cancel runs on shutdown.
pub fn app(with_metrics: bool) -> anyhow::Result<(Router, AppState)> {
    let cfg = PipelineConfig::load_default()?;
    let gen = GenerationConfig::load_default()?;
    let metrics = if with_metrics {
        Some(crate::metrics::Metrics::init(&cfg)?)
    } else {
        None
    };
    let state = AppState::new(PipelineRunner::from_config(cfg, &gen)?);
    let mut router = api::router(state.clone());
    if let Some(m) = metrics {
        router = router.merge(m.router());
    }
    Ok((router, state))
}
