// src/pipeline.rs
//! One issue, end to end:
//! context → fetch → dedup → draft/edit → lint → render → write → persist.
//!
//! Fetch and context failures degrade the run, generation failures abort it,
//! and the persistence outcome is reported but never fails a finished issue.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::analyze::dedup::deduplicate_with_report;
use crate::cancel::CancelToken;
use crate::config::ai::GenerationConfig;
use crate::config::pipeline::PipelineConfig;
use crate::contract::{lint, ContractReport, PipelineContract};
use crate::generate::build_generator;
use crate::history::{now_unix, RunRecord};
use crate::ingest::config::build_providers;
use crate::ingest::fetch_all;
use crate::ingest::providers::weather::{ContextSource, WeatherProvider};
use crate::ingest::types::{SourceItem, SourceProvider};
use crate::orchestrator::{Orchestrator, PhaseSettings};
use crate::persist::{build_persister, write_html, DynPersister, IssueRecord, PersistOutcome};
use crate::render::build_html;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Issue runs started.");
        describe_counter!("pipeline_failures_total", "Issue runs that produced nothing.");
        describe_counter!(
            "contract_violations_total",
            "Finished issues with lint findings, by kind."
        );
        describe_counter!("persist_failures_total", "Failed persistence upserts.");
        describe_gauge!(
            "pipeline_last_success_ts",
            "Unix ts of the last issue that was rendered."
        );
    });
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueOutcome {
    pub fetched: usize,
    pub failed_sources: Vec<String>,
    pub curated: Vec<SourceItem>,
    /// Final edited fragment, as persisted.
    pub body: String,
    /// Full rendered document, as written to disk.
    pub html: String,
    pub lint: ContractReport,
    pub persist: PersistOutcome,
}

impl IssueOutcome {
    pub fn to_record(&self) -> RunRecord {
        RunRecord {
            ts_unix: now_unix(),
            ok: true,
            fetched: self.fetched,
            curated: self.curated.len(),
            words: self.lint.word_count,
            persisted: self.persist.is_stored(),
            error: None,
        }
    }
}

pub struct PipelineRunner {
    config: PipelineConfig,
    contract: Arc<PipelineContract>,
    providers: Vec<Box<dyn SourceProvider>>,
    context: Box<dyn ContextSource>,
    orchestrator: Orchestrator,
    persister: DynPersister,
}

impl PipelineRunner {
    pub fn new(
        config: PipelineConfig,
        contract: Arc<PipelineContract>,
        providers: Vec<Box<dyn SourceProvider>>,
        context: Box<dyn ContextSource>,
        orchestrator: Orchestrator,
        persister: DynPersister,
    ) -> Self {
        ensure_metrics_described();
        Self {
            config,
            contract,
            providers,
            context,
            orchestrator,
            persister,
        }
    }

    /// Wire the live collaborators (HTTP feeds, Open-Meteo, generator,
    /// configured persister) from config.
    pub fn from_config(config: PipelineConfig, gen: &GenerationConfig) -> Result<Self> {
        let contract = PipelineContract::load_or_default(&config.contract_path)?;
        let timeout = Duration::from_secs(config.fetch_timeout_secs.max(1));
        let providers = build_providers(&config.feeds, config.per_feed_cap, timeout)?;
        let context = WeatherProvider::new(config.weather.clone(), timeout)?;
        let orchestrator = Orchestrator::new(build_generator(gen)?, PhaseSettings::from_config(gen));
        let persister = build_persister(&config.persist, timeout).context("building persister")?;
        tracing::info!(
            target: "pipeline",
            feeds = providers.len(),
            generator = orchestrator.service_name(),
            persister = persister.name(),
            "pipeline configured"
        );
        Ok(Self::new(
            config,
            Arc::new(contract),
            providers,
            Box::new(context),
            orchestrator,
            persister,
        ))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn contract(&self) -> Arc<PipelineContract> {
        Arc::clone(&self.contract)
    }

    pub async fn run(&self, cancel: &CancelToken) -> Result<IssueOutcome> {
        self.run_dated(cancel, Local::now().date_naive()).await
    }

    /// `run` with the issue date supplied by the caller.
    pub async fn run_dated(&self, cancel: &CancelToken, date: NaiveDate) -> Result<IssueOutcome> {
        counter!("pipeline_runs_total").increment(1);
        let res = self.run_inner(cancel, date).await;
        if let Err(e) = &res {
            counter!("pipeline_failures_total").increment(1);
            tracing::error!(target: "pipeline", error = %format!("{e:#}"), "issue run failed");
        }
        res
    }

    async fn run_inner(&self, cancel: &CancelToken, date: NaiveDate) -> Result<IssueOutcome> {
        let context = self.context.fetch_context().await;
        if context.is_error() {
            tracing::warn!(target: "pipeline", location = %context.location, "continuing without forecast");
        }

        let fetch = fetch_all(&self.providers).await;
        if fetch.is_partial() {
            tracing::warn!(target: "pipeline", failed = ?fetch.failed_sources, "some sources omitted");
        }

        let dedup = deduplicate_with_report(&fetch.items, &self.config.dedup_params());
        tracing::info!(
            target: "pipeline",
            fetched = fetch.items.len(),
            curated = dedup.kept.len(),
            dropped = dedup.dropped,
            "headlines curated"
        );

        let result = self
            .orchestrator
            .run(&dedup.kept, &context, &self.contract, cancel)
            .await
            .context("generating issue")?;
        if result.text.is_empty() {
            bail!("edit phase returned no text");
        }

        let report = lint(&self.contract, &result.text);
        self.log_lint(&report);
        if self.config.strict_contract && !report.forbidden_hits.is_empty() {
            bail!("forbidden terms in finished issue: {}", report.forbidden_hits.join(", "));
        }

        let html = build_html(&result.text, date);
        write_html(&self.config.output_path, &html)?;
        gauge!("pipeline_last_success_ts").set(now_unix() as f64);

        let record = IssueRecord::new(self.config.persist.key.clone(), result.text.clone(), Utc::now());
        let persist = self.persister.upsert(&record).await;
        match &persist {
            PersistOutcome::Stored { key } => {
                tracing::info!(target: "pipeline", persister = self.persister.name(), %key, "issue persisted")
            }
            PersistOutcome::Skipped => tracing::debug!(target: "pipeline", "persistence disabled"),
            PersistOutcome::Failed { reason } => {
                counter!("persist_failures_total").increment(1);
                tracing::warn!(target: "pipeline", persister = self.persister.name(), %reason, "persist failed (non-fatal)");
            }
        }

        Ok(IssueOutcome {
            fetched: fetch.items.len(),
            failed_sources: fetch.failed_sources,
            curated: dedup.kept,
            body: result.text,
            html,
            lint: report,
            persist,
        })
    }

    fn log_lint(&self, r: &ContractReport) {
        if r.is_clean() {
            tracing::info!(target: "pipeline", words = r.word_count, "issue passes contract lint");
            return;
        }
        if !r.forbidden_hits.is_empty() {
            counter!("contract_violations_total", "kind" => "forbidden_term").increment(1);
        }
        if !r.missing_sections.is_empty() {
            counter!("contract_violations_total", "kind" => "missing_section").increment(1);
        }
        if !r.within_word_range {
            counter!("contract_violations_total", "kind" => "word_count").increment(1);
        }
        if !r.masthead_ok {
            counter!("contract_violations_total", "kind" => "masthead").increment(1);
        }
        tracing::warn!(
            target: "pipeline",
            forbidden = ?r.forbidden_hits,
            missing = ?r.missing_sections,
            masthead_ok = r.masthead_ok,
            words = r.word_count,
            "issue has contract lint findings"
        );
    }
}
