// src/orchestrator.rs
//! Two-phase generation: a free draft, then an edit pass that re-checks the
//! draft against the contract as an explicit checklist.
//!
//! Phase A always completes before Phase B starts and Phase B only ever sees
//! Phase A's normalized text from the same run. Any failure (service error,
//! timeout, cancellation) aborts the run with no text at all; a draft that
//! skipped the edit pass is never returned.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::Instrument;

use crate::cancel::CancelToken;
use crate::config::ai::GenerationConfig;
use crate::contract::{draft_instruction, draft_payload, edit_payload, enforcement_instruction, PipelineContract};
use crate::generate::{DynGenerator, GenerationError, GenerationRequest, GenerationResult};
use crate::ingest::providers::weather::ContextData;
use crate::ingest::types::SourceItem;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("generation_calls_total", "Generation service calls, by phase.");
        describe_counter!(
            "generation_failures_total",
            "Failed generation calls (error, timeout or cancel), by phase."
        );
        describe_histogram!("generation_call_ms", "Generation call latency in milliseconds.");
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Draft,
    Edit,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Draft => "draft",
            Phase::Edit => "edit",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{phase} phase failed: {source}")]
pub struct RunError {
    pub phase: Phase,
    pub source: GenerationError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSettings {
    pub model: String,
    pub draft_temperature: f32,
    pub edit_temperature: f32,
    /// Per-call deadline.
    pub timeout: Duration,
}

impl PhaseSettings {
    pub fn from_config(cfg: &GenerationConfig) -> Self {
        Self {
            model: cfg.model.clone(),
            draft_temperature: cfg.draft_temperature,
            edit_temperature: cfg.edit_temperature,
            timeout: Duration::from_secs(cfg.timeout_secs),
        }
    }
}

impl Default for PhaseSettings {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

#[derive(Debug)]
enum RunState {
    Drafting,
    Editing { draft: GenerationResult },
    Done(GenerationResult),
    Failed(RunError),
}

pub struct Orchestrator {
    service: DynGenerator,
    settings: PhaseSettings,
}

impl Orchestrator {
    pub fn new(service: DynGenerator, settings: PhaseSettings) -> Self {
        ensure_metrics_described();
        Self { service, settings }
    }

    pub fn settings(&self) -> &PhaseSettings {
        &self.settings
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    pub async fn run(
        &self,
        items: &[SourceItem],
        context: &ContextData,
        contract: &PipelineContract,
        cancel: &CancelToken,
    ) -> Result<GenerationResult, RunError> {
        let mut state = RunState::Drafting;
        loop {
            state = match state {
                RunState::Drafting => {
                    let req = GenerationRequest {
                        system: draft_instruction(contract),
                        user: draft_payload(contract, items, context),
                        temperature: self.settings.draft_temperature,
                        model: self.settings.model.clone(),
                    };
                    match self.call(Phase::Draft, &req, cancel).await {
                        Ok(raw) => RunState::Editing {
                            draft: GenerationResult::from_raw(raw),
                        },
                        Err(e) => RunState::Failed(e),
                    }
                }
                RunState::Editing { draft } => {
                    tracing::debug!(target: "orchestrator", draft_chars = draft.text.len(), "draft ready");
                    let req = GenerationRequest {
                        system: enforcement_instruction(contract),
                        user: edit_payload(&draft.text),
                        temperature: self.settings.edit_temperature,
                        model: self.settings.model.clone(),
                    };
                    match self.call(Phase::Edit, &req, cancel).await {
                        Ok(raw) => RunState::Done(GenerationResult::from_raw(raw)),
                        Err(e) => RunState::Failed(e),
                    }
                }
                RunState::Done(result) => {
                    tracing::info!(target: "orchestrator", chars = result.text.len(), "generation done");
                    return Ok(result);
                }
                RunState::Failed(err) => {
                    tracing::warn!(target: "orchestrator", phase = %err.phase, error = %err.source, "generation failed");
                    return Err(err);
                }
            };
        }
    }

    /// One bounded, cancellable service call. No retries.
    async fn call(&self, phase: Phase, req: &GenerationRequest, cancel: &CancelToken) -> Result<String, RunError> {
        let fail = |source| RunError { phase, source };
        if cancel.is_cancelled() {
            counter!("generation_failures_total", "phase" => phase.as_str()).increment(1);
            return Err(fail(GenerationError::Cancelled));
        }

        counter!("generation_calls_total", "phase" => phase.as_str()).increment(1);
        let span = tracing::info_span!("generation", phase = %phase, service = self.service.name());
        let started = Instant::now();
        let timeout = self.settings.timeout;

        let outcome = async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(GenerationError::Cancelled),
                r = tokio::time::timeout(timeout, self.service.generate(req)) => match r {
                    Ok(inner) => inner,
                    Err(_) => Err(GenerationError::Timeout { secs: timeout.as_secs() }),
                },
            }
        }
        .instrument(span)
        .await;

        let ms = started.elapsed().as_secs_f64() * 1000.0;
        histogram!("generation_call_ms", "phase" => phase.as_str()).record(ms);

        match outcome {
            Ok(text) => {
                tracing::info!(target: "orchestrator", %phase, chars = text.len(), ms = ms as u64, "phase complete");
                Ok(text)
            }
            Err(e) => {
                counter!("generation_failures_total", "phase" => phase.as_str()).increment(1);
                Err(fail(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::mock::{ScriptedGenerator, Step};
    use std::sync::Arc;

    fn items() -> Vec<SourceItem> {
        vec![
            SourceItem::new("Verstappen wins Silverstone GP", "BBC Sport").with_link("https://x/1"),
            SourceItem::new("Ferrari announce new sponsor", "Autosport"),
        ]
    }

    fn settings(timeout: Duration) -> PhaseSettings {
        PhaseSettings {
            model: "test-model".into(),
            draft_temperature: 0.9,
            edit_temperature: 0.3,
            timeout,
        }
    }

    fn ctx() -> ContextData {
        ContextData::failed("Silverstone", "offline")
    }

    #[tokio::test]
    async fn edit_phase_sees_normalized_draft() {
        let g = Arc::new(ScriptedGenerator::replies([
            "```html\n<p>draft</p>\n```",
            "```html\n<p>final</p>\n```",
        ]));
        let orch = Orchestrator::new(g.clone(), settings(Duration::from_secs(5)));
        let contract = PipelineContract::paddock_default();

        let out = orch
            .run(&items(), &ctx(), &contract, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(out.text, "<p>final</p>");

        let calls = g.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].system, draft_instruction(&contract));
        assert_eq!(calls[0].user, draft_payload(&contract, &items(), &ctx()));
        assert_eq!(calls[0].temperature, 0.9);
        assert_eq!(calls[1].system, enforcement_instruction(&contract));
        assert_eq!(calls[1].user, edit_payload("<p>draft</p>"));
        assert_eq!(calls[1].temperature, 0.3);
        assert!(calls.iter().all(|c| c.model == "test-model"));
    }

    #[tokio::test]
    async fn draft_failure_skips_edit() {
        let g = Arc::new(ScriptedGenerator::new([Step::Fail(GenerationError::EmptyResponse)]));
        let orch = Orchestrator::new(g.clone(), settings(Duration::from_secs(5)));
        let err = orch
            .run(&items(), &ctx(), &PipelineContract::paddock_default(), &CancelToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.phase, Phase::Draft);
        assert_eq!(err.source, GenerationError::EmptyResponse);
        assert_eq!(g.calls().len(), 1);
    }

    #[tokio::test]
    async fn edit_failure_returns_no_text() {
        let g = Arc::new(ScriptedGenerator::new([
            Step::Reply("<p>draft with Jeremy</p>".into()),
            Step::Fail(GenerationError::Http {
                status: 503,
                body: "overloaded".into(),
            }),
        ]));
        let orch = Orchestrator::new(g.clone(), settings(Duration::from_secs(5)));
        let res = orch
            .run(&items(), &ctx(), &PipelineContract::paddock_default(), &CancelToken::new())
            .await;
        let err = res.unwrap_err();
        assert_eq!(err.phase, Phase::Edit);
        assert!(matches!(err.source, GenerationError::Http { status: 503, .. }));
        assert!(err.to_string().starts_with("edit phase failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let g = Arc::new(ScriptedGenerator::new([Step::Delayed(
            Duration::from_secs(300),
            "<p>late</p>".into(),
        )]));
        let orch = Orchestrator::new(g.clone(), settings(Duration::from_secs(120)));
        let err = orch
            .run(&items(), &ctx(), &PipelineContract::paddock_default(), &CancelToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.phase, Phase::Draft);
        assert_eq!(err.source, GenerationError::Timeout { secs: 120 });
        assert_eq!(g.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_draft_never_reaches_edit() {
        let g = Arc::new(ScriptedGenerator::new([
            Step::Delayed(Duration::from_secs(30), "<p>stale draft</p>".into()),
            Step::Reply("<p>final</p>".into()),
        ]));
        let orch = Orchestrator::new(g.clone(), settings(Duration::from_secs(120)));
        let contract = PipelineContract::paddock_default();
        let cancel = CancelToken::new();
        let items = items();
        let ctx = ctx();

        let (res, _) = tokio::join!(orch.run(&items, &ctx, &contract, &cancel), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        });

        let err = res.unwrap_err();
        assert_eq!(err.phase, Phase::Draft);
        assert_eq!(err.source, GenerationError::Cancelled);
        assert_eq!(g.calls().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_before_start_makes_no_calls() {
        let g = Arc::new(ScriptedGenerator::echo());
        let orch = Orchestrator::new(g.clone(), settings(Duration::from_secs(5)));
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = orch
            .run(&items(), &ctx(), &PipelineContract::paddock_default(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.source, GenerationError::Cancelled);
        assert!(g.calls().is_empty());
    }
}
