use std::sync::{Arc, RwLock};

use shuttle_axum::axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::cancel::CancelToken;
use crate::history::{RunHistory, RunRecord};
use crate::pipeline::{IssueOutcome, PipelineRunner};

const HISTORY_CAP: usize = 200;

#[derive(Clone)]
pub struct AppState {
    runner: Arc<PipelineRunner>,
    history: Arc<RunHistory>,
    latest_html: Arc<RwLock<Option<String>>>,
    // one issue at a time; they all write the same output file
    run_lock: Arc<tokio::sync::Mutex<()>>,
    shutdown: CancelToken,
}

#[derive(Debug)]
pub enum RunIssueError {
    Busy,
    Failed(anyhow::Error),
}

impl AppState {
    pub fn new(runner: PipelineRunner) -> Self {
        Self {
            runner: Arc::new(runner),
            history: Arc::new(RunHistory::with_capacity(HISTORY_CAP)),
            latest_html: Arc::new(RwLock::new(None)),
            run_lock: Arc::new(tokio::sync::Mutex::new(())),
            shutdown: CancelToken::new(),
        }
    }

    /// Cancelled by the service binary on Ctrl-C / SIGTERM; in-flight runs
    /// abort at their next generation call and the scheduler stops.
    pub fn shutdown_token(&self) -> CancelToken {
        self.shutdown.clone()
    }

    pub fn runner(&self) -> Arc<PipelineRunner> {
        Arc::clone(&self.runner)
    }

    pub fn history(&self) -> Arc<RunHistory> {
        Arc::clone(&self.history)
    }

    /// Run one issue, record it, and remember the rendered document.
    pub async fn run_issue(&self) -> Result<IssueOutcome, RunIssueError> {
        let _guard = self.run_lock.try_lock().map_err(|_| RunIssueError::Busy)?;
        match self.runner.run(&self.shutdown).await {
            Ok(out) => {
                self.history.push(out.to_record());
                let mut latest = self.latest_html.write().unwrap_or_else(|e| e.into_inner());
                *latest = Some(out.html.clone());
                Ok(out)
            }
            Err(e) => {
                self.history.push(RunRecord::failed(format!("{e:#}")));
                Err(RunIssueError::Failed(e))
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/run", post(run))
        .route("/issue/latest", get(issue_latest))
        .route("/debug/runs", get(debug_runs))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, serde::Serialize)]
struct RunResp {
    ok: bool,
    fetched: usize,
    curated: usize,
    words: usize,
    persisted: bool,
    error: Option<String>,
}

impl RunResp {
    fn failed(error: String) -> Self {
        Self {
            ok: false,
            fetched: 0,
            curated: 0,
            words: 0,
            persisted: false,
            error: Some(error),
        }
    }
}

async fn run(State(state): State<AppState>) -> (StatusCode, Json<RunResp>) {
    match state.run_issue().await {
        Ok(out) => (
            StatusCode::OK,
            Json(RunResp {
                ok: true,
                fetched: out.fetched,
                curated: out.curated.len(),
                words: out.lint.word_count,
                persisted: out.persist.is_stored(),
                error: None,
            }),
        ),
        Err(RunIssueError::Busy) => (
            StatusCode::CONFLICT,
            Json(RunResp::failed("a run is already in progress".into())),
        ),
        Err(RunIssueError::Failed(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(RunResp::failed(format!("{e:#}"))),
        ),
    }
}

async fn issue_latest(State(state): State<AppState>) -> Response {
    let latest = state
        .latest_html
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone();
    match latest {
        Some(html) => ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html).into_response(),
        None => (StatusCode::NOT_FOUND, "no issue yet").into_response(),
    }
}

#[derive(serde::Deserialize)]
struct RunsQuery {
    limit: Option<usize>,
}

async fn debug_runs(State(state): State<AppState>, Query(q): Query<RunsQuery>) -> Json<Vec<RunRecord>> {
    let limit = q.limit.unwrap_or(20);
    Json(state.history.snapshot_last_n(limit))
}
