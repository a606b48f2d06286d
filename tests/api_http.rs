// tests/api_http.rs
//
// HTTP-level tests for the service Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /run (success and failed generation)
// - GET /issue/latest (before and after a run)
// - GET /debug/runs
// - GET /metrics

use serde_json::Value as Json;
use http::{header, Request, StatusCode};
use shuttle_axum::axum::{
    body::{self, Body},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt as _; // for `oneshot`

use paddock_pub_chat::api::{self, AppState};
use paddock_pub_chat::generate::mock::{ScriptedGenerator, Step};
use paddock_pub_chat::generate::GenerationError;
use paddock_pub_chat::ingest::providers::rss::RssProvider;
use paddock_pub_chat::ingest::providers::weather::{ContextData, StaticContext};
use paddock_pub_chat::metrics::Metrics;
use paddock_pub_chat::persist::MemoryPersister;
use paddock_pub_chat::{Orchestrator, PhaseSettings, PipelineConfig, PipelineContract, PipelineRunner, SourceProvider};

const BODY_LIMIT: usize = 1024 * 1024;
const BBC: &str = include_str!("fixtures/bbc_f1_rss.xml");

fn state(gen: ScriptedGenerator, out: &Path) -> AppState {
    let config = PipelineConfig {
        output_path: out.to_path_buf(),
        ..Default::default()
    };
    let providers: Vec<Box<dyn SourceProvider>> = vec![Box::new(RssProvider::from_fixture("bbc", BBC))];
    let orchestrator = Orchestrator::new(
        Arc::new(gen),
        PhaseSettings {
            timeout: Duration::from_secs(5),
            ..Default::default()
        },
    );
    let runner = PipelineRunner::new(
        config,
        Arc::new(PipelineContract::paddock_default()),
        providers,
        Box::new(StaticContext(ContextData::failed("Silverstone", "offline"))),
        orchestrator,
        Arc::new(MemoryPersister::new()),
    );
    AppState::new(runner)
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, String) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.expect("read body");
    (status, String::from_utf8(bytes.to_vec()).expect("utf8"))
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let tmp = tempfile::tempdir().unwrap();
    let app = api::router(state(ScriptedGenerator::echo(), &tmp.path().join("i.html")));
    let (status, body) = send(&app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.trim(), "OK");
}

#[tokio::test]
async fn run_then_latest_issue() {
    let tmp = tempfile::tempdir().unwrap();
    let gen = ScriptedGenerator::replies(["<p>draft</p>", "<h1>THE PADDOCK PUB CHAT</h1><p>final words</p>"]);
    let app = api::router(state(gen, &tmp.path().join("i.html")));

    let (status, _) = send(&app, "GET", "/issue/latest").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "POST", "/run").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let v: Json = serde_json::from_str(&body).unwrap();
    assert_eq!(v["ok"], true);
    assert_eq!(v["fetched"], 3);
    assert_eq!(v["curated"], 3);
    assert_eq!(v["persisted"], true);
    assert!(v["words"].as_u64().unwrap() > 0);
    assert!(v["error"].is_null());

    let req = Request::get("/issue/latest").body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let ct = resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap().to_string();
    assert!(ct.starts_with("text/html"));
    let html = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    let html = String::from_utf8(html.to_vec()).unwrap();
    assert!(html.contains("<p>final words</p>"));
    assert!(html.contains("Rate this issue"));

    let (status, body) = send(&app, "GET", "/debug/runs").await;
    assert_eq!(status, StatusCode::OK);
    let runs: Json = serde_json::from_str(&body).unwrap();
    assert_eq!(runs.as_array().unwrap().len(), 1);
    assert_eq!(runs[0]["ok"], true);
    assert_eq!(runs[0]["curated"], 3);
}

#[tokio::test]
async fn failed_generation_is_500_and_recorded() {
    let tmp = tempfile::tempdir().unwrap();
    let gen = ScriptedGenerator::new([Step::Fail(GenerationError::Transport {
        reason: "connection refused".into(),
    })]);
    let app = api::router(state(gen, &tmp.path().join("i.html")));

    let (status, body) = send(&app, "POST", "/run").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let v: Json = serde_json::from_str(&body).unwrap();
    assert_eq!(v["ok"], false);
    assert!(v["error"].as_str().unwrap().contains("connection refused"));

    let (status, _) = send(&app, "GET", "/issue/latest").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, "GET", "/debug/runs?limit=5").await;
    let runs: Json = serde_json::from_str(&body).unwrap();
    assert_eq!(runs[0]["ok"], false);
}

#[tokio::test]
async fn metrics_route_renders() {
    let app = Metrics::detached().router();
    let (status, _) = send(&app, "GET", "/metrics").await;
    assert_eq!(status, StatusCode::OK);
}
