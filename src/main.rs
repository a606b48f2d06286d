//! Paddock Pub Chat service: binary entrypoint.
//! Boots the Axum HTTP server: issue runs on demand (`POST /run`), the latest
//! issue, run history and Prometheus metrics, plus an optional scheduler.

use shuttle_axum::ShuttleAxum;

use paddock_pub_chat::cancel::cancel_on_shutdown_signal;
use paddock_pub_chat::logging::init_tracing;
use paddock_pub_chat::scheduler::spawn_issue_scheduler;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let (router, state) = paddock_pub_chat::app(true)?;
    cancel_on_shutdown_signal(state.shutdown_token());

    if let Some(secs) = state.runner().config().schedule_interval_secs {
        tracing::info!(interval_secs = secs, "issue scheduler enabled");
        spawn_issue_scheduler(state, secs);
    }

    Ok(router.into())
}
