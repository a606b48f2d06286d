// src/logging.rs
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Events carry per-stage targets (`pipeline`, `orchestrator`, ...), so each
/// one is named here; anything else only shows at warn.
pub const DEFAULT_FILTER: &str = "paddock_pub_chat=info,pipeline=info,orchestrator=info,ingest=info,\
generate=info,persist=info,scheduler=info,dedup=info,warn";

/// Install the global subscriber: `RUST_LOG` (falling back to
/// `DEFAULT_FILTER`), compact output, or JSON lines with `LOG_FORMAT=json`.
/// A no-op if a subscriber is already installed (the Shuttle runtime sets one).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, Layer};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<String>>>);

    impl<S: Subscriber> Layer<S> for Capture {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let meta = event.metadata();
            self.0.lock().push(format!("{}:{}", meta.target(), meta.level()));
        }
    }

    #[test]
    fn default_filter_passes_stage_progress_logs() {
        let seen = Capture::default();
        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::new(DEFAULT_FILTER))
            .with(seen.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "pipeline", "headlines curated");
            tracing::info!(target: "orchestrator", "phase complete");
            tracing::info!(target: "persist", "issue persisted");
            tracing::debug!(target: "pipeline", "noise");
            tracing::info!(target: "hyper", "foreign chatter");
            tracing::warn!(target: "hyper", "foreign warning");
        });

        assert_eq!(
            *seen.0.lock(),
            vec![
                "pipeline:INFO".to_string(),
                "orchestrator:INFO".to_string(),
                "persist:INFO".to_string(),
                "hyper:WARN".to_string(),
            ]
        );
    }
}
