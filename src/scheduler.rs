// src/scheduler.rs
use metrics::{counter, gauge};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::api::{AppState, RunIssueError};

/// Spawn a periodic issue run. The first tick fires after one full interval,
/// so a restart does not immediately publish a new issue. Stops when the
/// state's shutdown token is cancelled.
pub fn spawn_issue_scheduler(state: AppState, interval_secs: u64) -> JoinHandle<()> {
    let period = Duration::from_secs(interval_secs.max(60));
    let shutdown = state.shutdown_token();
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            counter!("scheduler_ticks_total").increment(1);
            match state.run_issue().await {
                Ok(out) => {
                    let now = chrono::Utc::now().timestamp().max(0) as u64;
                    gauge!("scheduler_last_run_ts").set(now as f64);
                    tracing::info!(
                        target: "scheduler",
                        curated = out.curated.len(),
                        words = out.lint.word_count,
                        "scheduled issue done"
                    );
                }
                Err(RunIssueError::Busy) => {
                    tracing::info!(target: "scheduler", "previous run still in progress, tick skipped");
                }
                Err(RunIssueError::Failed(e)) => {
                    tracing::warn!(target: "scheduler", error = %format!("{e:#}"), "scheduled issue failed");
                }
            }
        }
        tracing::info!(target: "scheduler", "issue scheduler stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::PipelineContract;
    use crate::generate::mock::ScriptedGenerator;
    use crate::ingest::providers::rss::RssProvider;
    use crate::ingest::providers::weather::{ContextData, StaticContext};
    use crate::persist::MemoryPersister;
    use crate::{Orchestrator, PhaseSettings, PipelineConfig, PipelineRunner, SourceProvider};
    use std::sync::Arc;

    const FEED: &str = r#"<rss><channel><title>Feed</title>
        <item><title>Norris on pole</title><link>https://a.test/1</link><description>Lap record.</description></item>
        </channel></rss>"#;

    fn state(out: std::path::PathBuf) -> AppState {
        let providers: Vec<Box<dyn SourceProvider>> = vec![Box::new(RssProvider::from_fixture("feed", FEED))];
        let runner = PipelineRunner::new(
            PipelineConfig {
                output_path: out,
                ..Default::default()
            },
            Arc::new(PipelineContract::paddock_default()),
            providers,
            Box::new(StaticContext(ContextData::failed("Silverstone", "offline"))),
            Orchestrator::new(Arc::new(ScriptedGenerator::echo()), PhaseSettings::default()),
            Arc::new(MemoryPersister::new()),
        );
        AppState::new(runner)
    }

    #[tokio::test(start_paused = true)]
    async fn first_run_waits_one_interval_then_stops_on_shutdown() {
        let tmp = tempfile::tempdir().unwrap();
        let st = state(tmp.path().join("issue.html"));
        let handle = spawn_issue_scheduler(st.clone(), 60);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(st.history().last().is_none());

        for _ in 0..100 {
            if st.history().last().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        let rec = st.history().last().expect("one scheduled run");
        assert!(rec.ok, "{:?}", rec.error);
        assert_eq!(rec.curated, 1);

        st.shutdown_token().cancel();
        handle.await.unwrap();
    }
}
