//! One issue from the command line: fetch, dedup, draft, edit, render, write
//! the HTML file, persist. Exits non-zero when no issue was produced.
//! Ctrl-C or SIGTERM cancels the run at the next generation boundary.

use std::process::ExitCode;

use paddock_pub_chat::cancel::cancel_on_shutdown_signal;
use paddock_pub_chat::logging::init_tracing;
use paddock_pub_chat::{CancelToken, GenerationConfig, PipelineConfig, PipelineRunner};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("run failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let cfg = PipelineConfig::load_default()?;
    let gen = GenerationConfig::load_default()?;
    let output = cfg.output_path.clone();
    let runner = PipelineRunner::from_config(cfg, &gen)?;

    let cancel = CancelToken::new();
    cancel_on_shutdown_signal(cancel.clone());

    let out = runner.run(&cancel).await?;
    println!(
        "{} stories fetched, {} after dedup; {} words; saved to {}; persist: {:?}",
        out.fetched,
        out.curated.len(),
        out.lint.word_count,
        output.display(),
        out.persist
    );
    if !out.failed_sources.is_empty() {
        println!("sources omitted: {}", out.failed_sources.join(", "));
    }
    Ok(())
}
