//! Generation service abstraction + concrete providers.
//!
//! The service is a stateless call: system instruction + user content in,
//! text out. Nothing here retries; the orchestrator decides what a failure
//! means for the run.

pub mod error;
pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use error::GenerationError;
pub use gemini::GeminiClient;
pub use mock::ScriptedGenerator;

use crate::config::ai::GenerationConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub model: String,
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, req: &GenerationRequest) -> error::Result<String>;
    /// Provider name for diagnostics.
    fn name(&self) -> &str;
}

pub type DynGenerator = Arc<dyn GenerationService>;

/// Text produced by one phase: what the service said, and the normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    pub raw: String,
    pub text: String,
}

impl GenerationResult {
    pub fn from_raw(raw: String) -> Self {
        let text = normalize(&raw);
        Self { raw, text }
    }
}

/// Strip an optional leading code fence (with optional format hint such as
/// `html`) and an optional trailing fence, then trim. Idempotent.
pub fn normalize(text: &str) -> String {
    static RE_OPEN: OnceCell<Regex> = OnceCell::new();
    static RE_CLOSE: OnceCell<Regex> = OnceCell::new();
    let re_open = RE_OPEN.get_or_init(|| Regex::new(r"^```[A-Za-z0-9_+\-]*[ \t]*(?:\r?\n)?").unwrap());
    let re_close = RE_CLOSE.get_or_init(|| Regex::new(r"(?:\r?\n)?[ \t]*```$").unwrap());

    let mut out = text.trim();
    loop {
        let before = out.len();
        if let Some(m) = re_open.find(out) {
            out = out[m.end()..].trim();
        }
        if let Some(m) = re_close.find(out) {
            out = out[..m.start()].trim();
        }
        if out.len() == before {
            break;
        }
    }
    out.to_string()
}

/// Factory: build the generation service described by config.
///
/// * `AI_TEST_MODE=mock` returns a canned mock regardless of config.
/// * `provider = "mock"` likewise.
/// * Otherwise the Gemini client.
pub fn build_generator(cfg: &GenerationConfig) -> anyhow::Result<DynGenerator> {
    let mock_env = std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false);
    if mock_env || cfg.provider.eq_ignore_ascii_case("mock") {
        tracing::info!(target: "generate", "using canned mock generator");
        return Ok(Arc::new(ScriptedGenerator::echo()));
    }
    match cfg.provider.to_ascii_lowercase().as_str() {
        "gemini" => Ok(Arc::new(GeminiClient::from_config(cfg)?)),
        other => anyhow::bail!("unsupported generation provider: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tagged_fence() {
        let raw = "```html\n<h1>HI</h1>\n<p>x</p>\n```";
        assert_eq!(normalize(raw), "<h1>HI</h1>\n<p>x</p>");
    }

    #[test]
    fn strips_fence_with_content_on_the_same_line() {
        assert_eq!(normalize("```html <p>x</p>\n```"), "<p>x</p>");
        assert_eq!(normalize("```html<p>x</p>```"), "<p>x</p>");
        assert_eq!(normalize("```<p>x</p>```"), "<p>x</p>");
    }

    #[test]
    fn strips_bare_fence_and_whitespace() {
        assert_eq!(normalize("\n\n```\n<p>x</p>\n```  \n"), "<p>x</p>");
    }

    #[test]
    fn unfenced_text_only_trimmed() {
        assert_eq!(normalize("  <p>a ``` b</p>  "), "<p>a ``` b</p>");
    }

    #[test]
    fn leading_fence_without_trailing() {
        assert_eq!(normalize("```html\n<p>cut off"), "<p>cut off");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in [
            "```html\n<p>x</p>\n```",
            "  plain  ",
            "```\n```",
            "```html\n```html\n<p>nested</p>\n```\n```",
            "```html<p>x</p>```",
            "",
        ] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn result_keeps_raw_text() {
        let r = GenerationResult::from_raw("```html\n<p>x</p>\n```".into());
        assert_eq!(r.text, "<p>x</p>");
        assert!(r.raw.starts_with("```html"));
    }
}
