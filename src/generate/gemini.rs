// src/generate/gemini.rs
//! Gemini `generateContent`, either on the Generative Language API with an
//! API key (usually `GOOGLE_API_KEY`) or on Vertex AI with a service account
//! when no key is set.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::error::{GenerationError, Result};
use super::{GenerationRequest, GenerationService};
use crate::auth::{TokenSource, CLOUD_PLATFORM_SCOPE};
use crate::config::ai::GenerationConfig;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

enum GeminiAuth {
    ApiKey(String),
    Vertex {
        tokens: TokenSource,
        project: String,
        location: String,
    },
}

pub struct GeminiClient {
    http: reqwest::Client,
    auth: GeminiAuth,
    base_url: String,
    timeout: Duration,
}

impl GeminiClient {
    fn build(auth: GeminiAuth, base_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("paddock-pub-chat/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            // Backstop only; the orchestrator applies the per-call deadline.
            .timeout(timeout + Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            auth,
            base_url,
            timeout,
        })
    }

    pub fn new(api_key: String, timeout: Duration) -> anyhow::Result<Self> {
        Self::build(GeminiAuth::ApiKey(api_key), DEFAULT_BASE_URL.to_string(), timeout)
    }

    /// Vertex AI publisher endpoint, authenticated with bearer tokens.
    pub fn vertex(
        tokens: TokenSource,
        project: impl Into<String>,
        location: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let location = location.into();
        let base_url = format!("https://{location}-aiplatform.googleapis.com/v1");
        let auth = GeminiAuth::Vertex {
            tokens,
            project: project.into(),
            location,
        };
        Self::build(auth, base_url, timeout)
    }

    pub fn from_config(cfg: &GenerationConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(cfg.timeout_secs);
        if cfg.api_key.is_empty() {
            if let Some(path) = TokenSource::locate_credentials(cfg.credentials_path.as_deref().map(Path::new)) {
                let tokens = TokenSource::service_account(&path)?;
                let project = cfg
                    .vertex_project
                    .clone()
                    .or_else(|| tokens.project_id().map(str::to_string))
                    .ok_or_else(|| anyhow::anyhow!("no vertex project in config or key file"))?;
                tracing::info!(
                    target: "generate",
                    model = %cfg.model,
                    project = %project,
                    location = %cfg.vertex_location,
                    "gemini via vertex ai configured"
                );
                return Self::vertex(tokens, project, cfg.vertex_location.clone(), timeout);
            }
        }
        // Safe diagnostics: never the key itself.
        tracing::info!(
            target: "generate",
            provider = %cfg.provider,
            model = %cfg.model,
            key_len = cfg.api_key.len(),
            "gemini client configured"
        );
        Self::new(cfg.api_key.clone(), timeout)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn uses_vertex(&self) -> bool {
        matches!(self.auth, GeminiAuth::Vertex { .. })
    }

    fn endpoint(&self, model: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        match &self.auth {
            GeminiAuth::ApiKey(_) => format!("{base}/models/{model}:generateContent"),
            GeminiAuth::Vertex { project, location, .. } => format!(
                "{base}/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent"
            ),
        }
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenConfig {
    temperature: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Req<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenConfig,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<RespContent>,
}

#[derive(Deserialize)]
struct RespContent {
    #[serde(default)]
    parts: Vec<RespPart>,
}

#[derive(Deserialize)]
struct RespPart {
    #[serde(default)]
    text: Option<String>,
}

fn build_body(req: &GenerationRequest) -> Req<'_> {
    Req {
        system_instruction: Content {
            role: None,
            parts: vec![Part { text: &req.system }],
        },
        contents: vec![Content {
            role: Some("user"),
            parts: vec![Part { text: &req.user }],
        }],
        generation_config: GenConfig {
            temperature: req.temperature,
        },
    }
}

/// Concatenate the text parts of the first candidate.
pub fn extract_text(body: &str) -> Result<String> {
    let resp: Resp = serde_json::from_str(body).map_err(|e| GenerationError::Malformed {
        reason: e.to_string(),
    })?;
    let text: String = resp
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate(&self, req: &GenerationRequest) -> Result<String> {
        let call = self.http.post(self.endpoint(&req.model));
        let call = match &self.auth {
            GeminiAuth::ApiKey(key) if key.is_empty() => {
                return Err(GenerationError::MissingApiKey {
                    provider: "gemini".into(),
                })
            }
            GeminiAuth::ApiKey(key) => call.header("x-goog-api-key", key),
            GeminiAuth::Vertex { tokens, .. } => {
                let token = tokens
                    .bearer(&[CLOUD_PLATFORM_SCOPE])
                    .await
                    .map_err(|e| GenerationError::Auth { reason: format!("{e:#}") })?;
                call.bearer_auth(token)
            }
        };

        let resp = call
            .json(&build_body(req))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout {
                        secs: self.timeout.as_secs(),
                    }
                } else {
                    GenerationError::Transport {
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| GenerationError::Transport {
            reason: e.to_string(),
        })?;
        if !status.is_success() {
            let snippet: String = body.chars().take(300).collect();
            return Err(GenerationError::Http {
                status: status.as_u16(),
                body: snippet,
            });
        }
        extract_text(&body)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
