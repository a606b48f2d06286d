// src/config/ai.rs
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";
pub const ENV_AI_CONFIG_PATH: &str = "AI_CONFIG_PATH";

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_temperature() -> f32 {
    0.9
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_vertex_location() -> String {
    "us-central1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// "gemini" | "mock" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from GOOGLE_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_temperature")]
    pub draft_temperature: f32,
    #[serde(default = "default_temperature")]
    pub edit_temperature: f32,
    /// Deadline for a single generation call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Service-account key used for Vertex AI when no API key resolves.
    /// Falls back to `$GOOGLE_APPLICATION_CREDENTIALS`, then `service-account.json`.
    #[serde(default)]
    pub credentials_path: Option<String>,
    /// Vertex AI project; defaults to the key file's project.
    #[serde(default)]
    pub vertex_project: Option<String>,
    #[serde(default = "default_vertex_location")]
    pub vertex_location: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: default_api_key(),
            draft_temperature: default_temperature(),
            edit_temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            credentials_path: None,
            vertex_project: None,
            vertex_location: default_vertex_location(),
        }
    }
}

impl GenerationConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading generation config {}", path.display()))?;
        let cfg: GenerationConfig = serde_json::from_str(&data)
            .with_context(|| format!("parsing generation config {}", path.display()))?;
        cfg.resolved()
    }

    /// `$AI_CONFIG_PATH` → `config/ai.json` → defaults; then key resolution.
    pub fn load_default() -> anyhow::Result<Self> {
        if let Ok(p) = env::var(ENV_AI_CONFIG_PATH) {
            return Self::load_from_file(p);
        }
        let p = Path::new(DEFAULT_AI_CONFIG_PATH);
        if p.exists() {
            return Self::load_from_file(p);
        }
        Self::default().resolved()
    }

    /// Normalize provider, resolve "ENV" keys, sanitize numeric fields.
    pub fn resolved(mut self) -> anyhow::Result<Self> {
        self.provider = self.provider.to_lowercase();

        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = match self.provider.as_str() {
                "gemini" => env::var("GOOGLE_API_KEY").unwrap_or_default(),
                "mock" => String::new(),
                other => anyhow::bail!("Unsupported provider in config: {other}"),
            };
        }

        if !(0.0..=2.0).contains(&self.draft_temperature) {
            self.draft_temperature = default_temperature();
        }
        if !(0.0..=2.0).contains(&self.edit_temperature) {
            self.edit_temperature = default_temperature();
        }
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
        if self.vertex_location.trim().is_empty() {
            self.vertex_location = default_vertex_location();
        }
        Ok(self)
    }
}
