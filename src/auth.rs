// src/auth.rs
//! Bearer tokens for the Google REST APIs (Firestore, Vertex AI).
//!
//! A service-account key mints short-lived access tokens on demand; the
//! provider caches them and refreshes once they near expiry, so callers ask
//! for a token on every request. A fixed token is still accepted for local
//! runs, but it will stop working when it expires.

use anyhow::{anyhow, Context, Result};
use gcp_auth::{CustomServiceAccount, TokenProvider};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Standard Google env var naming a service-account key file.
pub const ENV_GOOGLE_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";
/// Key file picked up from the working directory when nothing else is set.
pub const DEFAULT_CREDENTIALS_PATH: &str = "service-account.json";

pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

#[derive(Clone)]
pub enum TokenSource {
    Static(String),
    ServiceAccount {
        provider: Arc<CustomServiceAccount>,
        project_id: Option<String>,
        client_email: String,
    },
}

#[derive(Deserialize)]
struct KeyFileInfo {
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    client_email: String,
}

impl TokenSource {
    /// Load a service-account key file. Fails on a missing or malformed key,
    /// not on the first token request.
    pub fn service_account(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading service account {}", path.display()))?;
        let info: KeyFileInfo = serde_json::from_str(&raw)
            .with_context(|| format!("parsing service account {}", path.display()))?;
        let provider = CustomServiceAccount::from_json(&raw)
            .map_err(|e| anyhow!("loading service account {}: {e}", path.display()))?;
        Ok(Self::ServiceAccount {
            provider: Arc::new(provider),
            project_id: info.project_id.filter(|p| !p.trim().is_empty()),
            client_email: info.client_email,
        })
    }

    /// Explicit path, then `$GOOGLE_APPLICATION_CREDENTIALS`, then
    /// `service-account.json` if it exists.
    pub fn locate_credentials(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(p) = explicit {
            return Some(p.to_path_buf());
        }
        if let Ok(p) = std::env::var(ENV_GOOGLE_CREDENTIALS) {
            if !p.trim().is_empty() {
                return Some(PathBuf::from(p));
            }
        }
        let fallback = PathBuf::from(DEFAULT_CREDENTIALS_PATH);
        fallback.exists().then_some(fallback)
    }

    /// Project named in the key file, if any.
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::Static(_) => None,
            Self::ServiceAccount { project_id, .. } => project_id.as_deref(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Static(_) => "static",
            Self::ServiceAccount { .. } => "service_account",
        }
    }

    /// A token valid for `scopes`, minted or served from cache.
    pub async fn bearer(&self, scopes: &[&str]) -> Result<String> {
        match self {
            Self::Static(token) if token.is_empty() => Err(anyhow!("no access token configured")),
            Self::Static(token) => Ok(token.clone()),
            Self::ServiceAccount {
                provider, client_email, ..
            } => {
                let token = provider
                    .token(scopes)
                    .await
                    .map_err(|e| anyhow!("minting access token for {client_email}: {e}"))?;
                Ok(token.as_str().to_string())
            }
        }
    }
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(t) => f.debug_struct("Static").field("token_len", &t.len()).finish(),
            Self::ServiceAccount {
                project_id, client_email, ..
            } => f
                .debug_struct("ServiceAccount")
                .field("project_id", project_id)
                .field("client_email", client_email)
                .finish(),
        }
    }
}
