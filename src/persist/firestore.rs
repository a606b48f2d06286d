// src/persist/firestore.rs
//! Firestore REST upsert: PATCH on the document with an update mask, so
//! fields other than ours are left alone (merge semantics).

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use super::{IssueRecord, PersistOutcome, Persister};
use crate::auth::{TokenSource, DATASTORE_SCOPE};
use crate::config::pipeline::PersistConfig;

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";
pub const ENV_FIRESTORE_PROJECT: &str = "FIRESTORE_PROJECT";
pub const ENV_FIRESTORE_TOKEN: &str = "FIRESTORE_TOKEN";

const MASK: [&str; 4] = ["content", "contentSha256", "lastUpdated", "updatedBy"];

pub struct FirestorePersister {
    http: reqwest::Client,
    project: String,
    auth: TokenSource,
    base_url: String,
}

impl FirestorePersister {
    pub fn new(project: impl Into<String>, auth: TokenSource, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("paddock-pub-chat/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            project: project.into(),
            auth,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Credentials: a service-account key (config path,
    /// `$GOOGLE_APPLICATION_CREDENTIALS`, or `service-account.json`), else a
    /// fixed `$FIRESTORE_TOKEN`. Project: config, `$FIRESTORE_PROJECT`, then
    /// the key file's own project.
    pub fn from_config(cfg: &PersistConfig, timeout: Duration) -> Result<Self> {
        let auth = match TokenSource::locate_credentials(cfg.credentials_path.as_deref()) {
            Some(path) => TokenSource::service_account(&path)?,
            None => {
                let token = std::env::var(ENV_FIRESTORE_TOKEN).map_err(|_| {
                    anyhow!("firestore needs a service account key or {ENV_FIRESTORE_TOKEN}")
                })?;
                tracing::warn!(
                    target: "persist",
                    token_len = token.len(),
                    "firestore using a fixed access token; it stops working once it expires"
                );
                TokenSource::Static(token)
            }
        };
        let project = cfg
            .project
            .clone()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| std::env::var(ENV_FIRESTORE_PROJECT).ok().filter(|p| !p.trim().is_empty()))
            .or_else(|| auth.project_id().map(str::to_string))
            .ok_or_else(|| anyhow!("no firestore project: set persist.project or {ENV_FIRESTORE_PROJECT}"))?;
        tracing::info!(target: "persist", project = %project, auth = auth.kind(), "firestore persister configured");
        Self::new(project, auth, timeout)
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn auth(&self) -> &TokenSource {
        &self.auth
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Document URL including the update mask query.
    pub fn document_url(&self, key: &str) -> String {
        let mask: Vec<String> = MASK.iter().map(|f| format!("updateMask.fieldPaths={f}")).collect();
        format!(
            "{}/projects/{}/databases/(default)/documents/{}?{}",
            self.base_url.trim_end_matches('/'),
            self.project,
            key.trim_matches('/'),
            mask.join("&")
        )
    }

    async fn try_upsert(&self, record: &IssueRecord) -> Result<()> {
        if record.key.split('/').filter(|s| !s.is_empty()).count() % 2 != 0 {
            return Err(anyhow!("document key must be collection/document pairs: {}", record.key));
        }
        let token = self.auth.bearer(&[DATASTORE_SCOPE]).await?;
        let resp = self
            .http
            .patch(self.document_url(&record.key))
            .bearer_auth(token)
            .json(&document_body(record))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(300).collect();
            return Err(anyhow!("firestore returned HTTP {}: {}", status.as_u16(), snippet));
        }
        Ok(())
    }
}

/// Firestore typed-value document body.
pub fn document_body(record: &IssueRecord) -> Value {
    json!({
        "fields": {
            "content": { "stringValue": record.content },
            "contentSha256": { "stringValue": record.content_sha256 },
            "lastUpdated": { "timestampValue": record.updated_at.to_rfc3339() },
            "updatedBy": { "stringValue": record.updated_by },
        }
    })
}

#[async_trait]
impl Persister for FirestorePersister {
    async fn upsert(&self, record: &IssueRecord) -> PersistOutcome {
        PersistOutcome::from_result(&record.key, self.try_upsert(record).await)
    }

    fn name(&self) -> &str {
        "firestore"
    }
}
