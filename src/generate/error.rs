// src/generate/error.rs
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generation call timed out after {secs}s")]
    Timeout { secs: u64 },
    #[error("generation transport error: {reason}")]
    Transport { reason: String },
    #[error("generation service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("generation service returned an empty response")]
    EmptyResponse,
    #[error("malformed generation response: {reason}")]
    Malformed { reason: String },
    #[error("run cancelled")]
    Cancelled,
    #[error("missing API key for provider {provider}")]
    MissingApiKey { provider: String },
    #[error("could not obtain an access token: {reason}")]
    Auth { reason: String },
}

pub type Result<T> = std::result::Result<T, GenerationError>;
