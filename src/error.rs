//! Error taxonomy for the query router.
//!
//! Only [`ConfigError`] is ever fatal. Backend failures ([`FetchError`]) and
//! unusable model replies ([`ResolutionError`]) are converted into context
//! text by the session controller, so they never reach the HTTP layer.

use thiserror::Error;
use uuid::Uuid;

/// Missing or malformed startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {name}: {reason}")]
    InvalidVar { name: &'static str, reason: String },

    #[error("failed to read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Failures talking to the language model or embedding service.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("request timed out")]
    Timeout,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Parse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// The model could not name a usable endpoint, pool or instance.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("model reply has no '{key}:' field: {reply:?}")]
    MissingSeparator { key: &'static str, reply: String },

    #[error("model reply has an empty '{0}' value")]
    EmptyValue(&'static str),

    #[error("model proposed an invalid URL {0:?}")]
    InvalidUrl(String),

    #[error("model proposed URL on foreign host {0:?}")]
    ForeignHost(String),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Why a backend fetch did not produce data.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("request to {url} returned {status}: {body}")]
    Upstream {
        url: String,
        status: u16,
        body: String,
    },

    #[error("platform authentication failed: {0}")]
    Auth(String),

    #[error(transparent)]
    Unresolvable(#[from] ResolutionError),
}

impl FetchError {
    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Upstream { .. } => "upstream",
            Self::Auth(_) => "auth",
            Self::Unresolvable(_) => "unresolvable",
        }
    }
}

/// Errors surfaced by the session controller to its callers.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    #[error("language model failed: {0}")]
    Llm(#[from] LlmError),
}
