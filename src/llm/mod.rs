//! Language-model seam.
//!
//! The router talks to the model through [`LanguageModel`] only, so tests can
//! script replies per [`PromptKind`]. Structured answers come back in a
//! `key: value` line which is parsed by [`parse_labeled`] and treated as
//! untrusted input.

mod openai;

pub use openai::{OpenAiClient, DEFAULT_BASE_URL as OPENAI_DEFAULT_BASE_URL};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{LlmError, ResolutionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Which step of the pipeline a completion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Answer,
    Sufficiency,
    Pool,
    Instance,
    KubernetesEndpoint,
    PlatformEndpoint,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub kind: PromptKind,
    pub model: String,
    pub temperature: f32,
    pub messages: Vec<ChatMessage>,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

/// Extract the value of a `key: value` reply.
///
/// The key itself is not checked: models routinely vary its spelling. What is
/// required is a separator and a non-empty value after it. Only the first
/// separator splits, so values that are URLs keep their port.
pub fn parse_labeled(reply: &str, key: &'static str) -> Result<String, ResolutionError> {
    let line = reply
        .lines()
        .map(str::trim)
        .find(|l| l.contains(':'))
        .ok_or_else(|| ResolutionError::MissingSeparator {
            key,
            reply: reply.to_string(),
        })?;

    let (_, value) = line
        .split_once(':')
        .ok_or_else(|| ResolutionError::MissingSeparator {
            key,
            reply: reply.to_string(),
        })?;

    let value = value.trim().trim_matches(|c| c == '`' || c == '"' || c == '\'');
    if value.is_empty() {
        return Err(ResolutionError::EmptyValue(key));
    }
    Ok(value.to_string())
}

/// Lowercase a one-word label reply and strip punctuation around it.
pub(crate) fn normalize_label(reply: &str) -> String {
    reply
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}
