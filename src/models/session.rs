use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::retrieval::RetrievalIndex;

/// Model used when the client does not send a `model` header.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Model settings chosen when a session is created.
///
/// Immutable for the lifetime of the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub model: String,
    pub temperature: f32,
}

impl ModelConfig {
    /// Build a config from the raw `model` and `temperature` header values.
    ///
    /// Missing values fall back to [`DEFAULT_MODEL`] and a temperature of 0.
    pub fn from_headers(model: Option<&str>, temperature: Option<&str>) -> Result<Self, String> {
        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MODEL)
            .to_string();

        let temperature = match temperature.map(str::trim) {
            None | Some("") => 0.0,
            Some(raw) => raw
                .parse::<f32>()
                .map_err(|_| format!("temperature must be a number, got {raw:?}"))?,
        };
        if !(0.0..=2.0).contains(&temperature) {
            return Err(format!("temperature must be within 0..=2, got {temperature}"));
        }

        Ok(Self { model, temperature })
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
        }
    }
}

/// One exchange in the conversation memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
}

/// A client conversation with its own memory and retrieval index.
///
/// Sessions live only in process memory. The retrieval index is never
/// shared with another session; it is replaced wholesale on every
/// retrieval round, so cloning a session is cheap.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub model_config: ModelConfig,
    /// Append-only.
    pub memory: Vec<Turn>,
    pub index: Arc<RetrievalIndex>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    pub fn new(model_config: ModelConfig) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            model_config,
            memory: Vec::new(),
            index: Arc::new(RetrievalIndex::empty()),
            created_at: now,
            last_active: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }
}
