use serde::{Deserialize, Serialize};

/// Verdict of the sufficiency classifier on a generated answer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Sufficiency {
    Sufficient,
    Insufficient,
}

/// API family able to answer a query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Pool {
    Kubernetes,
    Platform,
    Undefined,
}

impl Pool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kubernetes => "kubernetes",
            Self::Platform => "platform",
            Self::Undefined => "undefined",
        }
    }
}

/// Result of one `ask` call. Not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub answer: String,
    /// Verdict on the first answer, before any retrieval round.
    pub sufficiency: Sufficiency,
    /// Instance whose API was queried, when a retrieval round happened.
    pub source_instance: Option<String>,
}

/// What a `feed` round indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedReport {
    pub pool: Pool,
    pub instance: Option<String>,
    /// Whether real API data was indexed, as opposed to an error message.
    pub fetched: bool,
    pub chunks: usize,
}

/// JSON body of `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatInput {
    pub message: String,
    pub session_id: String,
}
