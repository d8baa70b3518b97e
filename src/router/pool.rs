use std::sync::Arc;

use tracing::{debug, warn};

use super::CLASSIFIER_TEMPERATURE;
use crate::error::LlmError;
use crate::llm::{normalize_label, ChatMessage, CompletionRequest, LanguageModel, PromptKind};
use crate::models::{ModelConfig, Pool};

const POOL_PROMPT: &str = "You route questions about a StarlingX distributed cloud to the API family able to answer them.\n\n\
Reply 'kubernetes' when the question is about Kubernetes resources: pods, deployments, services, namespaces, config maps, secrets, persistent volumes, Kubernetes nodes or the Kubernetes version.\n\
Reply 'platform' when the question is about the StarlingX platform itself: hosts, alarms, events, the system, subclouds, software loads, storage, networks, interfaces or certificates.\n\n\
Reply with exactly one word, either kubernetes or platform, and nothing else.";

/// Decides which backend family answers a query.
#[derive(Clone)]
pub struct PoolClassifier {
    llm: Arc<dyn LanguageModel>,
}

impl PoolClassifier {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Classify `query`. Any reply other than one of the two labels is
    /// [`Pool::Undefined`].
    pub async fn classify(&self, query: &str, model: &ModelConfig) -> Result<Pool, LlmError> {
        let reply = self
            .llm
            .complete(CompletionRequest {
                kind: PromptKind::Pool,
                model: model.model.clone(),
                temperature: CLASSIFIER_TEMPERATURE,
                messages: vec![ChatMessage::system(POOL_PROMPT), ChatMessage::user(query)],
            })
            .await?;

        let pool = parse_pool(&reply);
        if pool == Pool::Undefined {
            warn!("Pool classifier reply not understood: {:?}", reply);
        } else {
            debug!(pool = pool.as_str(), "Classified query pool");
        }
        Ok(pool)
    }
}

fn parse_pool(reply: &str) -> Pool {
    match normalize_label(reply).as_str() {
        "kubernetes" => Pool::Kubernetes,
        "platform" => Pool::Platform,
        _ => Pool::Undefined,
    }
}
