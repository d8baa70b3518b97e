use std::sync::Arc;

use tracing::{debug, warn};

use super::CLASSIFIER_TEMPERATURE;
use crate::llm::{parse_labeled, ChatMessage, CompletionRequest, LanguageModel, PromptKind};
use crate::models::{ClusterInstance, ModelConfig};
use crate::registry::InstanceRegistry;

/// Picks the cluster instance a query is about.
///
/// Matching is exact equality on the name the model extracts. Everything
/// else, including model failures, resolves to the central instance.
#[derive(Clone)]
pub struct InstanceResolver {
    llm: Arc<dyn LanguageModel>,
}

impl InstanceResolver {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    pub async fn resolve<'r>(
        &self,
        query: &str,
        registry: &'r InstanceRegistry,
        model: &ModelConfig,
    ) -> &'r ClusterInstance {
        let central = registry.central();
        if registry.len() == 1 {
            return central;
        }

        let reply = match self
            .llm
            .complete(CompletionRequest {
                kind: PromptKind::Instance,
                model: model.model.clone(),
                temperature: CLASSIFIER_TEMPERATURE,
                messages: vec![
                    ChatMessage::system(instance_prompt(registry)),
                    ChatMessage::user(query),
                ],
            })
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Instance resolution failed, using {}: {}", central.name, e);
                return central;
            }
        };

        let instance = match parse_labeled(&reply, "instance") {
            Ok(name) => registry.find(&name).unwrap_or(central),
            Err(e) => {
                debug!("Instance reply not usable: {}", e);
                central
            }
        };
        debug!(instance = %instance.name, "Resolved target instance");
        instance
    }
}

/// Instance list given to the model. Credentials are never included.
fn instance_prompt(registry: &InstanceRegistry) -> String {
    let listing = registry
        .list_instances()
        .iter()
        .map(|i| format!("- {} ({})", i.name, i.node_type.as_str()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You identify which cluster of a distributed cloud a question is about.\n\n\
         Available instances:\n{listing}\n\n\
         If the question names one of these instances, reply 'instance: <name>' using the name exactly as listed.\n\
         If it names none of them, reply 'instance: none'.\n\
         Reply with that single line only."
    )
}
