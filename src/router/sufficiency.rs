use std::sync::Arc;

use tracing::debug;

use super::CLASSIFIER_TEMPERATURE;
use crate::error::LlmError;
use crate::llm::{normalize_label, ChatMessage, CompletionRequest, LanguageModel, PromptKind};
use crate::models::{ModelConfig, Sufficiency};

const SUFFICIENCY_PROMPT: &str = "You judge whether an answer actually answers a question.\n\n\
Reply 'positive' when the answer provides the requested information.\n\
Reply 'negative' when the answer says it does not know, lacks the information, apologises, or asks for more context.\n\n\
Reply with exactly one word.";

/// Labels a generated answer as sufficient or not.
#[derive(Clone)]
pub struct SufficiencyClassifier {
    llm: Arc<dyn LanguageModel>,
}

impl SufficiencyClassifier {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    pub async fn classify(
        &self,
        query: &str,
        answer: &str,
        model: &ModelConfig,
    ) -> Result<Sufficiency, LlmError> {
        let reply = self
            .llm
            .complete(CompletionRequest {
                kind: PromptKind::Sufficiency,
                model: model.model.clone(),
                temperature: CLASSIFIER_TEMPERATURE,
                messages: vec![
                    ChatMessage::system(SUFFICIENCY_PROMPT),
                    ChatMessage::user(format!("Question: {query}\n\nAnswer: {answer}")),
                ],
            })
            .await?;

        let verdict = parse_verdict(&reply);
        debug!(?verdict, "Classified answer sufficiency");
        Ok(verdict)
    }
}

/// Only an explicit `positive` counts as sufficient.
fn parse_verdict(reply: &str) -> Sufficiency {
    if normalize_label(reply) == "positive" {
        Sufficiency::Sufficient
    } else {
        Sufficiency::Insufficient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_is_sufficient() {
        assert_eq!(parse_verdict("Positive"), Sufficiency::Sufficient);
    }

    #[test]
    fn negative_and_noise_are_insufficient() {
        assert_eq!(parse_verdict("negative"), Sufficiency::Insufficient);
        assert_eq!(parse_verdict("it is hard to say"), Sufficiency::Insufficient);
    }
}
