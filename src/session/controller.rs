use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::SessionStore;
use crate::backend::{BackendAdapter, BackendContext};
use crate::error::{FetchError, LlmError, ResolutionError, RouterError};
use crate::llm::{ChatMessage, CompletionRequest, LanguageModel, PromptKind};
use crate::models::{FeedReport, ModelConfig, Pool, QueryOutcome, Session, Sufficiency, Turn};
use crate::registry::InstanceRegistry;
use crate::retrieval::{Embedder, RetrievalIndex};
use crate::router::{InstanceResolver, PoolClassifier, SufficiencyClassifier};

/// Appended to the first attempt at answering a query.
pub const SAFETY_INSTRUCTION: &str = ". If an API response is provided as context and the provided API response doesn't have this information, or no context is provided, make sure that your response is 'I don't know'.";

/// Indexed in place of responses that carry no usable information.
pub const CLIENT_ERROR_MESSAGE: &str =
    "The cluster could not answer this request. Please try again with another prompt.";

/// Indexed when the model cannot name an endpoint for the query.
pub const NO_MATCHING_API_MESSAGE: &str = "No StarlingX/Kubernetes API capable of answering your question was found! Please try again with another prompt.";

const GENERATOR_PROMPT: &str = "You are a chatbot that provides information about a StarlingX distributed cloud. \
Answer succinctly, in the language of the question, using the conversation so far and the API response given as context. \
Do not make up information that is not in the context.";

/// Orchestrates one conversation turn: answer from retrieved context, judge
/// the answer, and when it falls short fetch fresh API data and answer again.
///
/// No session lock is held across a model or network call. A session's
/// state is read as a snapshot, the slow work runs unlocked, and results are
/// written back in one short critical section.
pub struct SessionController {
    store: SessionStore,
    registry: Arc<InstanceRegistry>,
    llm: Arc<dyn LanguageModel>,
    embedder: Arc<dyn Embedder>,
    backends: BackendContext,
    pools: PoolClassifier,
    resolver: InstanceResolver,
    sufficiency: SufficiencyClassifier,
}

impl SessionController {
    pub fn new(
        store: SessionStore,
        registry: Arc<InstanceRegistry>,
        embedder: Arc<dyn Embedder>,
        backends: BackendContext,
    ) -> Self {
        let llm = backends.llm.clone();
        Self {
            store,
            registry,
            pools: PoolClassifier::new(llm.clone()),
            resolver: InstanceResolver::new(llm.clone()),
            sufficiency: SufficiencyClassifier::new(llm.clone()),
            llm,
            embedder,
            backends,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub fn new_session(&self, model_config: ModelConfig) -> Uuid {
        let session = self.store.create(model_config);
        info!(session = %session.id, model = %session.model_config.model, "Created session");
        session.id
    }

    pub fn get_session(&self, id: Uuid) -> Option<Session> {
        self.store.get(id)
    }

    /// Answer `query` within session `id`, fetching live data at most once.
    pub async fn ask(&self, id: Uuid, query: &str) -> Result<QueryOutcome, RouterError> {
        let model = self.model_config(id)?;

        let first = self.generate(id, query, true).await?;
        let sufficiency = self.sufficiency.classify(query, &first, &model).await?;
        if sufficiency == Sufficiency::Sufficient {
            return Ok(QueryOutcome {
                answer: first,
                sufficiency,
                source_instance: None,
            });
        }

        debug!(session = %id, "Answer insufficient, retrieving live data");
        let report = self.feed(id, query).await?;
        let answer = self.generate(id, query, false).await?;
        Ok(QueryOutcome {
            answer,
            sufficiency,
            source_instance: report.instance.filter(|_| report.fetched),
        })
    }

    /// Fetch data for `query` and make it the session's only retrievable
    /// context. Backend and resolution failures are indexed as text.
    pub async fn feed(&self, id: Uuid, query: &str) -> Result<FeedReport, RouterError> {
        let model = self.model_config(id)?;

        let pool = match self.pools.classify(query, &model).await {
            Ok(pool) => pool,
            Err(e) => {
                warn!("Pool classification failed: {}", e);
                Pool::Undefined
            }
        };

        let (context, instance, fetched) = match pool {
            Pool::Undefined => (CLIENT_ERROR_MESSAGE.to_string(), None, false),
            Pool::Kubernetes | Pool::Platform => {
                let instance = self
                    .resolver
                    .resolve(query, &self.registry, &model)
                    .await
                    .clone();
                let name = instance.name.clone();
                match BackendAdapter::for_pool(pool, instance, &self.backends) {
                    Some(adapter) => match adapter.retrieve(query, &model).await {
                        Ok(text) => (text, Some(name), true),
                        Err(e) => (failure_context(&e), Some(name), false),
                    },
                    None => (CLIENT_ERROR_MESSAGE.to_string(), None, false),
                }
            }
        };

        let index = RetrievalIndex::build(&context, self.embedder.as_ref()).await?;
        let chunks = index.len();
        self.store
            .with_lock(id, |s| {
                s.index = Arc::new(index);
                s.touch();
            })
            .ok_or(RouterError::SessionNotFound(id))?;

        info!(
            session = %id,
            pool = pool.as_str(),
            instance = instance.as_deref().unwrap_or("-"),
            fetched,
            chunks,
            "Rebuilt retrieval index"
        );
        Ok(FeedReport {
            pool,
            instance,
            fetched,
            chunks,
        })
    }

    fn model_config(&self, id: Uuid) -> Result<ModelConfig, RouterError> {
        self.store
            .with_lock(id, |s| {
                s.touch();
                s.model_config.clone()
            })
            .ok_or(RouterError::SessionNotFound(id))
    }

    /// One generator call: nearest chunk plus memory as context. The turn is
    /// appended to the session memory with the question as the user asked it.
    async fn generate(&self, id: Uuid, query: &str, with_safety: bool) -> Result<String, RouterError> {
        let (model, memory, index) = self
            .store
            .with_lock(id, |s| (s.model_config.clone(), s.memory.clone(), s.index.clone()))
            .ok_or(RouterError::SessionNotFound(id))?;

        let context = self.nearest_chunk(&index, query).await?;
        let mut messages = vec![ChatMessage::system(format!(
            "{GENERATOR_PROMPT}\n\nContext:\n{}",
            context.as_deref().unwrap_or("(no context)")
        ))];
        for turn in &memory {
            messages.push(ChatMessage::user(&turn.user));
            messages.push(ChatMessage::assistant(&turn.assistant));
        }
        let question = if with_safety {
            format!("{query}{SAFETY_INSTRUCTION}")
        } else {
            query.to_string()
        };
        messages.push(ChatMessage::user(question));

        let answer = self
            .llm
            .complete(CompletionRequest {
                kind: PromptKind::Answer,
                model: model.model,
                temperature: model.temperature,
                messages,
            })
            .await?;

        self.store
            .with_lock(id, |s| {
                s.memory.push(Turn {
                    user: query.to_string(),
                    assistant: answer.clone(),
                });
                s.touch();
            })
            .ok_or(RouterError::SessionNotFound(id))?;
        Ok(answer)
    }

    async fn nearest_chunk(
        &self,
        index: &RetrievalIndex,
        query: &str,
    ) -> Result<Option<String>, LlmError> {
        if index.is_empty() {
            return Ok(None);
        }
        let embedded = self.embedder.embed(&[query.to_string()]).await?;
        Ok(embedded
            .first()
            .and_then(|q| index.nearest(q))
            .map(str::to_string))
    }
}

/// Replace generic server-error text with the fixed client message. Only
/// applied to failure text, never to a successful payload.
fn scrub(text: String) -> String {
    if text.to_lowercase().contains("internal server error") {
        CLIENT_ERROR_MESSAGE.to_string()
    } else {
        text
    }
}

/// Text indexed for a failed retrieval.
fn failure_context(error: &FetchError) -> String {
    match error {
        FetchError::Unresolvable(ResolutionError::Llm(_)) => CLIENT_ERROR_MESSAGE.to_string(),
        FetchError::Unresolvable(_) => NO_MATCHING_API_MESSAGE.to_string(),
        FetchError::Upstream { status, .. } if *status >= 500 => CLIENT_ERROR_MESSAGE.to_string(),
        other => scrub(format!("Error trying to make API request: {other}")),
    }
}
