#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use stx_chat::backend::{BackendContext, HttpReply, HttpRequest, Transport, BUILTIN_PLATFORM_CATALOG};
use stx_chat::config::PlatformAuthConfig;
use stx_chat::error::LlmError;
use stx_chat::llm::{CompletionRequest, LanguageModel, PromptKind};
use stx_chat::registry::InstanceRegistry;
use stx_chat::retrieval::HashingEmbedder;
use stx_chat::session::{SessionController, SessionStore};

pub const CENTRAL_URL: &str = "https://10.10.10.2:6443";
pub const CENTRAL_TOKEN: &str = "central-token";

/// Language model returning canned replies per prompt kind.
///
/// Queued replies are used first, then the per-kind default.
#[derive(Default)]
pub struct ScriptedModel {
    queued: Mutex<HashMap<PromptKind, VecDeque<String>>>,
    defaults: Mutex<HashMap<PromptKind, String>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, kind: PromptKind, text: &str) -> Self {
        self.defaults.lock().unwrap().insert(kind, text.to_string());
        self
    }

    pub fn then(self, kind: PromptKind, text: &str) -> Self {
        self.queued
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(text.to_string());
        self
    }

    pub fn calls(&self, kind: PromptKind) -> usize {
        self.requests(kind).len()
    }

    pub fn requests(&self, kind: PromptKind) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let kind = request.kind;
        self.requests.lock().unwrap().push(request);

        if let Some(reply) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&kind)
            .and_then(VecDeque::pop_front)
        {
            return Ok(reply);
        }
        self.defaults
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .ok_or_else(|| LlmError::Api {
                status: 500,
                body: format!("no scripted reply for {kind:?}"),
            })
    }
}

type Responder = Box<dyn Fn(&HttpRequest) -> Result<HttpReply, String> + Send + Sync>;

/// Transport answering every request through a closure and counting calls.
pub struct StubTransport {
    responder: Responder,
    calls: AtomicUsize,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Option<Duration>,
}

impl StubTransport {
    pub fn new(
        responder: impl Fn(&HttpRequest) -> Result<HttpReply, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Hold every request in flight for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every request gets `status` with `body`.
    pub fn fixed(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::new(move |_| Ok(reply(status, &body)))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpReply, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = (self.responder)(&request);
        self.requests.lock().unwrap().push(request);
        result
    }
}

pub fn reply(status: u16, body: &str) -> HttpReply {
    HttpReply {
        status,
        headers: HashMap::new(),
        body: body.to_string(),
    }
}

pub fn central_registry() -> InstanceRegistry {
    InstanceRegistry::with_central("systemcontroller", CENTRAL_URL, CENTRAL_TOKEN)
}

pub fn backend_context(llm: Arc<ScriptedModel>, transport: Arc<StubTransport>) -> BackendContext {
    BackendContext {
        transport,
        llm,
        platform_auth: PlatformAuthConfig {
            password: Some("secret".to_string()),
            ..PlatformAuthConfig::default()
        },
        platform_catalog: Arc::from(BUILTIN_PLATFORM_CATALOG),
    }
}

pub fn controller(
    llm: Arc<ScriptedModel>,
    transport: Arc<StubTransport>,
    registry: InstanceRegistry,
) -> SessionController {
    SessionController::new(
        SessionStore::new(),
        Arc::new(registry),
        Arc::new(HashingEmbedder::default()),
        backend_context(llm, transport),
    )
}

/// Pod list with one system pod and one tenant pod.
pub fn pod_list() -> String {
    json!({
        "kind": "PodList",
        "apiVersion": "v1",
        "items": [
            { "metadata": { "name": "coredns-5d78c9869d-abcde", "namespace": "kube-system" } },
            { "metadata": { "name": "web-0", "namespace": "team-a" } }
        ]
    })
    .to_string()
}
