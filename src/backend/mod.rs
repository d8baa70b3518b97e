//! Backend adapters for the cluster management APIs.
//!
//! A [`BackendAdapter`] binds one cluster instance to one API family and
//! knows how to turn a question into an endpoint, fetch it and clean the
//! response. All network I/O goes through the [`Transport`] seam.

mod kubernetes;
mod platform;
mod transport;

pub use kubernetes::{KubernetesAdapter, EXCLUDED_NAMESPACES, VERSION_ENDPOINT};
pub use platform::{load_catalog, PlatformAdapter, BUILTIN_PLATFORM_CATALOG};
pub use transport::ReqwestTransport;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::config::PlatformAuthConfig;
use crate::error::{FetchError, ResolutionError};
use crate::llm::LanguageModel;
use crate::models::{ClusterInstance, ModelConfig, Pool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct HttpReply {
    pub status: u16,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// Sends one HTTP request. `Err` carries a transport failure description
/// (connection, TLS, timeout); any HTTP status is an `Ok` reply.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpReply, String>;
}

/// Collaborators shared by every adapter.
#[derive(Clone)]
pub struct BackendContext {
    pub transport: Arc<dyn Transport>,
    pub llm: Arc<dyn LanguageModel>,
    pub platform_auth: PlatformAuthConfig,
    /// JSON description of the platform APIs offered to the model.
    pub platform_catalog: Arc<str>,
}

/// An API family bound to one cluster instance.
pub enum BackendAdapter {
    Kubernetes(KubernetesAdapter),
    Platform(PlatformAdapter),
}

impl BackendAdapter {
    /// Adapter for a classified pool; `None` for [`Pool::Undefined`].
    pub fn for_pool(pool: Pool, instance: ClusterInstance, ctx: &BackendContext) -> Option<Self> {
        match pool {
            Pool::Kubernetes => Some(Self::Kubernetes(KubernetesAdapter::new(instance, ctx.clone()))),
            Pool::Platform => Some(Self::Platform(PlatformAdapter::new(instance, ctx.clone()))),
            Pool::Undefined => None,
        }
    }

    pub fn instance(&self) -> &ClusterInstance {
        match self {
            Self::Kubernetes(a) => a.instance(),
            Self::Platform(a) => a.instance(),
        }
    }

    pub async fn build_endpoint(
        &self,
        query: &str,
        model: &ModelConfig,
    ) -> Result<String, ResolutionError> {
        match self {
            Self::Kubernetes(a) => a.build_endpoint(query, model).await,
            Self::Platform(a) => a.build_endpoint(query, model).await,
        }
    }

    /// Raw response body of a successful call.
    pub async fn fetch(&self, endpoint: &str) -> Result<String, FetchError> {
        let result = match self {
            Self::Kubernetes(a) => a.fetch(endpoint).await,
            Self::Platform(a) => a.fetch(endpoint).await,
        };
        if let Err(e) = &result {
            warn!(kind = e.kind(), instance = %self.instance().name, "Backend fetch failed: {}", e);
        }
        result
    }

    pub fn filter_response(&self, raw: &str) -> String {
        match self {
            Self::Kubernetes(a) => a.filter_response(raw),
            Self::Platform(_) => raw.to_string(),
        }
    }

    /// Resolve, fetch and filter: the text to index for `query`.
    pub async fn retrieve(&self, query: &str, model: &ModelConfig) -> Result<String, FetchError> {
        let endpoint = match self.build_endpoint(query, model).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!(instance = %self.instance().name, "No usable endpoint for query: {}", e);
                return Err(e.into());
            }
        };
        let raw = self.fetch(&endpoint).await?;
        let cleaned = self.filter_response(&raw);
        Ok(match self {
            Self::Kubernetes(_) => format!("API {endpoint} response = {cleaned}"),
            Self::Platform(_) => format!("Platform API response = {cleaned}"),
        })
    }
}

/// Map a reply to `Ok(body)` or an upstream error.
pub(crate) fn expect_success(url: &str, reply: HttpReply) -> Result<String, FetchError> {
    if reply.is_success() {
        Ok(reply.body)
    } else {
        Err(FetchError::Upstream {
            url: url.to_string(),
            status: reply.status,
            body: reply.body.chars().take(500).collect(),
        })
    }
}
