use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use super::{expect_success, BackendContext, HttpRequest};
use crate::error::{FetchError, ResolutionError};
use crate::llm::{parse_labeled, ChatMessage, CompletionRequest, PromptKind};
use crate::models::{ClusterInstance, Credential, ModelConfig};

/// Platform APIs offered to the model when no catalog file is configured.
pub const BUILTIN_PLATFORM_CATALOG: &str = include_str!("platform_apis.json");

/// Port assumed when the model proposes a bare path (sysinv).
const DEFAULT_PLATFORM_PORT: u16 = 6385;

/// Response header carrying the issued keystone token.
const SUBJECT_TOKEN_HEADER: &str = "x-subject-token";

/// StarlingX platform management APIs of one instance, authenticated with a
/// keystone token obtained through a password grant.
pub struct PlatformAdapter {
    instance: ClusterInstance,
    ctx: BackendContext,
}

impl PlatformAdapter {
    pub fn new(instance: ClusterInstance, ctx: BackendContext) -> Self {
        Self { instance, ctx }
    }

    pub fn instance(&self) -> &ClusterInstance {
        &self.instance
    }

    fn host(&self) -> Result<String, ResolutionError> {
        self.instance
            .host()
            .ok_or_else(|| ResolutionError::InvalidUrl(self.instance.base_url.clone()))
    }

    pub async fn build_endpoint(
        &self,
        query: &str,
        model: &ModelConfig,
    ) -> Result<String, ResolutionError> {
        let host = self.host()?;
        let system = format!(
            "You are an API generator. Based on the user question you will suggest the best API endpoint to retrieve the information from a StarlingX cluster.\n\n\
             The cluster host is {host}. The available APIs are listed in the context; only use an API present in the context.\n\n\
             Only provide the full URL following the format: api: http://{host}:<port><path>. Guarantee that the format is followed."
        );

        let reply = self
            .ctx
            .llm
            .complete(CompletionRequest {
                kind: PromptKind::PlatformEndpoint,
                model: model.model.clone(),
                temperature: model.temperature,
                messages: vec![
                    ChatMessage::system(system),
                    ChatMessage::user(format!(
                        "Context: {}\n\nQuestion: {query}",
                        self.ctx.platform_catalog
                    )),
                ],
            })
            .await?;

        let url = resolve_url(&parse_labeled(&reply, "api")?, &host)?;
        debug!(instance = %self.instance.name, %url, "Resolved platform endpoint");
        Ok(url)
    }

    pub async fn fetch(&self, endpoint: &str) -> Result<String, FetchError> {
        let token = self.acquire_token().await?;
        let request = HttpRequest::get(endpoint)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("X-Auth-Token", token);

        let reply = self
            .ctx
            .transport
            .send(request)
            .await
            .map_err(|reason| FetchError::Transport {
                url: endpoint.to_string(),
                reason,
            })?;
        expect_success(endpoint, reply)
    }

    /// Password grant against keystone. Exactly one attempt; anything but a
    /// 201 with a subject token header is an auth failure.
    async fn acquire_token(&self) -> Result<String, FetchError> {
        let auth = &self.ctx.platform_auth;
        let (username, password) = match &self.instance.credential {
            Credential::Password { username, password } => (username.clone(), password.clone()),
            Credential::Bearer(_) => {
                let password = auth
                    .password
                    .clone()
                    .ok_or_else(|| FetchError::Auth("PLATFORM_PASSWORD is not configured".to_string()))?;
                (auth.username.clone(), password)
            }
        };

        let host = self
            .host()
            .map_err(|e| FetchError::Auth(e.to_string()))?;
        let url = format!("http://{}:{}/v3/auth/tokens", host, auth.keystone_port);
        let body = json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": username,
                            "domain": { "id": auth.domain },
                            "password": password,
                        }
                    }
                },
                "scope": {
                    "project": {
                        "name": auth.project,
                        "domain": { "id": auth.domain },
                    }
                }
            }
        });

        let reply = self
            .ctx
            .transport
            .send(HttpRequest::post_json(&url, body).header("Content-Type", "application/json"))
            .await
            .map_err(|reason| FetchError::Auth(format!("request to {url} failed: {reason}")))?;

        if reply.status != 201 {
            return Err(FetchError::Auth(format!(
                "{url} returned {}: {}",
                reply.status,
                reply.body.chars().take(200).collect::<String>()
            )));
        }
        reply
            .header(SUBJECT_TOKEN_HEADER)
            .map(str::to_string)
            .ok_or_else(|| FetchError::Auth(format!("{url} returned no {SUBJECT_TOKEN_HEADER} header")))
    }
}

/// Read the platform API catalog at `path`, falling back to the built-in
/// catalog when the file is missing or not valid JSON.
pub fn load_catalog(path: Option<&Path>) -> Arc<str> {
    let Some(path) = path else {
        return Arc::from(BUILTIN_PLATFORM_CATALOG);
    };
    match std::fs::read_to_string(path) {
        Ok(raw) if serde_json::from_str::<serde_json::Value>(&raw).is_ok() => Arc::from(raw),
        Ok(_) => {
            warn!("Platform API catalog {} is not valid JSON, using built-in catalog", path.display());
            Arc::from(BUILTIN_PLATFORM_CATALOG)
        }
        Err(e) => {
            warn!("Platform API catalog {} not loaded ({}), using built-in catalog", path.display(), e);
            Arc::from(BUILTIN_PLATFORM_CATALOG)
        }
    }
}

/// Turn a proposed endpoint into a URL on `host`. Accepts a full URL, a
/// `port/path` pair or a bare path; URLs pointing elsewhere are rejected.
fn resolve_url(proposed: &str, host: &str) -> Result<String, ResolutionError> {
    let candidate = if proposed.starts_with("http://") || proposed.starts_with("https://") {
        proposed.to_string()
    } else if proposed.starts_with(|c: char| c.is_ascii_digit()) {
        format!("http://{host}:{proposed}")
    } else if proposed.starts_with('/') {
        format!("http://{host}:{DEFAULT_PLATFORM_PORT}{proposed}")
    } else {
        return Err(ResolutionError::InvalidUrl(proposed.to_string()));
    };

    let url = reqwest::Url::parse(&candidate)
        .map_err(|_| ResolutionError::InvalidUrl(proposed.to_string()))?;
    match url.host_str() {
        Some(h) if h == host => Ok(url.to_string()),
        _ => Err(ResolutionError::ForeignHost(proposed.to_string())),
    }
}
