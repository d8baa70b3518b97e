use serde_json::Value;
use tracing::debug;

use super::{expect_success, BackendContext, HttpRequest};
use crate::error::{FetchError, ResolutionError};
use crate::llm::{parse_labeled, ChatMessage, CompletionRequest, PromptKind};
use crate::models::{ClusterInstance, Credential, ModelConfig};

/// Namespaces whose objects are dropped from list responses.
pub const EXCLUDED_NAMESPACES: [&str; 4] = ["armada", "cert-manager", "flux-helm", "kube-system"];

/// Endpoint used whenever the model proposes anything version-related.
pub const VERSION_ENDPOINT: &str = "/version";

const ENDPOINT_PROMPT: &str = "You are an API generator. Based on the user input you will suggest the best API endpoint to retrieve the information from a Kubernetes cluster.\n\n\
You will only provide the API path that comes after the IP:PORT.\n\n\
Make sure the provided endpoint is a valid one.\n\n\
Only provide the API endpoint following the format: api: <api_path>. Guarantee that the format is followed.";

/// Kubernetes REST API of one instance, authenticated with a bearer token.
pub struct KubernetesAdapter {
    instance: ClusterInstance,
    ctx: BackendContext,
}

impl KubernetesAdapter {
    pub fn new(instance: ClusterInstance, ctx: BackendContext) -> Self {
        Self { instance, ctx }
    }

    pub fn instance(&self) -> &ClusterInstance {
        &self.instance
    }

    pub async fn build_endpoint(
        &self,
        query: &str,
        model: &ModelConfig,
    ) -> Result<String, ResolutionError> {
        let reply = self
            .ctx
            .llm
            .complete(CompletionRequest {
                kind: PromptKind::KubernetesEndpoint,
                model: model.model.clone(),
                temperature: model.temperature,
                messages: vec![ChatMessage::system(ENDPOINT_PROMPT), ChatMessage::user(query)],
            })
            .await?;

        let path = guard_path(&parse_labeled(&reply, "api")?)?;
        let url = format!("{}{}", self.instance.base_url.trim_end_matches('/'), path);
        debug!(instance = %self.instance.name, %url, "Resolved Kubernetes endpoint");
        Ok(url)
    }

    pub async fn fetch(&self, endpoint: &str) -> Result<String, FetchError> {
        let mut request = HttpRequest::get(endpoint).header("Accept", "application/json");
        if let Credential::Bearer(token) = &self.instance.credential {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

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

    /// Drop objects in excluded namespaces from a `{"items": [...]}` list and
    /// serialize the remaining items. Any other shape is returned unchanged.
    pub fn filter_response(&self, raw: &str) -> String {
        filter_items(raw)
    }
}

/// Normalize a model-proposed endpoint into an absolute path on the
/// instance. Full URLs are reduced to their path so requests always go to
/// the bound instance.
fn guard_path(proposed: &str) -> Result<String, ResolutionError> {
    if proposed.contains("version") {
        return Ok(VERSION_ENDPOINT.to_string());
    }

    let path = if proposed.starts_with("http://") || proposed.starts_with("https://") {
        let url = reqwest::Url::parse(proposed)
            .map_err(|_| ResolutionError::InvalidUrl(proposed.to_string()))?;
        match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        }
    } else {
        format!("/{}", proposed.trim_start_matches('/'))
    };

    if path.chars().any(char::is_whitespace) {
        return Err(ResolutionError::InvalidUrl(proposed.to_string()));
    }
    Ok(path)
}

fn filter_items(raw: &str) -> String {
    let Ok(mut value) = serde_json::from_str::<Value>(raw) else {
        return raw.to_string();
    };
    let Some(items) = value.get_mut("items").and_then(Value::as_array_mut) else {
        return raw.to_string();
    };

    items.retain(|item| {
        let namespace = item
            .get("metadata")
            .and_then(|m| m.get("namespace"))
            .and_then(Value::as_str);
        !matches!(namespace, Some(ns) if EXCLUDED_NAMESPACES.contains(&ns))
    });

    Value::Array(std::mem::take(items)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn version_proposals_are_clamped() {
        assert_eq!(guard_path("/apis/version/v1").unwrap(), "/version");
        assert_eq!(guard_path("https://1.2.3.4:6443/version?x=1").unwrap(), "/version");
    }

    #[test]
    fn relative_paths_get_a_leading_slash() {
        assert_eq!(guard_path("api/v1/pods").unwrap(), "/api/v1/pods");
        assert_eq!(guard_path("/api/v1/nodes").unwrap(), "/api/v1/nodes");
    }

    #[test]
    fn full_urls_are_reduced_to_path() {
        assert_eq!(
            guard_path("https://evil.example:6443/api/v1/secrets?limit=5").unwrap(),
            "/api/v1/secrets?limit=5"
        );
    }

    #[test]
    fn paths_with_spaces_are_rejected() {
        assert!(guard_path("list all the pods").is_err());
    }

    #[test]
    fn filters_excluded_namespaces() {
        let raw = json!({
            "kind": "PodList",
            "items": [
                { "metadata": { "name": "coredns", "namespace": "kube-system" } },
                { "metadata": { "name": "web-0", "namespace": "team-a" } },
                { "metadata": { "name": "cm", "namespace": "cert-manager" } },
            ]
        })
        .to_string();

        let filtered: Value = serde_json::from_str(&filter_items(&raw)).unwrap();
        let names: Vec<&str> = filtered
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["metadata"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["web-0"]);
    }

    #[test]
    fn keeps_cluster_scoped_items() {
        let raw = json!({ "items": [{ "metadata": { "name": "controller-0" } }] }).to_string();
        assert!(filter_items(&raw).contains("controller-0"));
    }

    #[test]
    fn unexpected_shapes_pass_through() {
        let raw = json!({ "major": "1", "minor": "29" }).to_string();
        assert_eq!(filter_items(&raw), raw);
        assert_eq!(filter_items("not json"), "not json");
    }
}
