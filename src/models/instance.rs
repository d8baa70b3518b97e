use serde::{Deserialize, Serialize};

/// Role of a cluster instance in the distributed cloud.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Central,
    Subcloud,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Central => "central",
            Self::Subcloud => "subcloud",
        }
    }
}

/// How requests to an instance authenticate. Opaque to the router.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Bearer(String),
    Password { username: String, password: String },
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// A reachable cluster: the central controller or one of its subclouds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInstance {
    /// Unique within the registry.
    pub name: String,
    /// Kubernetes API base URL, e.g. `https://10.10.10.2:6443`.
    pub base_url: String,
    pub node_type: NodeType,
    pub credential: Credential,
}

impl ClusterInstance {
    pub fn is_central(&self) -> bool {
        self.node_type == NodeType::Central
    }

    /// Host part of the base URL, used to reach the platform services
    /// that live next to the Kubernetes API.
    pub fn host(&self) -> Option<String> {
        reqwest::Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }
}

/// One entry of the subclouds manifest file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    #[serde(rename = "URL")]
    pub url: String,
    pub k8s_token: String,
}
