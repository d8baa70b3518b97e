//! Runtime configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::llm::{OpenAiClient, OPENAI_DEFAULT_BASE_URL};

pub const DEFAULT_CENTRAL_NAME: &str = "systemcontroller";
pub const DEFAULT_MANIFEST_PATH: &str = "subclouds.json";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// Selects [`crate::retrieval::HashingEmbedder`] instead of the remote API.
pub const HASHING_EMBEDDING_MODEL: &str = "hashing";

/// Credentials for the platform (keystone) password grant.
#[derive(Clone)]
pub struct PlatformAuthConfig {
    pub username: String,
    pub password: Option<String>,
    pub project: String,
    pub domain: String,
    pub keystone_port: u16,
}

impl std::fmt::Debug for PlatformAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformAuthConfig")
            .field("username", &self.username)
            .field("project", &self.project)
            .field("domain", &self.domain)
            .field("keystone_port", &self.keystone_port)
            .finish_non_exhaustive()
    }
}

impl Default for PlatformAuthConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: None,
            project: "admin".to_string(),
            domain: "default".to_string(),
            keystone_port: 5000,
        }
    }
}

/// TLS policy for Kubernetes API requests.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Extra PEM certificate to trust (the cluster CA).
    pub ca_cert: Option<PathBuf>,
    /// Skip certificate verification. Must be opted into explicitly.
    pub insecure: bool,
}

/// Where the cluster instances come from: the central controller and the
/// subclouds manifest.
#[derive(Clone)]
pub struct ClusterConfig {
    pub central_name: String,
    pub central_url: String,
    pub central_token: String,
    pub manifest_path: PathBuf,
}

impl std::fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("central_name", &self.central_name)
            .field("central_url", &self.central_url)
            .field("manifest_path", &self.manifest_path)
            .finish_non_exhaustive()
    }
}

impl ClusterConfig {
    /// Load only the cluster variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::MissingVar(name));

        let central_url = require("CENTRAL_K8S_URL")?;
        let central_token = require("CENTRAL_K8S_TOKEN")?;
        reqwest::Url::parse(&central_url).map_err(|e| ConfigError::InvalidVar {
            name: "CENTRAL_K8S_URL",
            reason: e.to_string(),
        })?;

        Ok(Self {
            central_name: get("CENTRAL_NAME").unwrap_or_else(|| DEFAULT_CENTRAL_NAME.to_string()),
            central_url,
            central_token,
            manifest_path: get("SUBCLOUDS_MANIFEST")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST_PATH)),
        })
    }
}

#[derive(Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub embedding_model: String,
    pub cluster: ClusterConfig,
    pub platform: PlatformAuthConfig,
    /// Platform API catalog file; the built-in catalog is used when unset.
    pub platform_catalog: Option<PathBuf>,
    pub tls: TlsConfig,
    pub request_timeout: Duration,
    pub session_idle_ttl: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("openai_base_url", &self.openai_base_url)
            .field("embedding_model", &self.embedding_model)
            .field("cluster", &self.cluster)
            .field("platform", &self.platform)
            .field("platform_catalog", &self.platform_catalog)
            .field("tls", &self.tls)
            .field("request_timeout", &self.request_timeout)
            .field("session_idle_ttl", &self.session_idle_ttl)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::MissingVar(name));

        let openai_api_key = require("OPENAI_API_KEY")?;
        let cluster = ClusterConfig::from_lookup(&lookup)?;

        let defaults = PlatformAuthConfig::default();
        let platform = PlatformAuthConfig {
            username: get("PLATFORM_USERNAME").unwrap_or(defaults.username),
            password: get("PLATFORM_PASSWORD"),
            project: get("PLATFORM_PROJECT").unwrap_or(defaults.project),
            domain: get("PLATFORM_DOMAIN").unwrap_or(defaults.domain),
            keystone_port: parse_var(&get, "PLATFORM_KEYSTONE_PORT")?
                .unwrap_or(defaults.keystone_port),
        };

        let tls = TlsConfig {
            ca_cert: get("K8S_CA_CERT").map(PathBuf::from),
            insecure: parse_flag(&get, "K8S_INSECURE_TLS")?,
        };

        Ok(Self {
            openai_api_key,
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| OPENAI_DEFAULT_BASE_URL.to_string()),
            embedding_model: get("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            cluster,
            platform,
            platform_catalog: get("PLATFORM_API_CATALOG").map(PathBuf::from),
            tls,
            request_timeout: Duration::from_secs(
                parse_var(&get, "REQUEST_TIMEOUT_SECS")?.unwrap_or(30),
            ),
            session_idle_ttl: Duration::from_secs(
                parse_var(&get, "SESSION_IDLE_TTL_SECS")?.unwrap_or(3600),
            ),
        })
    }

    pub fn uses_hashing_embedder(&self) -> bool {
        self.embedding_model == HASHING_EMBEDDING_MODEL
    }

    pub fn openai_client(&self) -> Result<OpenAiClient, ConfigError> {
        Ok(OpenAiClient::new(
            &self.openai_base_url,
            &self.openai_api_key,
            &self.embedding_model,
            self.request_timeout,
        )?)
    }
}

fn parse_var<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    get(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidVar {
                name,
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn parse_flag(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<bool, ConfigError> {
    match get(name).map(|v| v.trim().to_lowercase()).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes") => Ok(true),
        Some("0" | "false" | "no") => Ok(false),
        Some(other) => Err(ConfigError::InvalidVar {
            name,
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("OPENAI_API_KEY", "sk-test"),
        ("CENTRAL_K8S_URL", "https://10.10.10.2:6443"),
        ("CENTRAL_K8S_TOKEN", "token"),
    ];

    #[test]
    fn loads_defaults_from_required_vars() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.cluster.central_name, DEFAULT_CENTRAL_NAME);
        assert_eq!(config.cluster.manifest_path, PathBuf::from(DEFAULT_MANIFEST_PATH));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(!config.tls.insecure);
        assert_eq!(config.platform.keystone_port, 5000);
    }

    #[test]
    fn missing_central_token_is_fatal() {
        let err = Config::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("CENTRAL_K8S_TOKEN")));
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let mut vars = REQUIRED.to_vec();
        vars[0] = ("OPENAI_API_KEY", "  ");
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("OPENAI_API_KEY")));
    }

    #[test]
    fn cluster_config_does_not_need_model_credentials() {
        let cluster = ClusterConfig::from_lookup(lookup(&REQUIRED[1..])).unwrap();
        assert_eq!(cluster.central_url, "https://10.10.10.2:6443");
        assert_eq!(cluster.central_name, DEFAULT_CENTRAL_NAME);

        let err = Config::from_lookup(lookup(&REQUIRED[1..])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("OPENAI_API_KEY")));
    }

    #[test]
    fn insecure_tls_requires_explicit_flag() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("K8S_INSECURE_TLS", "true"));
        assert!(Config::from_lookup(lookup(&vars)).unwrap().tls.insecure);

        vars.pop();
        vars.push(("K8S_INSECURE_TLS", "maybe"));
        assert!(Config::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn rejects_non_numeric_timeout() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("REQUEST_TIMEOUT_SECS", "soon"));
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidVar {
                name: "REQUEST_TIMEOUT_SECS",
                ..
            }
        ));
    }
}
