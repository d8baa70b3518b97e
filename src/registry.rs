//! Static list of reachable cluster instances.
//!
//! Built once at startup: the central controller from configuration, then
//! the subclouds listed in the manifest file. A broken manifest never stops
//! the process; the registry simply holds the central instance alone.

use std::collections::HashSet;
use std::path::Path;

use tracing::{info, warn};

use crate::config::ClusterConfig;
use crate::models::{ClusterInstance, Credential, ManifestEntry, NodeType};

#[derive(Debug, Clone)]
pub struct InstanceRegistry {
    /// Central instance first, then subclouds in manifest order.
    instances: Vec<ClusterInstance>,
}

impl InstanceRegistry {
    /// Registry holding only the given central instance.
    pub fn with_central(name: impl Into<String>, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            instances: vec![ClusterInstance {
                name: name.into(),
                base_url: base_url.into(),
                node_type: NodeType::Central,
                credential: Credential::Bearer(token.into()),
            }],
        }
    }

    pub fn from_config(config: &ClusterConfig) -> Self {
        let mut registry = Self::with_central(
            &config.central_name,
            &config.central_url,
            &config.central_token,
        );
        registry.load_manifest(&config.manifest_path);
        registry
    }

    /// Append the subclouds listed in `path`. Failures are logged and leave
    /// the registry unchanged.
    pub fn load_manifest(&mut self, path: &Path) -> usize {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Subclouds manifest {} not loaded: {}", path.display(), e);
                return 0;
            }
        };

        let entries: Vec<ManifestEntry> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Subclouds manifest {} is malformed: {}", path.display(), e);
                return 0;
            }
        };

        let added = entries
            .into_iter()
            .map(|entry| self.add_subcloud(entry))
            .filter(|added| *added)
            .count();
        info!("Loaded {} subcloud(s) from {}", added, path.display());
        added
    }

    /// Add one subcloud. Entries with a duplicate name, an unparseable URL
    /// or an empty token are skipped.
    pub fn add_subcloud(&mut self, entry: ManifestEntry) -> bool {
        let names: HashSet<&str> = self.instances.iter().map(|i| i.name.as_str()).collect();
        if entry.name.trim().is_empty() || names.contains(entry.name.as_str()) {
            warn!("Skipping subcloud with empty or duplicate name {:?}", entry.name);
            return false;
        }
        if reqwest::Url::parse(&entry.url).is_err() {
            warn!("Skipping subcloud {}: invalid URL {:?}", entry.name, entry.url);
            return false;
        }
        if entry.k8s_token.trim().is_empty() {
            warn!("Skipping subcloud {}: empty token", entry.name);
            return false;
        }

        self.instances.push(ClusterInstance {
            name: entry.name,
            base_url: entry.url,
            node_type: NodeType::Subcloud,
            credential: Credential::Bearer(entry.k8s_token),
        });
        true
    }

    pub fn list_instances(&self) -> &[ClusterInstance] {
        &self.instances
    }

    pub fn central(&self) -> &ClusterInstance {
        // The constructor always places the central instance first and
        // nothing removes it.
        &self.instances[0]
    }

    pub fn find(&self, name: &str) -> Option<&ClusterInstance> {
        self.instances.iter().find(|i| i.name == name)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
