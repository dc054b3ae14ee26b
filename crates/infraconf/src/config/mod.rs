//! the configuration model
//!
//! [Config] is the in-memory tree every other part of the crate works on. The loader creates it,
//! the resolver rewrites its string fields in place and the validator reads it.
//! [SharedConfig] wraps it in a reader/writer lock for concurrent access.
mod access;
mod merge;
pub mod model;
pub(crate) mod named;

pub use model::*;

use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project: String,
    pub region: String,
    pub zone: String,
    pub environment: String,
    pub terraform_version: String,
    pub terragrunt_version: String,
    pub terraform: TerraformConfig,
    pub terragrunt: TerragruntConfig,
    pub backend: BackendConfig,
    #[serde(alias = "provider")]
    pub providers: IndexMap<String, Provider>,
    #[serde(alias = "module", deserialize_with = "named::list")]
    pub modules: Vec<ModuleConfig>,
    pub variables: IndexMap<String, Value>,
    #[serde(alias = "output")]
    pub outputs: IndexMap<String, Output>,
    pub authentication: AuthConfig,
    pub monitoring: MonitoringConfig,
    pub security: SecurityConfig,
    pub network: NetworkConfig,
    pub tags: IndexMap<String, String>,
    pub features: FeatureFlags,

    /// Document this config was loaded from or last saved to
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Directory of the source document, used to resolve relative paths
    pub fn source_dir(&self) -> Option<&Path> {
        self.source_path.as_deref().and_then(Path::parent)
    }

    pub fn module_by_name(&self, name: &str) -> Option<&ModuleConfig> {
        self.modules.iter().find(|module| module.name == name)
    }

    pub fn provider_by_name(&self, name: &str) -> Option<&Provider> {
        self.providers.get(name)
    }

    pub fn is_feature_enabled(&self, feature: &str) -> bool {
        self.features.is_enabled(feature)
    }

    /// Runs the full validator, see [crate::Validator::validate]
    pub fn validate(&self) -> crate::Result<()> {
        crate::Validator::new().validate(self)
    }

    /// Writes the config to `path` in the format its extension selects
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> crate::Result<()> {
        crate::Loader::default().save_as(self, path.as_ref())
    }
}

/// Shared handle to a [Config] behind a reader/writer lock
///
/// Cloning the handle shares the config; use [SharedConfig::snapshot] for an isolated copy.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig(Arc<RwLock<Config>>);

impl SharedConfig {
    pub fn new(config: Config) -> Self {
        Self(Arc::new(RwLock::new(config)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Config> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Config> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Config {
        self.read().clone()
    }

    pub fn merge(&self, other: &Config) {
        self.write().merge(other);
    }

    pub fn get_string(&self, key: &str) -> String {
        self.read().get_string(key)
    }

    pub fn set_string(&self, key: &str, value: impl Into<String>) {
        self.write().set_string(key, value);
    }

    pub fn is_feature_enabled(&self, feature: &str) -> bool {
        self.read().is_feature_enabled(feature)
    }
}

impl From<Config> for SharedConfig {
    fn from(value: Config) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lookups() {
        let mut config = Config::default();
        config.modules.push(ModuleConfig {
            name: "vpc".into(),
            source: "./modules/vpc".into(),
            ..Default::default()
        });
        config.providers.insert("google".into(), Provider::default());
        config.features.enable_dry_run = true;
        config.features.custom_flags.insert("beta".into(), true);

        assert_eq!(
            config.module_by_name("vpc").map(|m| m.source.as_str()),
            Some("./modules/vpc")
        );
        assert!(config.module_by_name("gke").is_none());
        assert!(config.provider_by_name("google").is_some());
        assert!(config.is_feature_enabled("dry_run"));
        assert!(config.is_feature_enabled("beta"));
        assert!(!config.is_feature_enabled("caching"));
    }

    #[test]
    fn snapshot_is_isolated() {
        let shared = SharedConfig::new(Config {
            project: "one".into(),
            ..Default::default()
        });
        let mut copy = shared.snapshot();
        copy.project = "two".into();

        assert_eq!(shared.get_string("project"), "one");

        let handle = shared.clone();
        handle.set_string("project", "three");
        assert_eq!(shared.get_string("project"), "three");
    }
}
