//! secret material lookup
//!
//! Concrete secret stores live outside this crate and plug in through [SecretsProvider].
//! [MemorySecrets] is a fixed key/value store for embedding and tests.
use crate::context::{Context, Interrupted};
use indexmap::IndexMap;

pub trait SecretsProvider: Send + Sync {
    fn get_secret(&self, cx: &Context, key: &str) -> Result<String, SecretError>;
    fn list_secrets(&self, cx: &Context, prefix: &str) -> Result<Vec<String>, SecretError>;
}

#[derive(thiserror::Error, Debug)]
pub enum SecretError {
    #[error("secrets provider not configured")]
    NotConfigured,
    #[error("secret key is empty")]
    EmptyKey,
    #[error("secret `{0}` not found")]
    NotFound(String),
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
    #[error("secret backend failed")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, Default, Clone)]
pub struct MemorySecrets {
    secrets: IndexMap<String, String>,
}

impl MemorySecrets {
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.secrets.insert(key.into(), value.into());
        self
    }
}

impl SecretsProvider for MemorySecrets {
    fn get_secret(&self, cx: &Context, key: &str) -> Result<String, SecretError> {
        cx.check()?;
        self.secrets
            .get(key)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(key.to_owned()))
    }

    fn list_secrets(&self, cx: &Context, prefix: &str) -> Result<Vec<String>, SecretError> {
        cx.check()?;
        Ok(self
            .secrets
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemorySecrets {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            secrets: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
