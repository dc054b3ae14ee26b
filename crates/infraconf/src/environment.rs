//! environment variable access
//!
//! Resolution never reads or writes the process environment directly. It goes through an
//! [EnvironmentProvider], so a resolver can be handed a fixed set of variables and
//! [crate::EnvResolver::set_env_variable] cannot leak into the rest of the process.
use dashmap::DashMap;

pub trait EnvironmentProvider: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);

    /// Value of the first variable in `keys` that is set and non-empty
    fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.get(key))
            .find(|value| !value.is_empty())
    }
}

/// In-memory set of environment variables
///
/// [EnvSnapshot::capture] copies the process environment once, later writes only touch the
/// snapshot.
#[derive(Debug, Default)]
pub struct EnvSnapshot {
    vars: DashMap<String, String>,
}

impl EnvSnapshot {
    pub fn capture() -> Self {
        std::env::vars().collect()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl EnvironmentProvider for EnvSnapshot {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: &str) {
        self.vars.insert(key.to_owned(), value.to_owned());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvSnapshot {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_non_empty_wins() {
        let env: EnvSnapshot = [("A", ""), ("B", "b"), ("C", "c")].into_iter().collect();
        assert_eq!(env.first_of(&["MISSING", "A", "B", "C"]), Some("b".into()));
        assert_eq!(env.first_of(&["MISSING", "A"]), None);
    }

    #[test]
    fn writes_stay_in_snapshot() {
        let env = EnvSnapshot::capture();
        env.set("INFRACONF_SNAPSHOT_ONLY", "1");
        assert_eq!(env.get("INFRACONF_SNAPSHOT_ONLY"), Some("1".into()));
        assert!(std::env::var("INFRACONF_SNAPSHOT_ONLY").is_err());
    }
}
