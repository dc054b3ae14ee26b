//! serde helpers for named collections
//!
//! `module "vpc" { ... }` in a block-structured document and `modules: [{name: vpc, ...}]` in
//! YAML describe the same entry. Both shapes load into the same `Vec`.
use serde::de::{DeserializeOwned, Error};
use serde::{Deserialize, Deserializer};
use serde_json::Value as Json;

/// Accepts a list of entries or a map of `name -> entry`
pub(crate) fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Json::deserialize(deserializer)? {
        Json::Null => Ok(Vec::new()),
        Json::Array(items) => items.into_iter().map(entry::<D, T>).collect(),
        Json::Object(entries) => entries
            .into_iter()
            .map(|(name, mut body)| {
                let Json::Object(fields) = &mut body else {
                    return Err(D::Error::custom(format!("entry `{name}` must be an object")));
                };
                fields.entry("name").or_insert(Json::String(name));
                entry::<D, T>(body)
            })
            .collect(),
        other => Err(D::Error::custom(format!(
            "expected a list or a map of named entries, found `{other}`"
        ))),
    }
}

/// Accepts a list of entries or a single entry
pub(crate) fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Json::deserialize(deserializer)? {
        Json::Null => Ok(Vec::new()),
        Json::Array(items) => items.into_iter().map(entry::<D, T>).collect(),
        single => Ok(vec![entry::<D, T>(single)?]),
    }
}

fn entry<'de, D, T>(value: Json) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    serde_json::from_value(value).map_err(D::Error::custom)
}

#[cfg(test)]
mod test {
    use crate::config::model::{NetworkConfig, SecurityGroup};
    use pretty_assertions::assert_eq;

    #[test]
    fn map_and_list_agree() {
        let from_map: NetworkConfig = serde_json::from_str(
            r#"{"subnet": {"a": {"cidr": "10.0.0.0/24"}, "b": {"cidr": "10.0.1.0/24"}}}"#,
        )
        .unwrap();
        let from_list: NetworkConfig = serde_json::from_str(
            r#"{"subnets": [
                {"name": "a", "cidr": "10.0.0.0/24"},
                {"name": "b", "cidr": "10.0.1.0/24"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(from_map, from_list);
        assert_eq!(from_map.subnets[1].name, "b");
    }

    #[test]
    fn single_rule_block() {
        let group: SecurityGroup =
            serde_json::from_str(r#"{"name": "web", "rule": {"type": "ingress", "from_port": 80}}"#)
                .unwrap();

        assert_eq!(group.rules.len(), 1);
        assert_eq!(group.rules[0].from_port, 80);
    }
}
