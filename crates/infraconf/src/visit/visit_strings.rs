use super::VisitMut;
use crate::value::Value;
use std::fmt::Write;

/// Recursively visit all string leaves mutably
pub trait VisitStringsMut {
    fn visit_strings_mut<E>(&mut self, visitor: &mut dyn VisitMut<String, E>) -> Result<(), E>;
}

impl VisitStringsMut for Value {
    fn visit_strings_mut<E>(&mut self, visitor: &mut dyn VisitMut<String, E>) -> Result<(), E> {
        let mut path = String::new();
        walk(self, &mut path, visitor)
    }
}

fn walk<E>(
    value: &mut Value,
    path: &mut String,
    visitor: &mut dyn VisitMut<String, E>,
) -> Result<(), E> {
    match value {
        Value::String(string) => visitor.visit_mut(path, string),
        Value::Array(items) => {
            for (index, item) in items.iter_mut().enumerate() {
                let len = path.len();
                let _ = write!(path, "[{index}]");
                walk(item, path, visitor)?;
                path.truncate(len);
            }
            Ok(())
        }
        Value::Object(map) => {
            for (key, item) in map.iter_mut() {
                let len = path.len();
                if !path.is_empty() {
                    path.push('.');
                }
                path.push_str(key);
                walk(item, path, visitor)?;
                path.truncate(len);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn paths_are_dotted() {
        let mut value: Value = serde_json::from_str(
            r#"{"project": "p", "network": {"subnets": [{"cidr": "10.0.0.0/24"}], "mtu": 1460}}"#,
        )
        .unwrap();

        let mut seen = vec![];
        value
            .visit_strings_mut::<()>(&mut |path: &str, string: &mut String| {
                seen.push(path.to_string());
                string.make_ascii_uppercase();
                Ok(())
            })
            .unwrap();

        assert_eq!(seen, vec!["project", "network.subnets[0].cidr"]);
        assert_eq!(value.pointer("project"), Some(&Value::from("P")));
    }

    #[test]
    fn first_error_stops() {
        let mut value = Value::from(vec!["a", "b", "c"]);
        let mut visited = 0;
        let result = value.visit_strings_mut::<String>(&mut |path: &str, _: &mut String| {
            visited += 1;
            if path == "[1]" {
                return Err(path.to_string());
            }
            Ok(())
        });

        assert_eq!(result, Err("[1]".to_string()));
        assert_eq!(visited, 2);
    }
}
