use super::{string, FuncDef, FunctionError, Param};
use crate::value::Value;

pub(super) fn functions() -> Vec<FuncDef> {
    vec![
        FuncDef::new("jsonencode", |args, _| {
            Ok(args.into_iter().next().unwrap_or_default().to_json().into())
        })
        .param(Param::any("value")),
        FuncDef::new("jsondecode", |args, _| {
            let text = string(args.into_iter().next().unwrap_or_default());
            serde_json::from_str::<Value>(&text)
                .map_err(|e| FunctionError::failed(format!("invalid JSON: {e}")))
        })
        .param(Param::string("str")),
        FuncDef::new("yamlencode", |args, _| {
            let value = args.into_iter().next().unwrap_or_default();
            serde_yaml::to_string(&value)
                .map(Value::String)
                .map_err(|e| FunctionError::failed(format!("cannot encode YAML: {e}")))
        })
        .param(Param::any("value")),
        FuncDef::new("yamldecode", |args, _| {
            let text = string(args.into_iter().next().unwrap_or_default());
            serde_yaml::from_str::<Value>(&text)
                .map_err(|e| FunctionError::failed(format!("invalid YAML: {e}")))
        })
        .param(Param::string("src")),
    ]
}

#[cfg(test)]
mod test {
    use crate::eval::functions::{Detached, FunctionRegistry};
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: Vec<Value>) -> Value {
        FunctionRegistry::standard()
            .call(name, args, &Detached)
            .unwrap()
    }

    #[test]
    fn json() {
        let decoded = call("jsondecode", vec![Value::from(r#"{"b":[1,true],"a":null}"#)]);
        assert_eq!(decoded.pointer("b.1"), Some(&Value::Boolean(true)));
        assert_eq!(
            call("jsonencode", vec![decoded]),
            Value::from(r#"{"b":[1,true],"a":null}"#)
        );
    }

    #[test]
    fn yaml() {
        let decoded = call("yamldecode", vec![Value::from("name: web\nports: [80, 443]\n")]);
        assert_eq!(decoded.pointer("ports.1"), Some(&Value::Integer(443)));
        assert_eq!(
            call("yamlencode", vec![Value::from(vec!["a"])]),
            Value::from("- a\n")
        );
    }

    #[test]
    fn malformed_input_fails() {
        assert!(FunctionRegistry::standard()
            .call("jsondecode", vec![Value::from("{")], &Detached)
            .is_err());
    }
}
