use super::{next, object, string, Call, FuncDef, FunctionError, Host, Param};
use crate::eval::render_template;
use crate::secrets::SecretError;
use crate::value::Value;
use std::path::{Component, Path, PathBuf};

pub(super) fn functions() -> Vec<FuncDef> {
    vec![
        FuncDef::new("env", |args, call| {
            let name = string(args.into_iter().next().unwrap_or_default());
            Ok(call.host.env_var(&name).unwrap_or_default().into())
        })
        .param(Param::string("name")),
        FuncDef::new("get_env", |args, call| {
            let mut args = args.into_iter();
            let name = string(next(&mut args));
            let default = args.next().map(string).unwrap_or_default();
            Ok(call
                .host
                .env_var(&name)
                .filter(|value| !value.is_empty())
                .unwrap_or(default)
                .into())
        })
        .param(Param::string("name"))
        .variadic(Param::string("default")),
        FuncDef::new("secret", |args, call| {
            let key = string(args.into_iter().next().unwrap_or_default());
            if key.trim().is_empty() {
                return Err(SecretError::EmptyKey.into());
            }
            Ok(call.host.secret(&key)?.into())
        })
        .param(Param::string("key")),
        FuncDef::new("get_secret", |args, call| {
            let mut args = args.into_iter();
            let key = string(next(&mut args));
            let default = string(next(&mut args));
            match call.host.secret(&key) {
                Ok(secret) => Ok(secret.into()),
                Err(SecretError::Interrupted(interrupted)) => Err(interrupted.into()),
                Err(error) => {
                    tracing::debug!(%key, %error, "secret lookup failed, using default");
                    Ok(default.into())
                }
            }
        })
        .param(Param::string("key"))
        .param(Param::string("default")),
        FuncDef::new("file", |args, call| {
            let path = relative_to_source(call.host, &string(first(args)));
            read(call.host, &path).map(Value::String)
        })
        .param(Param::string("path")),
        FuncDef::new("find_in_parent", |args, call| {
            let mut args = args.into_iter();
            let name = string(next(&mut args));
            let fallback = args.next();

            call.host.check()?;
            let found = base_dir(call.host)
                .ancestors()
                .map(|dir| dir.join(&name))
                .find(|candidate| candidate.exists());

            match (found, fallback) {
                (Some(path), _) => Ok(path.display().to_string().into()),
                (None, Some(fallback)) => Ok(fallback),
                (None, None) => Err(FunctionError::failed(format!(
                    "{name} not found in parent directories"
                ))),
            }
        })
        .param(Param::string("name"))
        .variadic(Param::string("fallback")),
        FuncDef::new("templatefile", |args, call| templatefile(args, call))
            .param(Param::string("path"))
            .param(Param::object("vars")),
        FuncDef::new("read_terragrunt_config", |args, call| {
            let path = relative_to_source(call.host, &string(first(args)));
            call.host.read_config(&path)
        })
        .param(Param::string("path")),
        FuncDef::new("get_terragrunt_dir", |_, call| {
            Ok(base_dir(call.host).display().to_string().into())
        }),
        FuncDef::new("get_parent_terragrunt_dir", |_, call| {
            let dir = base_dir(call.host);
            let parent = dir.parent().unwrap_or(&dir);
            Ok(parent.display().to_string().into())
        }),
        FuncDef::new("get_original_terragrunt_dir", |_, call| {
            let dir = call
                .host
                .env_var("TERRAGRUNT_ORIGINAL_DIR")
                .filter(|dir| !dir.is_empty())
                .unwrap_or_else(|| current_dir().display().to_string());
            Ok(dir.into())
        }),
        FuncDef::new("path_relative_to", |args, _| {
            let mut args = args.into_iter();
            let base = string(next(&mut args));
            let path = string(next(&mut args));
            relative_path(Path::new(&base), Path::new(&path))
        })
        .param(Param::string("base"))
        .param(Param::string("path")),
        FuncDef::new("path_relative_from", |args, call| {
            let base = string(first(args));
            relative_path(Path::new(&base), &base_dir(call.host))
        })
        .param(Param::string("base")),
        FuncDef::new("get_gcp_project", |_, call| Ok(call.host.project().into())),
        FuncDef::new("get_platform", |_, _| Ok(std::env::consts::OS.into())),
        FuncDef::new("get_repo_root", |_, call| {
            call.host.check()?;
            base_dir(call.host)
                .ancestors()
                .find(|dir| dir.join(".git").exists())
                .map(|dir| Value::from(dir.display().to_string()))
                .ok_or_else(|| FunctionError::failed("git repository root not found"))
        }),
        FuncDef::new("get_terraform_commands", |_, _| {
            Ok(vec!["init", "plan", "apply", "destroy", "validate", "output"].into())
        }),
        FuncDef::new("generate_if", |args, _| {
            let mut args = args.into_iter();
            let condition = next(&mut args).as_bool().unwrap_or_default();
            let content = string(next(&mut args));
            let generated = if condition { content } else { String::new() };
            Ok(generated.into())
        })
        .param(Param::bool("condition"))
        .param(Param::string("content")),
        FuncDef::new("run_cmd", |_, _| Err(FunctionError::Disabled("run_cmd")))
            .param(Param::string("cmd"))
            .variadic(Param::any("args")),
    ]
}

fn first(args: Vec<Value>) -> Value {
    args.into_iter().next().unwrap_or_default()
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Directory of the source document, or the working directory without one
fn base_dir(host: &dyn Host) -> PathBuf {
    host.source_path()
        .and_then(Path::parent)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(current_dir)
}

/// Relative paths are taken from the source document's directory
fn relative_to_source(host: &dyn Host, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match host.source_path().and_then(Path::parent) {
        Some(dir) => dir.join(path),
        None => path.to_path_buf(),
    }
}

fn read(host: &dyn Host, path: &Path) -> Result<String, FunctionError> {
    host.check()?;
    tracing::debug!(path = %path.display(), "reading file");
    std::fs::read_to_string(path).map_err(|source| FunctionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn templatefile(args: Vec<Value>, call: &Call<'_>) -> Result<Value, FunctionError> {
    let mut args = args.into_iter();
    let path = relative_to_source(call.host, &string(next(&mut args)));
    let variables = object(next(&mut args));

    let template = read(call.host, &path)?;
    render_template(&template, &variables, call.functions, call.host)
        .map(Value::String)
        .map_err(|e| FunctionError::Template(Box::new(e)))
}

/// Lexical relative path from `base` to `path`; both must be absolute or both relative
fn relative_path(base: &Path, path: &Path) -> Result<Value, FunctionError> {
    if base.is_absolute() != path.is_absolute() {
        return Err(FunctionError::failed(format!(
            "cannot relate {} to {}",
            path.display(),
            base.display()
        )));
    }

    let base: Vec<Component<'_>> = normalized(base);
    let path: Vec<Component<'_>> = normalized(path);
    let common = base
        .iter()
        .zip(&path)
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &path[common..] {
        relative.push(component.as_os_str());
    }

    if relative.as_os_str().is_empty() {
        return Ok(".".into());
    }
    Ok(relative.display().to_string().into())
}

fn normalized(path: &Path) -> Vec<Component<'_>> {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir
                if matches!(components.last(), Some(Component::Normal(_))) =>
            {
                components.pop();
            }
            other => components.push(other),
        }
    }
    components
}

#[cfg(test)]
mod test {
    use crate::context::{Context, Interrupted};
    use crate::eval::functions::{FunctionError, FunctionRegistry, Host};
    use crate::eval::EvalError;
    use crate::secrets::{MemorySecrets, SecretError, SecretsProvider};
    use crate::value::Value;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use std::path::{Path, PathBuf};

    #[derive(Default)]
    struct TestHost {
        env: IndexMap<String, String>,
        secrets: Option<MemorySecrets>,
        source: Option<PathBuf>,
    }

    impl Host for TestHost {
        fn env_var(&self, name: &str) -> Option<String> {
            self.env.get(name).cloned()
        }

        fn secret(&self, key: &str) -> Result<String, SecretError> {
            match &self.secrets {
                Some(secrets) => secrets.get_secret(&Context::background(), key),
                None => Err(SecretError::NotConfigured),
            }
        }

        fn source_path(&self) -> Option<&Path> {
            self.source.as_deref()
        }

        fn project(&self) -> String {
            "acme".into()
        }

        fn read_config(&self, _path: &Path) -> Result<Value, FunctionError> {
            Ok(Value::Null)
        }

        fn check(&self) -> Result<(), Interrupted> {
            Ok(())
        }
    }

    fn call(host: &TestHost, name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
        FunctionRegistry::standard().call(name, args, host)
    }

    fn s(value: &str) -> Value {
        Value::from(value)
    }

    #[test]
    fn environment_lookups() {
        let host = TestHost {
            env: IndexMap::from([("REGION".to_string(), "us-east1".to_string())]),
            ..Default::default()
        };

        assert_eq!(call(&host, "env", vec![s("REGION")]).unwrap(), s("us-east1"));
        assert_eq!(call(&host, "env", vec![s("MISSING")]).unwrap(), s(""));
        assert_eq!(
            call(&host, "get_env", vec![s("MISSING"), s("fallback")]).unwrap(),
            s("fallback")
        );
    }

    #[test]
    fn secrets_fail_closed() {
        let host = TestHost::default();
        let error = call(&host, "secret", vec![s("db-pass")]).unwrap_err();
        let EvalError::Function { source, .. } = error else {
            panic!("expected a function error");
        };
        assert!(matches!(source, FunctionError::Secret(SecretError::NotConfigured)));

        assert_eq!(
            call(&host, "get_secret", vec![s("db-pass"), s("default")]).unwrap(),
            s("default")
        );

        let host = TestHost {
            secrets: Some([("db-pass", "hunter2")].into_iter().collect()),
            ..Default::default()
        };
        assert_eq!(call(&host, "secret", vec![s("db-pass")]).unwrap(), s("hunter2"));
        assert!(call(&host, "secret", vec![s("  ")]).is_err());
    }

    #[test]
    fn files_are_relative_to_the_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("motd.txt"), "hello").unwrap();
        std::fs::write(
            dir.path().join("user.tpl"),
            "user=${name}%{ for r in roles },${r}%{ endfor }",
        )
        .unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let host = TestHost {
            source: Some(dir.path().join("nested").join("terragrunt.hcl")),
            ..Default::default()
        };

        assert_eq!(
            call(&host, "file", vec![s("../motd.txt")]).unwrap(),
            s("hello")
        );
        assert_eq!(
            call(&host, "find_in_parent", vec![s("motd.txt")]).unwrap(),
            Value::from(dir.path().join("motd.txt").display().to_string())
        );

        let vars = Value::Object(IndexMap::from([
            ("name".to_string(), s("ops")),
            ("roles".to_string(), Value::from(vec!["a", "b"])),
        ]));
        assert_eq!(
            call(&host, "templatefile", vec![s("../user.tpl"), vars]).unwrap(),
            s("user=ops,a,b")
        );

        let missing = call(&host, "file", vec![s("nope.txt")]).unwrap_err();
        assert!(matches!(
            missing,
            EvalError::Function {
                source: FunctionError::Io { .. },
                ..
            }
        ));
    }

    #[test]
    fn paths() {
        let host = TestHost {
            source: Some(PathBuf::from("/infra/live/prod/terragrunt.hcl")),
            ..Default::default()
        };

        assert_eq!(
            call(&host, "get_terragrunt_dir", vec![]).unwrap(),
            s("/infra/live/prod")
        );
        assert_eq!(
            call(&host, "get_parent_terragrunt_dir", vec![]).unwrap(),
            s("/infra/live")
        );
        assert_eq!(
            call(&host, "path_relative_to", vec![s("/infra/live"), s("/infra/modules/vpc")])
                .unwrap(),
            s("../modules/vpc")
        );
        assert_eq!(
            call(&host, "path_relative_from", vec![s("/infra")]).unwrap(),
            s("live/prod")
        );
    }

    #[test]
    fn constants() {
        let host = TestHost::default();
        assert_eq!(call(&host, "get_gcp_project", vec![]).unwrap(), s("acme"));
        assert_eq!(
            call(&host, "generate_if", vec![Value::Boolean(false), s("x")]).unwrap(),
            s("")
        );
        assert_eq!(
            call(&host, "get_terraform_commands", vec![])
                .unwrap()
                .as_array()
                .map(Vec::len),
            Some(6)
        );
    }
}
