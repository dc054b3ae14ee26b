//! declarations of a Terraform module directory
//!
//! Reads every `*.tf` file of the directory in name order and collects:
//! - `terraform { required_providers { ... } }` entries as providers (source and version)
//! - `variable "x" { default = ... }` defaults as variables
//! - `output "x" {}` descriptions and sensitivity as outputs
use crate::config::Config;
use crate::error::{Error, Location, Result, SyntaxError};
use crate::value::Value;
use hcl_edit::structure::{Block, Body, Structure};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, PartialEq)]
pub(super) struct ModuleDeclarations {
    pub providers: IndexMap<String, (String, String)>,
    pub variables: IndexMap<String, Value>,
    pub outputs: IndexMap<String, (String, bool)>,
}

impl ModuleDeclarations {
    /// Copies the declarations into `config`; entries already present keep their other settings
    pub fn apply(self, config: &mut Config) {
        for (name, (source, version)) in self.providers {
            let provider = config.providers.entry(name).or_default();
            provider.source = source;
            provider.version = version;
        }
        config.variables.extend(self.variables);
        for (name, (description, sensitive)) in self.outputs {
            let output = config.outputs.entry(name).or_default();
            output.description = description;
            output.sensitive = sensitive;
        }
    }
}

/// `*.tf` files of `dir`, sorted by name
fn module_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "tf") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub(super) fn read_module(dir: &Path) -> Result<ModuleDeclarations> {
    let mut declarations = ModuleDeclarations::default();
    for path in module_files(dir)? {
        tracing::debug!(path=%path.display(), "reading module file");
        let source = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        let body = hcl_edit::parser::parse_body(&source).map_err(|e| {
            SyntaxError::new(e.message())
                .at(Location {
                    line: e.location().line(),
                    column: e.location().column(),
                })
                .in_file(&path)
        })?;
        declarations.collect(body);
    }
    Ok(declarations)
}

impl ModuleDeclarations {
    fn collect(&mut self, body: Body) {
        for block in blocks(body) {
            let label = block.labels.first().map(|label| label.as_str().to_string());
            match (block.ident.value().as_str(), label) {
                ("terraform", None) => {
                    for nested in blocks(block.body) {
                        if nested.ident.value().as_str() == "required_providers" {
                            self.required_providers(nested.body);
                        }
                    }
                }
                ("variable", Some(name)) => {
                    if let Some(default) = attribute(&block.body, "default") {
                        self.variables.insert(name, default);
                    }
                }
                ("output", Some(name)) => {
                    let description = attribute(&block.body, "description")
                        .map(|value| value.to_text())
                        .unwrap_or_default();
                    let sensitive = attribute(&block.body, "sensitive")
                        .and_then(|value| value.as_bool())
                        .unwrap_or_default();
                    self.outputs.insert(name, (description, sensitive));
                }
                _ => {}
            }
        }
    }

    /// `name = { source, version }`, or the older `name = "version"` form
    fn required_providers(&mut self, body: Body) {
        for structure in body {
            let Structure::Attribute(entry) = structure else {
                continue;
            };
            let name = entry.key.value().to_string();
            let requirement = match Value::from(hcl::Expression::from(entry.value)) {
                Value::Object(mut fields) => {
                    let mut text = |key: &str| {
                        fields
                            .shift_remove(key)
                            .map(|value| value.to_text())
                            .unwrap_or_default()
                    };
                    (text("source"), text("version"))
                }
                version => (String::new(), version.to_text()),
            };
            self.providers.insert(name, requirement);
        }
    }
}

fn blocks(body: Body) -> impl Iterator<Item = Block> {
    body.into_iter().filter_map(|structure| match structure {
        Structure::Block(block) => Some(block),
        Structure::Attribute(_) => None,
    })
}

fn attribute(body: &Body, key: &str) -> Option<Value> {
    body.iter().find_map(|structure| match structure {
        Structure::Attribute(attr) if attr.key.value().as_str() == key => {
            Some(Value::from(hcl::Expression::from(attr.value.clone())))
        }
        _ => None,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const MAIN: &str = r#"
terraform {
  required_version = ">= 1.5"
  required_providers {
    google = {
      source  = "hashicorp/google"
      version = ">= 5.0, < 6.0"
    }
    random = "~> 3.5"
  }
}

resource "google_compute_network" "vpc" {
  name = var.name
}
"#;

    const VARIABLES: &str = r#"
variable "name" {
  type    = string
  default = "main"
}

variable "subnets" {
  default = ["10.0.0.0/24", "10.0.1.0/24"]
}

variable "project" {
  description = "no default"
}

output "network_id" {
  description = "network self link"
  value       = google_compute_network.vpc.id
}

output "token" {
  value     = "x"
  sensitive = true
}
"#;

    fn module_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.tf"), MAIN).unwrap();
        std::fs::write(dir.path().join("variables.tf"), VARIABLES).unwrap();
        std::fs::write(dir.path().join("README.md"), "output \"ignored\" {}").unwrap();
        dir
    }

    #[test]
    fn declarations() {
        let dir = module_dir();
        let found = read_module(dir.path()).unwrap();

        assert_eq!(
            found.providers,
            IndexMap::from([
                (
                    "google".to_string(),
                    ("hashicorp/google".to_string(), ">= 5.0, < 6.0".to_string())
                ),
                ("random".to_string(), (String::new(), "~> 3.5".to_string())),
            ])
        );
        assert_eq!(
            found.variables,
            IndexMap::from([
                ("name".to_string(), Value::from("main")),
                (
                    "subnets".to_string(),
                    Value::from(vec!["10.0.0.0/24", "10.0.1.0/24"])
                ),
            ])
        );
        assert_eq!(
            found.outputs,
            IndexMap::from([
                (
                    "network_id".to_string(),
                    ("network self link".to_string(), false)
                ),
                ("token".to_string(), (String::new(), true)),
            ])
        );
    }

    #[test]
    fn malformed_file_names_the_file() {
        let dir = module_dir();
        std::fs::write(dir.path().join("broken.tf"), "variable \"x\" {\n  default = \n}").unwrap();

        let Err(Error::Syntax(error)) = read_module(dir.path()) else {
            panic!("expected a syntax error");
        };
        assert!(error.path.is_some_and(|path| path.ends_with("broken.tf")));
        assert!(error.location.is_some());
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let error = read_module(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(error, Error::Io { .. }), "{error:?}");
    }
}
