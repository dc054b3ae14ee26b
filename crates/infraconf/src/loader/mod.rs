//! loading and saving configuration documents
//!
//! The file extension picks a [DocumentFormat] from the loader's format table:
//!
//! | extension               | format                           |
//! |-------------------------|----------------------------------|
//! | `.json`                 | JSON object                      |
//! | `.yaml`, `.yml`         | YAML document                    |
//! | `.hcl`, `.tf`, `.tfvars`| block-structured HCL document    |
//!
//! Anything else, including an empty path, falls back to [env::from_environment].
//!
//! [Loader::load_terraform_module] reads the declarations of a Terraform module directory
//! into an existing config.
mod env;
mod formats;
mod hcl;
mod module;

pub use self::env::{from_environment, ENV_PREFIX};
pub use self::formats::{Json, Yaml};
pub use self::hcl::Hcl;

use crate::config::Config;
use crate::environment::{EnvSnapshot, EnvironmentProvider};
use crate::error::{Error, Result, SyntaxError};
use indexmap::IndexMap;
use std::path::Path;
use std::sync::Arc;

/// A document format the loader can read and write
pub trait DocumentFormat: Send + Sync {
    fn name(&self) -> &'static str;
    fn parse(&self, source: &str) -> Result<Config, SyntaxError>;
    fn render(&self, config: &Config) -> Result<String>;
}

pub struct Loader {
    formats: IndexMap<String, Arc<dyn DocumentFormat>>,
    env: Arc<dyn EnvironmentProvider>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new(Arc::new(EnvSnapshot::capture()))
    }
}

impl Loader {
    /// A loader with the standard format table, reading fallbacks from `env`
    pub fn new(env: Arc<dyn EnvironmentProvider>) -> Self {
        let json: Arc<dyn DocumentFormat> = Arc::new(Json);
        let yaml: Arc<dyn DocumentFormat> = Arc::new(Yaml);
        let hcl: Arc<dyn DocumentFormat> = Arc::new(Hcl);

        Self {
            formats: IndexMap::new(),
            env,
        }
        .with_format("json", json)
        .with_format("yaml", yaml.clone())
        .with_format("yml", yaml)
        .with_format("hcl", hcl.clone())
        .with_format("tf", hcl.clone())
        .with_format("tfvars", hcl)
    }

    /// Registers (or replaces) the format for a file extension
    pub fn with_format(mut self, extension: &str, format: Arc<dyn DocumentFormat>) -> Self {
        self.formats.insert(extension.to_ascii_lowercase(), format);
        self
    }

    pub fn format_for(&self, path: &Path) -> Option<&dyn DocumentFormat> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        self.formats.get(&extension).map(AsRef::as_ref)
    }

    /// Reads the document at `path`, or the environment when no format matches the path
    pub fn load_config(&self, path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();

        let Some(format) = self.format_for(path) else {
            tracing::info!(path=%path.display(), "no document format, loading from environment");
            return Ok(from_environment(self.env.as_ref()));
        };

        let file_path = path.canonicalize().map_err(|e| Error::io(path, e))?;
        tracing::info!(path=%file_path.display(), format = format.name(), "loading file");

        let source = std::fs::read_to_string(&file_path).map_err(|e| Error::io(&file_path, e))?;
        let mut config = format
            .parse(&source)
            .map_err(|e| e.in_file(&file_path))?;

        config.source_path = Some(file_path);
        Ok(config)
    }

    /// Writes `config` to `path` in the format its extension selects
    ///
    /// Parent directories are created as needed. On success `path` becomes the config's
    /// source path.
    pub fn save_as(&self, config: &mut Config, path: &Path) -> Result<()> {
        let format = self
            .format_for(path)
            .ok_or_else(|| Error::UnsupportedFormat {
                path: path.to_owned(),
            })?;

        let rendered = format.render(config)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        std::fs::write(path, rendered).map_err(|e| Error::io(path, e))?;
        tracing::info!(path=%path.display(), format = format.name(), "saved config");

        config.source_path = Some(path.to_owned());
        Ok(())
    }

    /// Adds the providers, variable defaults and outputs declared by the module at `dir`
    ///
    /// Providers and outputs already in `config` keep their other settings. A declared
    /// default replaces the variable of the same name.
    pub fn load_terraform_module(&self, dir: impl AsRef<Path>, config: &mut Config) -> Result<()> {
        let dir = dir.as_ref();
        tracing::info!(path=%dir.display(), "loading terraform module");

        let declarations = module::read_module(dir)?;
        tracing::debug!(
            providers = declarations.providers.len(),
            variables = declarations.variables.len(),
            outputs = declarations.outputs.len(),
            "module declarations read"
        );
        declarations.apply(config);
        Ok(())
    }
}

/// Loads a document with the standard format table and the process environment
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    Loader::default().load_config(path)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn loader(vars: &[(&str, &str)]) -> Loader {
        Loader::new(Arc::new(vars.iter().copied().collect::<EnvSnapshot>()))
    }

    #[test]
    fn unknown_extension_uses_environment() {
        let config = loader(&[("GOOGLE_PROJECT", "from-env")])
            .load_config("settings.ini")
            .unwrap();

        assert_eq!(config.project, "from-env");
        assert_eq!(config.environment, "dev");
        assert_eq!(config.source_path, None);
    }

    #[test]
    fn missing_file_is_io_error() {
        let error = loader(&[]).load_config("does/not/exist.yaml").unwrap_err();
        assert!(matches!(error, Error::Io { .. }), "{error:?}");
    }

    #[test]
    fn syntax_error_carries_location() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\n  \"project\": \n}").unwrap();

        let Error::Syntax(error) = loader(&[]).load_config(&path).unwrap_err() else {
            panic!("expected a syntax error");
        };
        assert_eq!(error.location.map(|l| l.line), Some(3));
        assert!(error.path.is_some());
    }

    #[test]
    fn save_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let error = loader(&[])
            .save_as(&mut Config::default(), &dir.path().join("config.toml"))
            .unwrap_err();

        assert!(matches!(error, Error::UnsupportedFormat { .. }));
        assert_eq!(error.to_string().starts_with("unsupported config format"), true);
    }

    #[test]
    fn save_creates_parents_and_records_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/config.yml");
        let mut config = Config {
            project: "acme-prod".into(),
            ..Default::default()
        };

        loader(&[]).save_as(&mut config, &path).unwrap();

        assert!(path.exists());
        assert_eq!(config.source_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn terraform_module_fills_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("main.tf"),
            r#"
terraform {
  required_providers {
    google = {
      source  = "hashicorp/google"
      version = "~> 5.0"
    }
  }
}

variable "tier" {
  default = "gold"
}

output "endpoint" {
  description = "service endpoint"
  sensitive   = true
}
"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.providers.insert(
            "google".into(),
            crate::config::Provider {
                region: "us-east1".into(),
                ..Default::default()
            },
        );
        config.variables.insert("tier".into(), "bronze".into());

        loader(&[])
            .load_terraform_module(dir.path(), &mut config)
            .unwrap();

        let google = &config.providers["google"];
        assert_eq!(google.source, "hashicorp/google");
        assert_eq!(google.version, "~> 5.0");
        assert_eq!(google.region, "us-east1");
        assert_eq!(config.variables["tier"], crate::value::Value::from("gold"));
        assert_eq!(config.outputs["endpoint"].description, "service endpoint");
        assert!(config.outputs["endpoint"].sensitive);
    }
}
