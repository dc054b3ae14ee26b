//! resolving a loaded config into its final form
//!
//! [EnvResolver::resolve] runs four passes over a snapshot of the shared config:
//! 1. environment defaulting: empty well-known fields are filled from environment variables
//! 2. secrets: every string field `secret:KEY` is replaced with the secret `KEY`
//! 3. templates: bindings (top-level fields, variables, locals) that are templates are expanded
//!    in reference order, then every other string field containing `${`
//! 4. dependencies: relative dependency paths are anchored at the source document and mock
//!    outputs are expanded
//!
//! Secret material is never expanded, neither in the resolve that fetched it nor in a later
//! one. A template that expands to `secret:KEY` is looked up like a literal reference.
//!
//! The snapshot is written back only when all passes succeed, so a failed resolve leaves the
//! shared config untouched and never leaves an unresolved placeholder behind.
mod bindings;
mod expansion;
mod host;

use crate::cache::{Clock, SystemClock, TtlCache, DEFAULT_TTL};
use crate::config::{Config, SharedConfig};
use crate::context::Context;
use crate::environment::{EnvSnapshot, EnvironmentProvider};
use crate::error::{Error, Result};
use crate::eval::{scan, EvalContext, EvalError, Function, FunctionRegistry};
use crate::loader::Loader;
use crate::secrets::{SecretError, SecretsProvider};
use crate::value::Value;
use crate::visit::VisitStringsMut;
use dashmap::DashMap;
use expansion::Expansion;
use host::Session;
use std::collections::HashSet;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const SECRET_PREFIX: &str = "secret:";

/// Fields filled from the environment when empty, with the variables to try in order
fn env_defaults(config: &mut Config) -> [(&mut String, &'static [&'static str]); 10] {
    [
        (
            &mut config.project,
            &["GOOGLE_PROJECT", "GCP_PROJECT", "GOOGLE_CLOUD_PROJECT"],
        ),
        (
            &mut config.region,
            &["GOOGLE_REGION", "GCP_REGION", "GOOGLE_COMPUTE_REGION"],
        ),
        (
            &mut config.zone,
            &["GOOGLE_ZONE", "GCP_ZONE", "GOOGLE_COMPUTE_ZONE"],
        ),
        (
            &mut config.environment,
            &["ENVIRONMENT", "ENV", "DEPLOYMENT_ENV"],
        ),
        (
            &mut config.terraform.version,
            &["TERRAFORM_VERSION", "TF_VERSION"],
        ),
        (
            &mut config.terragrunt.version,
            &["TERRAGRUNT_VERSION", "TG_VERSION"],
        ),
        (
            &mut config.backend.kind,
            &["TERRAFORM_BACKEND", "TF_BACKEND"],
        ),
        (
            &mut config.backend.bucket,
            &["TERRAFORM_STATE_BUCKET", "TF_STATE_BUCKET", "STATE_BUCKET"],
        ),
        (
            &mut config.authentication.kind,
            &["AUTH_TYPE", "GOOGLE_AUTH_TYPE"],
        ),
        (
            &mut config.authentication.service_account_key,
            &["GOOGLE_APPLICATION_CREDENTIALS", "GCP_SERVICE_ACCOUNT_KEY"],
        ),
    ]
}

pub struct EnvResolver {
    config: SharedConfig,
    secrets: Option<Arc<dyn SecretsProvider>>,
    env: Arc<dyn EnvironmentProvider>,
    functions: Arc<FunctionRegistry>,
    loader: Loader,
    cache: TtlCache,
    /// Fingerprints of secret material in the shared config, by field
    secret_fields: DashMap<String, u64>,
}

impl fmt::Debug for EnvResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvResolver")
            .field("config", &self.config)
            .field("secrets", &self.secrets.is_some())
            .field("env", &self.env)
            .field("functions", &self.functions)
            .field("cache", &self.cache)
            .field("secret_fields", &self.secret_fields.len())
            .finish()
    }
}

pub struct EnvResolverBuilder {
    config: SharedConfig,
    secrets: Option<Arc<dyn SecretsProvider>>,
    env: Option<Arc<dyn EnvironmentProvider>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    functions: FunctionRegistry,
}

impl EnvResolverBuilder {
    pub fn secrets(mut self, secrets: Arc<dyn SecretsProvider>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Environment to read from and write to; a snapshot of the process environment otherwise
    pub fn environment(mut self, env: Arc<dyn EnvironmentProvider>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Registers an additional function, replacing a built-in of the same name
    pub fn function(mut self, function: impl Function + 'static) -> Self {
        self.functions.register(function);
        self
    }

    pub fn build(self) -> EnvResolver {
        let env = self
            .env
            .unwrap_or_else(|| Arc::new(EnvSnapshot::capture()));

        EnvResolver {
            config: self.config,
            secrets: self.secrets,
            loader: Loader::new(env.clone()),
            env,
            functions: Arc::new(self.functions),
            cache: TtlCache::new(self.ttl, self.clock),
            secret_fields: DashMap::new(),
        }
    }
}

impl EnvResolver {
    pub fn builder(config: impl Into<SharedConfig>) -> EnvResolverBuilder {
        EnvResolverBuilder {
            config: config.into(),
            secrets: None,
            env: None,
            clock: Arc::new(SystemClock),
            ttl: DEFAULT_TTL,
            functions: FunctionRegistry::standard(),
        }
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    fn session<'a>(&'a self, cx: &'a Context, config: &Config) -> Session<'a> {
        Session::new(
            cx,
            self.env.as_ref(),
            self.secrets.as_deref(),
            &self.loader,
            &self.functions,
        )
        .for_document(config.source_path.clone(), config.project.clone())
    }

    /// Runs every pass and replaces the shared config with the result
    pub fn resolve(&self, cx: &Context) -> Result<()> {
        let mut config = self.config.snapshot();

        cx.check()?;
        tracing::debug!("pass: environment defaults");
        self.apply_env_defaults(&mut config);

        cx.check()?;
        tracing::debug!("pass: secrets");
        let literal = self.resolve_secrets(cx, &mut config)?;

        cx.check()?;
        tracing::debug!("pass: templates");
        let mut expansion = Expansion::new(&self.functions, cx, literal);
        let eval = {
            let session = self.session(cx, &config);
            expansion.document(&mut config, &session, is_mock_output)?
        };

        cx.check()?;
        tracing::debug!("pass: dependencies");
        self.resolve_dependencies(cx, &mut expansion, &eval, &mut config)?;

        let literal = expansion.into_literal();
        let fingerprints = fingerprints(&config, &literal)?;
        *self.config.write() = config;

        self.secret_fields.clear();
        for (field, fingerprint) in fingerprints {
            self.secret_fields.insert(field, fingerprint);
        }
        Ok(())
    }

    fn apply_env_defaults(&self, config: &mut Config) {
        for (target, keys) in env_defaults(config) {
            if !target.is_empty() {
                continue;
            }
            if let Some(value) = self.env.first_of(keys) {
                tracing::trace!(?keys, "field defaulted from environment");
                *target = value;
            }
        }
    }

    /// Replaces `secret:` references and returns every field holding secret material
    ///
    /// Fields still holding the secret material of an earlier resolve are included.
    fn resolve_secrets(&self, cx: &Context, config: &mut Config) -> Result<HashSet<String>> {
        let mut literal = HashSet::new();
        let mut tree = to_tree(config)?;
        let mut visitor = |field: &str, value: &mut String| -> Result<()> {
            let Some(key) = value.strip_prefix(SECRET_PREFIX) else {
                if self.secret_fields.get(field).is_some_and(|f| *f == fingerprint(value)) {
                    literal.insert(field.to_string());
                }
                return Ok(());
            };
            if scan::has_interpolation(key) {
                // the key is looked up once the template pass expanded it
                return Ok(());
            }
            cx.check()?;

            let secret = fetch_secret(field, key, |key| match &self.secrets {
                Some(secrets) => secrets.get_secret(cx, key),
                None => Err(SecretError::NotConfigured),
            })?;
            *value = secret;
            literal.insert(field.to_string());
            Ok(())
        };
        tree.visit_strings_mut(&mut visitor)?;

        *config = from_tree(tree, config.source_path.clone())?;
        Ok(literal)
    }

    fn resolve_dependencies(
        &self,
        cx: &Context,
        expansion: &mut Expansion<'_>,
        eval: &EvalContext,
        config: &mut Config,
    ) -> Result<()> {
        let session = self.session(cx, config);
        let base = config.source_dir().map(Path::to_path_buf);

        for (index, dependency) in config.terragrunt.dependencies.iter_mut().enumerate() {
            cx.check()?;

            if let Some(base) = &base {
                anchor(&mut dependency.path, base);
                anchor(&mut dependency.config_path, base);
            }

            for (name, output) in dependency.mock_outputs.iter_mut() {
                let field = format!("terragrunt.dependencies[{index}].mock_outputs.{name}");
                expansion.value(&field, output, eval, &session)?;
            }
        }

        Ok(())
    }

    /// Expands `${...}` spans in `text` against the current config
    pub fn expand_variables(&self, text: &str) -> Result<String> {
        let config = self.config.snapshot();
        let cx = Context::background();
        let session = self.session(&cx, &config);

        EvalContext::from_config(&config, self.functions.clone())
            .expand(text, &session)
            .map_err(|source| evaluation_error("input", text, source))
    }

    /// Resolved value for a dotted key, served from the cache while fresh
    ///
    /// Lookup order: `project`, `region`, `zone`, `environment`, `variables.<name>`,
    /// `tags.<name>`, a variable named `key`, then the string accessor table.
    pub fn get_resolved_value(&self, key: &str) -> Result<Value> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }

        if let Some(cached) = self.cache.get(key) {
            return Ok(cached);
        }
        tracing::debug!(key, "cache miss");

        let config = self.config.snapshot();
        let value = match key {
            "project" => Value::from(config.project.as_str()),
            "region" => Value::from(config.region.as_str()),
            "zone" => Value::from(config.zone.as_str()),
            "environment" => Value::from(config.environment.as_str()),
            _ => {
                let variable = key
                    .strip_prefix("variables.")
                    .and_then(|name| config.variables.get(name))
                    .cloned();
                let tag = || {
                    key.strip_prefix("tags.")
                        .and_then(|name| config.tags.get(name))
                        .map(|tag| Value::from(tag.as_str()))
                };

                variable
                    .or_else(tag)
                    .or_else(|| config.variables.get(key).cloned())
                    .unwrap_or_else(|| Value::String(config.get_string(key)))
            }
        };

        let value = match value {
            Value::String(text) if scan::has_interpolation(&text) => {
                let cx = Context::background();
                let session = self.session(&cx, &config);
                let expanded = EvalContext::from_config(&config, self.functions.clone())
                    .expand(&text, &session)
                    .map_err(|source| evaluation_error(key, &text, source))?;
                Value::String(expanded)
            }
            other => other,
        };

        self.cache.insert(key, value.clone());
        Ok(value)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Sets a variable in the injected environment; cached values are not invalidated
    pub fn set_env_variable(&self, name: &str, value: &str) {
        self.env.set(name, value);
    }

    pub fn get_env_variable(&self, name: &str) -> Option<String> {
        self.env.get(name)
    }

    /// Evaluation context for the current config
    pub fn eval_context(&self) -> EvalContext {
        EvalContext::from_config(&self.config.read(), self.functions.clone())
    }
}

fn is_mock_output(field: &str) -> bool {
    field.starts_with("terragrunt.dependencies[") && field.contains("].mock_outputs")
}

fn anchor(path: &mut String, base: &Path) {
    if path.is_empty() || Path::new(path.as_str()).is_absolute() {
        return;
    }
    *path = base.join(path.as_str()).display().to_string();
}

fn evaluation_error(field: &str, expression: &str, source: EvalError) -> Error {
    match source {
        EvalError::Interrupted(interrupted) => Error::Cancelled(interrupted),
        source => Error::Evaluation {
            field: field.to_string(),
            expression: expression.to_string(),
            source,
        },
    }
}

/// Looks up the secret `key` for `field`
fn fetch_secret(
    field: &str,
    key: &str,
    fetch: impl FnOnce(&str) -> std::result::Result<String, SecretError>,
) -> Result<String> {
    let key = key.trim();
    let failed = |source: SecretError| match source {
        SecretError::Interrupted(interrupted) => Error::Cancelled(interrupted),
        source => Error::SecretResolution {
            field: field.to_string(),
            key: key.to_string(),
            source,
        },
    };

    if key.is_empty() {
        return Err(failed(SecretError::EmptyKey));
    }
    let secret = fetch(key).map_err(failed)?;
    tracing::trace!(field, "secret resolved");
    Ok(secret)
}

fn fingerprint(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Fingerprints of the `literal` fields of `config`
fn fingerprints(config: &Config, literal: &HashSet<String>) -> Result<Vec<(String, u64)>> {
    let mut found = Vec::with_capacity(literal.len());
    let mut tree = to_tree(config)?;
    tree.visit_strings_mut(&mut |field: &str, text: &mut String| -> Result<()> {
        if literal.contains(field) {
            found.push((field.to_string(), fingerprint(text)));
        }
        Ok(())
    })?;
    Ok(found)
}

pub(crate) fn to_tree(config: &Config) -> Result<Value> {
    serde_json::to_value(config)
        .map(Value::from)
        .map_err(|e| Error::Render {
            format: "config tree",
            source: Box::new(e),
        })
}

pub(crate) fn from_tree(tree: Value, source_path: Option<PathBuf>) -> Result<Config> {
    let mut config: Config =
        serde_json::from_value(serde_json::Value::from(tree)).map_err(|e| Error::Render {
            format: "config tree",
            source: Box::new(e),
        })?;
    config.source_path = source_path;
    Ok(config)
}
