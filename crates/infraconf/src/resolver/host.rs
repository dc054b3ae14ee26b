use super::expansion::Expansion;
use super::to_tree;
use crate::context::{Context, Interrupted};
use crate::environment::EnvironmentProvider;
use crate::eval::{FunctionError, FunctionRegistry, Host};
use crate::loader::Loader;
use crate::secrets::{SecretError, SecretsProvider};
use crate::value::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The outside world of one resolve
///
/// `chain` holds the documents currently being read, outermost first. Reading a document that
/// is already on the chain is an include cycle.
pub(crate) struct Session<'a> {
    pub cx: &'a Context,
    pub env: &'a dyn EnvironmentProvider,
    pub secrets: Option<&'a dyn SecretsProvider>,
    pub loader: &'a Loader,
    pub functions: &'a Arc<FunctionRegistry>,
    pub source_path: Option<PathBuf>,
    pub project: String,
    chain: Vec<PathBuf>,
}

impl<'a> Session<'a> {
    pub fn new(
        cx: &'a Context,
        env: &'a dyn EnvironmentProvider,
        secrets: Option<&'a dyn SecretsProvider>,
        loader: &'a Loader,
        functions: &'a Arc<FunctionRegistry>,
    ) -> Self {
        Self {
            cx,
            env,
            secrets,
            loader,
            functions,
            source_path: None,
            project: String::new(),
            chain: Vec::new(),
        }
    }

    /// Session for the document at `source_path` with `project` as the current project
    pub fn for_document(mut self, source_path: Option<PathBuf>, project: String) -> Self {
        self.chain = source_path.as_deref().map(canonical).into_iter().collect();
        self.source_path = source_path;
        self.project = project;
        self
    }

    fn nested(&self, path: PathBuf, project: String) -> Session<'a> {
        let mut chain = self.chain.clone();
        chain.push(path.clone());
        Session {
            cx: self.cx,
            env: self.env,
            secrets: self.secrets,
            loader: self.loader,
            functions: self.functions,
            source_path: Some(path),
            project,
            chain,
        }
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

impl Host for Session<'_> {
    fn env_var(&self, name: &str) -> Option<String> {
        self.env.get(name)
    }

    fn secret(&self, key: &str) -> Result<String, SecretError> {
        self.cx.check()?;
        match self.secrets {
            Some(secrets) => secrets.get_secret(self.cx, key),
            None => Err(SecretError::NotConfigured),
        }
    }

    fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    fn project(&self) -> String {
        self.project.clone()
    }

    /// Loads `path` and expands its templates in a nested session
    fn read_config(&self, path: &Path) -> Result<Value, FunctionError> {
        self.cx.check()?;

        let path = canonical(path);
        if self.chain.contains(&path) {
            let mut cycle = self.chain.clone();
            cycle.push(path);
            return Err(FunctionError::Cycle(cycle));
        }

        let load_failed = |source: crate::Error| FunctionError::Load {
            path: path.clone(),
            source: Box::new(source),
        };

        let mut config = self.loader.load_config(&path).map_err(load_failed)?;
        let nested = self.nested(path.clone(), config.project.clone());

        Expansion::new(self.functions, self.cx, HashSet::new())
            .document(&mut config, &nested, |_| false)
            .map_err(load_failed)?;
        to_tree(&config).map_err(load_failed)
    }

    fn check(&self) -> Result<(), Interrupted> {
        self.cx.check()
    }
}
