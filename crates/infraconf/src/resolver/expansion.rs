use super::{evaluation_error, fetch_secret, from_tree, to_tree, SECRET_PREFIX};
use crate::config::Config;
use crate::context::Context;
use crate::error::Result;
use crate::eval::{scan, EvalContext, FunctionRegistry, Host};
use crate::value::Value;
use crate::visit::VisitStringsMut;
use std::collections::HashSet;
use std::sync::Arc;

/// Template expansion of one document
///
/// `literal` fields hold secret material and are never expanded. `bound` holds the paths of
/// bindings that were expanded ahead of the rest of the document.
pub(crate) struct Expansion<'a> {
    pub(super) functions: &'a Arc<FunctionRegistry>,
    pub(super) cx: &'a Context,
    literal: HashSet<String>,
    pub(super) bound: Vec<String>,
}

impl<'a> Expansion<'a> {
    pub fn new(
        functions: &'a Arc<FunctionRegistry>,
        cx: &'a Context,
        literal: HashSet<String>,
    ) -> Self {
        Self {
            functions,
            cx,
            literal,
            bound: Vec::new(),
        }
    }

    pub fn is_literal(&self, field: &str) -> bool {
        self.literal.contains(field)
    }

    pub fn into_literal(self) -> HashSet<String> {
        self.literal
    }

    fn is_bound(&self, field: &str) -> bool {
        self.bound.iter().any(|path| covers(path, field))
    }

    /// Expands `text` in place; a result of the form `secret:KEY` is looked up in turn
    pub fn field(
        &mut self,
        field: &str,
        text: &mut String,
        eval: &EvalContext,
        host: &dyn Host,
    ) -> Result<()> {
        if self.is_literal(field) || !scan::has_interpolation(text) {
            return Ok(());
        }
        self.cx.check()?;

        let expanded = eval
            .expand(text, host)
            .map_err(|source| evaluation_error(field, text, source))?;
        tracing::trace!(field, "template expanded");
        *text = self.settle(field, expanded, host)?;
        Ok(())
    }

    /// Like [Expansion::field], but a text that is exactly one span keeps the value's type
    pub fn value(
        &mut self,
        field: &str,
        value: &mut Value,
        eval: &EvalContext,
        host: &dyn Host,
    ) -> Result<()> {
        match value {
            Value::String(text)
                if !self.is_literal(field) && scan::has_interpolation(text.as_str()) =>
            {
                self.cx.check()?;
                let expanded = eval
                    .expand_value(text, host)
                    .map_err(|source| evaluation_error(field, text, source))?;
                tracing::trace!(field, "template expanded");
                *value = match expanded {
                    Value::String(text) => Value::String(self.settle(field, text, host)?),
                    other => other,
                };
                Ok(())
            }
            Value::String(_) => Ok(()),
            nested => self.tree(nested, field, eval, host, |_| false),
        }
    }

    fn settle(&mut self, field: &str, expanded: String, host: &dyn Host) -> Result<String> {
        let Some(key) = expanded.strip_prefix(SECRET_PREFIX) else {
            return Ok(expanded);
        };
        let secret = fetch_secret(field, key, |key| host.secret(key))?;
        self.literal.insert(field.to_string());
        Ok(secret)
    }

    /// Expands every string leaf of `tree`, addressed below `base`, unless `skip` says otherwise
    pub fn tree(
        &mut self,
        tree: &mut Value,
        base: &str,
        eval: &EvalContext,
        host: &dyn Host,
        skip: impl Fn(&str) -> bool,
    ) -> Result<()> {
        let mut visitor = |path: &str, text: &mut String| -> Result<()> {
            let field = join_path(base, path);
            if skip(&field) || self.is_bound(&field) {
                return Ok(());
            }
            self.field(&field, text, eval, host)
        };
        tree.visit_strings_mut(&mut visitor)
    }

    /// Expands the bindings of `config`, then every other field against them
    ///
    /// Returns the context the rest of the document was expanded against.
    pub fn document(
        &mut self,
        config: &mut Config,
        host: &dyn Host,
        skip: impl Fn(&str) -> bool,
    ) -> Result<EvalContext> {
        self.bindings(config, host)?;

        let eval = EvalContext::from_config(config, self.functions.clone());
        let mut tree = to_tree(config)?;
        self.tree(&mut tree, "", &eval, host, skip)?;
        *config = from_tree(tree, config.source_path.clone())?;
        Ok(eval)
    }
}

/// Field path of `path` below `base`, in the form produced by the string visitor
pub(super) fn join_path(base: &str, path: &str) -> String {
    if base.is_empty() || path.is_empty() || path.starts_with('[') {
        format!("{base}{path}")
    } else {
        format!("{base}.{path}")
    }
}

/// Whether `field` is `path` itself or lies below it
fn covers(path: &str, field: &str) -> bool {
    field
        .strip_prefix(path)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(['.', '[']))
}
