//! bindings that are themselves templates
//!
//! Top-level fields, `variables` and `terragrunt.locals` are bound into every [EvalContext].
//! A binding holding a template is expanded before anything that reads it, so no template text
//! is ever substituted into another field. References are found statically; a binding that
//! reaches itself is a cycle.
use super::expansion::{join_path, Expansion};
use super::evaluation_error;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::eval::references::{references, Reference};
use crate::eval::{scan, EvalContext, EvalError, Host};
use crate::value::Value;
use crate::visit::VisitStringsMut;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::fmt;

/// Typed fields an expression can read
const FIELDS: [&str; 8] = [
    "project",
    "region",
    "zone",
    "environment",
    "terraform.version",
    "terraform.working_dir",
    "terragrunt.version",
    "terragrunt.config_file",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Binding {
    Field(&'static str),
    Variable(String),
    Local(String),
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Field(path) => f.write_str(path),
            Binding::Variable(name) => write!(f, "variables.{name}"),
            Binding::Local(name) => write!(f, "terragrunt.locals.{name}"),
        }
    }
}

fn all(config: &Config) -> impl Iterator<Item = Binding> + '_ {
    FIELDS
        .into_iter()
        .map(Binding::Field)
        .chain(config.variables.keys().cloned().map(Binding::Variable))
        .chain(config.terragrunt.locals.keys().cloned().map(Binding::Local))
}

/// Bindings an expression reading `reference` depends on
fn targets(reference: &Reference, config: &Config) -> Vec<Binding> {
    let Reference { root, attribute } = reference;
    if config.variables.contains_key(root) {
        return vec![Binding::Variable(root.clone())];
    }

    match (root.as_str(), attribute) {
        ("var", Some(name)) => vec![Binding::Variable(name.clone())],
        ("var", None) => config.variables.keys().cloned().map(Binding::Variable).collect(),
        ("local", Some(name)) => vec![Binding::Local(name.clone())],
        ("local", None) => config
            .terragrunt
            .locals
            .keys()
            .cloned()
            .map(Binding::Local)
            .collect(),
        (root, attribute) => FIELDS
            .into_iter()
            .filter(|field| match field.split_once('.') {
                Some((section, name)) => {
                    section == root && attribute.as_ref().map_or(true, |a| a == name)
                }
                None => *field == root,
            })
            .map(Binding::Field)
            .collect(),
    }
}

/// Field path and text of every templated string of `value`, placed at `base`
fn templates(
    value: &Value,
    base: &str,
    literal: &dyn Fn(&str) -> bool,
) -> Vec<(String, String)> {
    let mut found = Vec::new();
    let mut value = value.clone();
    let _ = value.visit_strings_mut(&mut |path: &str, text: &mut String| -> Result<(), ()> {
        let field = join_path(base, path);
        if scan::has_interpolation(text) && !literal(&field) {
            found.push((field, std::mem::take(text)));
        }
        Ok(())
    });
    found
}

fn value_of(config: &Config, binding: &Binding) -> Option<Value> {
    match binding {
        Binding::Field(path) => Some(Value::String(config.get_string(path))),
        Binding::Variable(name) => config.variables.get(name).cloned(),
        Binding::Local(name) => config.terragrunt.locals.get(name).cloned(),
    }
}

/// Dependencies first; `Err` holds the bindings of a cycle, first binding repeated last
fn order(edges: &IndexMap<Binding, IndexSet<Binding>>) -> Result<Vec<Binding>, Vec<Binding>> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Open,
        Done,
    }

    fn visit(
        binding: &Binding,
        edges: &IndexMap<Binding, IndexSet<Binding>>,
        marks: &mut HashMap<Binding, Mark>,
        path: &mut Vec<Binding>,
        order: &mut Vec<Binding>,
    ) -> Result<(), Vec<Binding>> {
        match marks.get(binding) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Open) => {
                let start = path.iter().position(|b| b == binding).unwrap_or_default();
                let mut cycle = path[start..].to_vec();
                cycle.push(binding.clone());
                return Err(cycle);
            }
            None => {}
        }

        marks.insert(binding.clone(), Mark::Open);
        path.push(binding.clone());
        for dependency in edges.get(binding).into_iter().flatten() {
            visit(dependency, edges, marks, path, order)?;
        }
        path.pop();
        marks.insert(binding.clone(), Mark::Done);
        order.push(binding.clone());
        Ok(())
    }

    let mut marks = HashMap::new();
    let mut order = Vec::with_capacity(edges.len());
    for binding in edges.keys() {
        visit(binding, edges, &mut marks, &mut Vec::new(), &mut order)?;
    }
    Ok(order)
}

impl Expansion<'_> {
    /// Expands every templated binding of `config` in reference order
    pub fn bindings(&mut self, config: &mut Config, host: &dyn Host) -> Result<()> {
        let pending: IndexMap<Binding, Vec<(String, String)>> = all(config)
            .filter_map(|binding| {
                let value = value_of(config, &binding)?;
                let literal = |field: &str| self.is_literal(field);
                let found = templates(&value, &binding.to_string(), &literal);
                (!found.is_empty()).then_some((binding, found))
            })
            .collect();

        let mut edges = IndexMap::with_capacity(pending.len());
        for (binding, found) in &pending {
            let mut dependencies = IndexSet::new();
            for (field, text) in found {
                let read =
                    references(text).map_err(|source| evaluation_error(field, text, source))?;
                dependencies.extend(
                    read.iter()
                        .flat_map(|reference| targets(reference, config))
                        .filter(|target| pending.contains_key(target)),
                );
            }
            edges.insert(binding.clone(), dependencies);
        }

        let sequence = order(&edges).map_err(|cycle| {
            let (field, text) = pending
                .get(&cycle[0])
                .and_then(|found| found.first())
                .cloned()
                .unwrap_or_default();
            Error::Evaluation {
                field,
                expression: text,
                source: EvalError::Cycle(cycle.iter().map(Binding::to_string).collect()),
            }
        })?;

        for binding in sequence {
            self.cx.check()?;
            let eval = EvalContext::from_config(config, self.functions.clone());
            let path = binding.to_string();

            match &binding {
                Binding::Field(field) => {
                    let mut text = config.get_string(field);
                    self.field(field, &mut text, &eval, host)?;
                    config.set_string(field, text);
                }
                Binding::Variable(name) => {
                    if let Some(value) = config.variables.get_mut(name) {
                        self.value(&path, value, &eval, host)?;
                    }
                }
                Binding::Local(name) => {
                    if let Some(value) = config.terragrunt.locals.get_mut(name) {
                        self.value(&path, value, &eval, host)?;
                    }
                }
            }
            tracing::trace!(binding = %path, "binding expanded");
            self.bound.push(path);
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn binding(path: &str) -> Binding {
        match path.split_once('.') {
            Some(("variables", name)) => Binding::Variable(name.into()),
            _ => Binding::Field(FIELDS.into_iter().find(|f| *f == path).unwrap()),
        }
    }

    fn graph(edges: &[(&str, &[&str])]) -> IndexMap<Binding, IndexSet<Binding>> {
        edges
            .iter()
            .map(|(from, to)| (binding(from), to.iter().map(|t| binding(t)).collect()))
            .collect()
    }

    #[test]
    fn dependencies_come_first() {
        let edges = graph(&[
            ("variables.name", &["variables.base"]),
            ("variables.base", &["project"]),
            ("project", &[]),
        ]);
        assert_eq!(
            order(&edges).unwrap(),
            [binding("project"), binding("variables.base"), binding("variables.name")]
        );
    }

    #[test]
    fn cycles_are_reported() {
        let edges = graph(&[
            ("variables.a", &["variables.b"]),
            ("variables.b", &["variables.a"]),
        ]);
        let cycle: Vec<_> = order(&edges)
            .unwrap_err()
            .iter()
            .map(Binding::to_string)
            .collect();
        assert_eq!(cycle, ["variables.a", "variables.b", "variables.a"]);
    }

    #[test]
    fn reference_targets() {
        let config = Config {
            variables: IndexMap::from([
                ("tier".to_string(), Value::from("dev")),
                ("region".to_string(), Value::from("override")),
            ]),
            ..Default::default()
        };
        let target = |root: &str, attribute: Option<&str>| -> Vec<String> {
            let reference = Reference {
                root: root.into(),
                attribute: attribute.map(Into::into),
            };
            targets(&reference, &config)
                .iter()
                .map(Binding::to_string)
                .collect()
        };

        assert_eq!(target("var", Some("tier")), ["variables.tier"]);
        assert_eq!(target("region", None), ["variables.region"]);
        assert_eq!(target("project", None), ["project"]);
        assert_eq!(target("terraform", Some("version")), ["terraform.version"]);
        assert_eq!(
            target("terragrunt", None),
            ["terragrunt.version", "terragrunt.config_file"]
        );
        assert!(target("each", None).is_empty());
    }
}
