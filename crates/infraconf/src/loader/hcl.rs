//! block-structured documents
//!
//! Decoding maps the HCL body onto the same object shape the JSON and YAML documents use:
//! - attributes become fields
//! - an unlabeled block becomes a nested object, repeated unlabeled blocks become a list
//! - a block with one label becomes an entry of a `label -> body` map
//!   (`module "vpc" {}` loads as `module.vpc`, see [crate::config::named])
//! - expressions that are not literals are kept as `${...}` strings for the resolver
//!
//! Rendering writes the well-known sections as blocks and everything else as attributes.
use super::DocumentFormat;
use crate::config::Config;
use crate::error::{Error, Location, Result, SyntaxError};
use crate::eval::scan;
use crate::value::Value;
use crate::visit::VisitStringsMut;
use hcl_edit::structure::{Body, Structure};
use hcl_edit::Span;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Sections rendered as unlabeled blocks
const SECTIONS: &[&str] = &[
    "terraform",
    "terragrunt",
    "backend",
    "authentication",
    "monitoring",
    "security",
    "network",
    "features",
];

/// Named collections rendered as labeled blocks: (field, block identifier)
const LABELED: &[(&str, &str)] = &[
    ("modules", "module"),
    ("providers", "provider"),
    ("outputs", "output"),
];

pub struct Hcl;

impl DocumentFormat for Hcl {
    fn name(&self) -> &'static str {
        "hcl"
    }

    fn parse(&self, source: &str) -> Result<Config, SyntaxError> {
        let body = hcl_edit::parser::parse_body(source).map_err(|e| {
            SyntaxError::new(e.message()).at(Location {
                line: e.location().line(),
                column: e.location().column(),
            })
        })?;

        let mut decoder = Decoder::new();
        let mut object = Value::Object(decoder.body(body));

        if let Some(issue) = decoder.issues.first() {
            let location = issue.offset().map(|offset| Location::of_offset(source, offset));
            return Err(SyntaxError::new(issue.to_string()).at(location));
        }

        let _ = object.visit_strings_mut::<()>(&mut |_: &str, string: &mut String| {
            if string.contains("$${") || string.contains("%%{") {
                *string = unescape_markers(string);
            }
            Ok(())
        });

        serde_json::from_value(serde_json::Value::from(object))
            .map_err(|e| SyntaxError::new(e.to_string()))
    }

    fn render(&self, config: &Config) -> Result<String> {
        let render_error = |e: Box<dyn std::error::Error + Send + Sync>| Error::Render {
            format: "hcl",
            source: e,
        };

        let tree = serde_json::to_value(config).map_err(|e| render_error(e.into()))?;
        let Value::Object(fields) = Value::from(tree) else {
            return Err(render_error("config did not serialize to an object".into()));
        };

        let mut body = hcl::Body::builder();
        for (key, value) in fields {
            if is_empty(&value) {
                continue;
            }

            if let Some((_, ident)) = LABELED.iter().find(|(field, _)| *field == key) {
                for (label, entry) in labeled_entries(value) {
                    body = body.add_block(
                        hcl::Block::builder(*ident)
                            .add_label(label)
                            .add_attributes(attributes(entry))
                            .build(),
                    );
                }
            } else if SECTIONS.contains(&key.as_str()) {
                body = body.add_block(
                    hcl::Block::builder(key)
                        .add_attributes(attributes(value))
                        .build(),
                );
            } else {
                body = body.add_attribute((key, hcl::Expression::from(hcl::Value::from(value))));
            }
        }

        hcl::format::to_string(&body.build()).map_err(|e| render_error(e.into()))
    }
}

/// `(label, body)` pairs of a named collection, from either its list or its map form
fn labeled_entries(value: Value) -> Vec<(String, Value)> {
    match value {
        Value::Object(entries) => entries.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(mut fields) => {
                    let name = fields
                        .shift_remove("name")
                        .map(|name| name.to_text())
                        .unwrap_or_default();
                    (name, Value::Object(fields))
                }
                other => (String::new(), other),
            })
            .collect(),
        other => vec![(String::new(), other)],
    }
}

fn attributes(value: Value) -> Vec<hcl::Attribute> {
    let Value::Object(fields) = value else {
        return Vec::new();
    };

    fields
        .into_iter()
        .filter(|(_, value)| !is_empty(value))
        .map(|(key, value)| hcl::Attribute::new(key, hcl::Value::from(value)))
        .collect()
}

/// Values equal to a field default are not written
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Boolean(b) => !b,
        Value::Integer(i) => *i == 0,
        Value::Decimal(d) => *d == 0.0,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.values().all(is_empty),
    }
}

/// Turns `$${` and `%%{` back into literal markers, leaving `${...}` spans untouched
fn unescape_markers(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut index = 0;

    while index < input.len() {
        let rest = &input[index..];
        if rest.starts_with("$${") || rest.starts_with("%%{") {
            output.push_str(&rest[1..3]);
            index += 3;
        } else if rest.starts_with("${") {
            let end = scan::span_end(input, index).map_or(input.len(), |close| close + 1);
            output.push_str(&input[index..end]);
            index = end;
        } else {
            let next = rest.chars().next().map_or(1, char::len_utf8);
            output.push_str(&rest[..next]);
            index += next;
        }
    }

    output
}

#[derive(Clone, Copy, PartialEq)]
enum Shape {
    Attribute,
    Unlabeled,
    Labeled,
}

#[derive(derive_new::new)]
struct Decoder {
    #[new(default)]
    issues: Vec<Issue>,
}

impl Decoder {
    fn log(&mut self, issue: Issue) {
        tracing::trace!(?issue, "issue found");
        self.issues.push(issue);
    }

    fn body(&mut self, body: Body) -> IndexMap<String, Value> {
        let mut object = IndexMap::new();
        let mut shapes: HashMap<String, Shape> = HashMap::new();

        for structure in body {
            let offset = structure.span().map(|span| span.start);

            match structure {
                Structure::Attribute(attribute) => {
                    let name = attribute.key.value().to_string();
                    if let Some(existing) = shapes.get(&name) {
                        self.log(match existing {
                            Shape::Attribute => Issue::DuplicateAttribute { name, offset },
                            _ => Issue::MixedAttributeAndBlock { name, offset },
                        });
                        continue;
                    }

                    shapes.insert(name.clone(), Shape::Attribute);
                    object.insert(name, Value::from(hcl::Expression::from(attribute.value)));
                }
                Structure::Block(block) => {
                    let ident = block.ident.value().to_string();
                    let shape = match block.labels.len() {
                        0 => Shape::Unlabeled,
                        1 => Shape::Labeled,
                        _ => {
                            self.log(Issue::TooManyLabels {
                                block: ident,
                                offset,
                            });
                            continue;
                        }
                    };

                    match shapes.get(&ident) {
                        Some(Shape::Attribute) => {
                            self.log(Issue::MixedAttributeAndBlock {
                                name: ident,
                                offset,
                            });
                            continue;
                        }
                        Some(existing) if *existing != shape => {
                            self.log(Issue::MixedBlockLabels {
                                block: ident,
                                offset,
                            });
                            continue;
                        }
                        _ => {}
                    }
                    shapes.insert(ident.clone(), shape);

                    let label = block.labels.first().map(|label| label.as_str().to_string());
                    let content = Value::Object(self.body(block.body));

                    match label {
                        None => match object.get_mut(&ident) {
                            Some(Value::Array(items)) => items.push(content),
                            Some(existing) => {
                                let first = std::mem::take(existing);
                                *existing = Value::Array(vec![first, content]);
                            }
                            None => {
                                object.insert(ident, content);
                            }
                        },
                        Some(label) => {
                            let entries = object
                                .entry(ident.clone())
                                .or_insert_with(|| Value::Object(IndexMap::new()));
                            let Value::Object(entries) = entries else {
                                continue;
                            };

                            if entries.contains_key(&label) {
                                self.log(Issue::DuplicateLabel {
                                    block: ident,
                                    label,
                                    offset,
                                });
                                continue;
                            }
                            entries.insert(label, content);
                        }
                    }
                }
            }
        }

        object
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
enum Issue {
    #[error("attribute `{name}` is defined more than once")]
    DuplicateAttribute { name: String, offset: Option<usize> },
    #[error("`{name}` is used both as attribute and as block")]
    MixedAttributeAndBlock { name: String, offset: Option<usize> },
    #[error("block `{block}` has more than one label")]
    TooManyLabels { block: String, offset: Option<usize> },
    #[error("block `{block}` is used both with and without a label")]
    MixedBlockLabels { block: String, offset: Option<usize> },
    #[error("duplicate label `{label}` for block `{block}`")]
    DuplicateLabel {
        block: String,
        label: String,
        offset: Option<usize>,
    },
}

impl Issue {
    fn offset(&self) -> Option<usize> {
        match self {
            Issue::DuplicateAttribute { offset, .. }
            | Issue::MixedAttributeAndBlock { offset, .. }
            | Issue::TooManyLabels { offset, .. }
            | Issue::MixedBlockLabels { offset, .. }
            | Issue::DuplicateLabel { offset, .. } => *offset,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOCUMENT: &str = r#"
project     = "acme-prod"
region      = "us-east1"
environment = "prod"

terraform {
  version     = "1.5.7"
  parallelism = 10
}

backend {
  type   = "gcs"
  bucket = "acme-tf-state"
}

provider "google" {
  source  = "hashicorp/google"
  version = "~> 5.0"
  project = project
}

module "vpc" {
  source = "./modules/vpc"
}

module "gke" {
  source     = "./modules/gke"
  depends_on = ["vpc"]
}

network {
  subnet "a" {
    cidr = "10.0.0.0/24"
  }
  route "egress" {
    dest_range       = "0.0.0.0/0"
    next_hop_gateway = "default-internet-gateway"
  }
}

variables = {
  endpoint = "https://${project}.example.com"
  literal  = "cost: $${amount}"
}
"#;

    #[test]
    fn block_mapping() {
        let config = Hcl.parse(DOCUMENT).unwrap();

        assert_eq!(config.project, "acme-prod");
        assert_eq!(config.terraform.parallelism, 10);
        assert_eq!(config.backend.kind, "gcs");
        assert_eq!(
            config
                .modules
                .iter()
                .map(|m| m.name.as_str())
                .collect::<Vec<_>>(),
            vec!["vpc", "gke"]
        );
        assert_eq!(config.modules[1].depends_on, vec!["vpc".to_string()]);
        assert_eq!(config.network.subnets[0].name, "a");
        assert_eq!(config.network.routes[0].next_hops().count(), 1);
    }

    #[test]
    fn expressions_become_templates() {
        let config = Hcl.parse(DOCUMENT).unwrap();

        assert_eq!(config.providers["google"].project, "${project}");
        assert_eq!(
            config.variables["endpoint"],
            Value::from("https://${project}.example.com")
        );
        assert_eq!(config.variables["literal"], Value::from("cost: ${amount}"));
    }

    #[test]
    fn duplicate_label_is_located() {
        let error = Hcl
            .parse("module \"a\" {}\n\nmodule \"a\" {}\n")
            .unwrap_err();

        assert_eq!(error.message, "duplicate label `a` for block `module`");
        assert_eq!(error.location, Some(Location { line: 3, column: 1 }));
    }

    #[test]
    fn two_labels_are_rejected() {
        let error = Hcl.parse("module \"a\" \"b\" {}").unwrap_err();
        assert_eq!(error.message, "block `module` has more than one label");
        assert_eq!(error.location, Some(Location { line: 1, column: 1 }));
    }

    #[test]
    fn duplicate_attribute() {
        let error = Hcl.parse("project = \"a\"\nproject = \"b\"").unwrap_err();
        assert_eq!(error.location.map(|l| l.line), Some(2));
    }

    #[test]
    fn parse_error_location() {
        let error = Hcl.parse("project = ").unwrap_err();
        assert_eq!(error.location.map(|l| l.line), Some(1));
    }

    #[test]
    fn repeated_unlabeled_blocks_form_a_list() {
        let config = Hcl
            .parse(
                r#"
terragrunt {
  hook {
    name     = "fmt"
    commands = ["plan"]
  }
  hook {
    name     = "lint"
    commands = ["apply"]
  }
}
"#,
            )
            .unwrap();

        assert_eq!(config.terragrunt.hooks.len(), 2);
        assert_eq!(config.terragrunt.hooks[1].name, "lint");
    }

    #[test]
    fn render_round_trip() {
        let config = Hcl.parse(DOCUMENT).unwrap();
        let rendered = Hcl.render(&config).unwrap();

        assert!(rendered.contains("module \"vpc\" {"), "{rendered}");
        assert!(rendered.contains("provider \"google\" {"), "{rendered}");
        assert_eq!(Hcl.parse(&rendered).unwrap(), config);
    }

    #[test]
    fn marker_unescaping() {
        assert_eq!(unescape_markers("a $${b} ${c} %%{d}"), "a ${b} ${c} %{d}");
        assert_eq!(
            unescape_markers(r#"${format("$${x}", y)}"#),
            r#"${format("$${x}", y)}"#
        );
    }
}
