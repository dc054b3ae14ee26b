//! names a template reads
//!
//! Collected statically with the hcl-edit visitor. Iterator names introduced by a `for`
//! expression are not references.
use super::scan::{self, Segment};
use super::EvalError;
use hcl_edit::expr::{Expression, ForExpr, TraversalOperator};
use hcl_edit::visit::{visit_expr, visit_traversal_operator, Visit};

/// A variable read, with the attribute read from it when the access names one, e.g. `var.tier`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub root: String,
    pub attribute: Option<String>,
}

#[derive(Default)]
struct Collector {
    found: Vec<Reference>,
    scopes: Vec<String>,
}

impl Collector {
    fn push(&mut self, root: &str, attribute: Option<&str>) {
        if self.scopes.iter().any(|scope| scope == root) {
            return;
        }
        let reference = Reference {
            root: root.to_string(),
            attribute: attribute.map(str::to_string),
        };
        if !self.found.contains(&reference) {
            self.found.push(reference);
        }
    }
}

impl Visit for Collector {
    fn visit_expr(&mut self, expr: &Expression) {
        match expr {
            Expression::Variable(var) => self.push(var.as_str(), None),
            Expression::Traversal(traversal) => {
                let Expression::Variable(root) = &traversal.expr else {
                    return visit_expr(self, expr);
                };
                let attribute = match traversal.operators.first().map(|op| op.value()) {
                    Some(TraversalOperator::GetAttr(ident)) => Some(ident.as_str()),
                    _ => None,
                };
                self.push(root.as_str(), attribute);
                for operator in &traversal.operators {
                    visit_traversal_operator(self, operator);
                }
            }
            _ => visit_expr(self, expr),
        }
    }

    fn visit_for_expr(&mut self, node: &ForExpr) {
        self.visit_expr(&node.intro.collection_expr);

        let depth = self.scopes.len();
        self.scopes.extend(node.intro.key_var.iter().map(|var| var.as_str().to_string()));
        self.scopes.push(node.intro.value_var.as_str().to_string());

        if let Some(key_expr) = &node.key_expr {
            self.visit_expr(key_expr);
        }
        self.visit_expr(&node.value_expr);
        if let Some(cond) = &node.cond {
            self.visit_expr(&cond.expr);
        }
        self.scopes.truncate(depth);
    }
}

/// Every reference made by the `${...}` spans of `input`, in order of first use
pub fn references(input: &str) -> Result<Vec<Reference>, EvalError> {
    let mut collector = Collector::default();
    for segment in scan::segments(input)? {
        if let Segment::Interpolation(expression) = segment {
            let parsed =
                hcl_edit::parser::parse_expr(expression).map_err(|e| EvalError::Parse {
                    expression: expression.trim().to_string(),
                    message: e.message().to_string(),
                })?;
            collector.visit_expr(&parsed);
        }
    }
    Ok(collector.found)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn refs(input: &str) -> Vec<(String, Option<String>)> {
        references(input)
            .unwrap()
            .into_iter()
            .map(|r| (r.root, r.attribute))
            .collect()
    }

    fn r(root: &str, attribute: Option<&str>) -> (String, Option<String>) {
        (root.to_string(), attribute.map(str::to_string))
    }

    #[test]
    fn variables_and_attributes() {
        assert_eq!(
            refs("${project}-${var.tier}/${local.names[0]}"),
            [r("project", None), r("var", Some("tier")), r("local", Some("names"))]
        );
    }

    #[test]
    fn nested_templates_and_calls() {
        assert_eq!(
            refs(r#"${upper("${region}-${zone}")}"#),
            [r("region", None), r("zone", None)]
        );
        assert!(refs("plain text").is_empty());
    }

    #[test]
    fn iterators_are_not_references() {
        assert_eq!(
            refs("${[for i, z in zones : \"${z}-${i}-${environment}\" if z != tier]}"),
            [r("zones", None), r("environment", None), r("tier", None)]
        );
    }

    #[test]
    fn malformed_span() {
        assert!(matches!(references("${1 +}"), Err(EvalError::Parse { .. })));
        assert!(matches!(references("${x"), Err(EvalError::Unterminated(_))));
    }
}
