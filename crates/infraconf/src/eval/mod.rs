//! the `${...}` expression language
//!
//! A span's inner text is an HCL expression. It is parsed with hcl-edit and evaluated against an
//! [EvalContext]: the variable bindings derived from a [Config] plus a [FunctionRegistry].
//! Expansion is a single pass; text produced by a span is never scanned again, so bindings that
//! are themselves templates have to be expanded before they are bound.
pub mod functions;
mod interpreter;
pub mod references;
pub mod scan;

pub use functions::{
    Call, Detached, FuncBody, FuncDef, Function, FunctionError, FunctionRegistry, Host, Param,
};

use crate::config::Config;
use crate::context::Interrupted;
use crate::value::Value;
use indexmap::IndexMap;
use interpreter::Interpreter;
use scan::Segment;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum EvalError {
    #[error("unable to parse `{expression}`: {message}")]
    Parse { expression: String, message: String },
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("call to `{name}` failed")]
    Function {
        name: String,
        #[source]
        source: FunctionError,
    },
    #[error("{0}")]
    TypeMismatch(String),
    #[error("missing attribute `{0}`")]
    MissingAttribute(String),
    #[error("index {index} is out of bounds for a list of length {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("division by zero")]
    DivisionByZero,
    #[error("reference cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
    #[error(transparent)]
    Unterminated(#[from] scan::Unterminated),
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

/// Variable bindings and functions an expression is evaluated against
#[derive(Debug, Clone)]
pub struct EvalContext {
    variables: IndexMap<String, Value>,
    functions: Arc<FunctionRegistry>,
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new(Arc::new(FunctionRegistry::standard()))
    }
}

impl EvalContext {
    pub fn new(functions: Arc<FunctionRegistry>) -> Self {
        Self {
            variables: IndexMap::new(),
            functions,
        }
    }

    /// Bindings for `config`
    ///
    /// Top level: `project`, `region`, `zone`, `environment`, `terraform`, `terragrunt`,
    /// `local` (terragrunt locals), `var` (all variables) and every variable by its own name.
    /// A variable named like a built-in binding shadows it.
    pub fn from_config(config: &Config, functions: Arc<FunctionRegistry>) -> Self {
        let mut cx = Self::new(functions);

        cx.declare_var("project", config.project.as_str());
        cx.declare_var("region", config.region.as_str());
        cx.declare_var("zone", config.zone.as_str());
        cx.declare_var("environment", config.environment.as_str());
        cx.declare_var(
            "terraform",
            IndexMap::from([
                ("version".to_string(), Value::from(config.terraform.version.as_str())),
                (
                    "working_dir".to_string(),
                    Value::from(config.terraform.working_dir.as_str()),
                ),
                (
                    "parallelism".to_string(),
                    Value::Integer(config.terraform.parallelism),
                ),
            ]),
        );
        cx.declare_var(
            "terragrunt",
            IndexMap::from([
                ("version".to_string(), Value::from(config.terragrunt.version.as_str())),
                (
                    "config_file".to_string(),
                    Value::from(config.terragrunt.config_file.as_str()),
                ),
                (
                    "max_retries".to_string(),
                    Value::Integer(config.terragrunt.max_retries),
                ),
            ]),
        );
        cx.declare_var("local", config.terragrunt.locals.clone());
        cx.declare_var("var", config.variables.clone());

        for (name, value) in &config.variables {
            cx.declare_var(name.clone(), value.clone());
        }

        cx
    }

    pub fn declare_var(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn var(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> &IndexMap<String, Value> {
        &self.variables
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Evaluates a bare expression, e.g. `upper(project)`
    pub fn evaluate(&self, expression: &str, host: &dyn Host) -> Result<Value, EvalError> {
        let parsed = parse_expression(expression)?;
        Interpreter::new(&self.variables, &self.functions, host).evaluate(&parsed)
    }

    /// Replaces every `${...}` span of `input` with the canonical text of its value
    pub fn expand(&self, input: &str, host: &dyn Host) -> Result<String, EvalError> {
        let mut output = String::with_capacity(input.len());
        for segment in scan::segments(input)? {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Interpolation(expression) => {
                    output.push_str(&self.evaluate(expression, host)?.to_text())
                }
            }
        }
        Ok(output)
    }

    /// Like [EvalContext::expand], but an input that is exactly one span keeps the value's type
    pub fn expand_value(&self, input: &str, host: &dyn Host) -> Result<Value, EvalError> {
        match scan::segments(input)?.as_slice() {
            [Segment::Interpolation(expression)] => self.evaluate(expression, host),
            _ => self.expand(input, host).map(Value::String),
        }
    }
}

fn parse_expression(expression: &str) -> Result<hcl::Expression, EvalError> {
    hcl_edit::parser::parse_expr(expression)
        .map(hcl::Expression::from)
        .map_err(|e| EvalError::Parse {
            expression: expression.trim().to_string(),
            message: e.message().to_string(),
        })
}

/// Renders an HCL template (`${...}` interpolations and `%{...}` directives) with `variables`
pub(crate) fn render_template(
    template: &str,
    variables: &IndexMap<String, Value>,
    functions: &FunctionRegistry,
    host: &dyn Host,
) -> Result<String, EvalError> {
    let parsed = hcl_edit::parser::parse_template(template)
        .map(hcl::Template::from)
        .map_err(|e| EvalError::Parse {
            expression: template.lines().next().unwrap_or_default().to_string(),
            message: e.message().to_string(),
        })?;

    Interpreter::new(variables, functions, host)
        .render(&parsed)
        .map(|value| value.to_text())
}
