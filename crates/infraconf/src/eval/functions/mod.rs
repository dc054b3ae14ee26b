//! function registry
//!
//! Every function declares its parameters up front. [FunctionRegistry::call] checks arity and
//! argument kinds before a function body runs, so bodies can rely on their argument shapes.
//!
//! Pure functions only transform their arguments. Contextual functions reach the outside
//! world (environment, secrets, files) through the [Host] of the current resolve.
mod collections;
mod contextual;
mod encoding;
mod numeric;
mod strings;

use super::EvalError;
use crate::context::Interrupted;
use crate::secrets::SecretError;
use crate::value::{Kind, Value};
use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outside world as seen by contextual functions
pub trait Host {
    fn env_var(&self, name: &str) -> Option<String>;
    fn secret(&self, key: &str) -> Result<String, SecretError>;
    /// Document the resolved config was loaded from
    fn source_path(&self) -> Option<&Path>;
    fn project(&self) -> String;
    /// Loads another document as a value, failing on include cycles
    fn read_config(&self, path: &Path) -> Result<Value, FunctionError>;
    fn check(&self) -> Result<(), Interrupted>;
}

/// [Host] without environment, secrets or source document
#[derive(Debug, Default, Clone, Copy)]
pub struct Detached;

impl Host for Detached {
    fn env_var(&self, _name: &str) -> Option<String> {
        None
    }

    fn secret(&self, _key: &str) -> Result<String, SecretError> {
        Err(SecretError::NotConfigured)
    }

    fn source_path(&self) -> Option<&Path> {
        None
    }

    fn project(&self) -> String {
        String::new()
    }

    fn read_config(&self, path: &Path) -> Result<Value, FunctionError> {
        Err(FunctionError::Failed(format!(
            "cannot read {} without a resolver",
            path.display()
        )))
    }

    fn check(&self) -> Result<(), Interrupted> {
        Ok(())
    }
}

/// Everything a function body can reach besides its arguments
pub struct Call<'a> {
    pub host: &'a dyn Host,
    pub functions: &'a FunctionRegistry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    pub name: &'static str,
    /// `None` accepts any kind
    pub kind: Option<Kind>,
}

impl Param {
    pub const fn new(name: &'static str, kind: Kind) -> Self {
        Self {
            name,
            kind: Some(kind),
        }
    }

    pub const fn any(name: &'static str) -> Self {
        Self { name, kind: None }
    }

    pub const fn string(name: &'static str) -> Self {
        Self::new(name, Kind::String)
    }

    pub const fn number(name: &'static str) -> Self {
        Self::new(name, Kind::Number)
    }

    pub const fn list(name: &'static str) -> Self {
        Self::new(name, Kind::List)
    }

    pub const fn object(name: &'static str) -> Self {
        Self::new(name, Kind::Object)
    }

    pub const fn bool(name: &'static str) -> Self {
        Self::new(name, Kind::Bool)
    }
}

pub trait Function: Send + Sync {
    fn name(&self) -> &str;
    fn params(&self) -> &[Param];

    /// Parameter accepted any number of times after the fixed ones
    fn variadic(&self) -> Option<&Param> {
        None
    }

    fn invoke(&self, args: Vec<Value>, call: &Call<'_>) -> Result<Value, FunctionError>;
}

pub type FuncBody = fn(Vec<Value>, &Call<'_>) -> Result<Value, FunctionError>;

/// A [Function] assembled from a plain function pointer
#[derive(Clone)]
pub struct FuncDef {
    name: &'static str,
    params: Vec<Param>,
    variadic: Option<Param>,
    body: FuncBody,
}

impl FuncDef {
    pub fn new(name: &'static str, body: FuncBody) -> Self {
        Self {
            name,
            params: Vec::new(),
            variadic: None,
            body,
        }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn variadic(mut self, param: Param) -> Self {
        self.variadic = Some(param);
        self
    }
}

impl fmt::Debug for FuncDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("variadic", &self.variadic)
            .finish()
    }
}

impl Function for FuncDef {
    fn name(&self) -> &str {
        self.name
    }

    fn params(&self) -> &[Param] {
        &self.params
    }

    fn variadic(&self) -> Option<&Param> {
        self.variadic.as_ref()
    }

    fn invoke(&self, args: Vec<Value>, call: &Call<'_>) -> Result<Value, FunctionError> {
        (self.body)(args, call)
    }
}

#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: IndexMap<String, Arc<dyn Function>>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.functions.keys()).finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in function
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for def in numeric::functions()
            .into_iter()
            .chain(strings::functions())
            .chain(collections::functions())
            .chain(encoding::functions())
            .chain(contextual::functions())
        {
            registry.register(def);
        }
        registry
    }

    /// Adds a function, replacing any function with the same name
    pub fn register(&mut self, function: impl Function + 'static) -> &mut Self {
        self.functions
            .insert(function.name().to_string(), Arc::new(function));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Function>> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Checks `args` against the declared signature, then invokes the function
    pub fn call(&self, name: &str, args: Vec<Value>, host: &dyn Host) -> Result<Value, EvalError> {
        let function = self
            .get(name)
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;

        let failed = |source| EvalError::Function {
            name: name.to_string(),
            source,
        };

        let args = check_args(function.as_ref(), args).map_err(failed)?;
        host.check().map_err(EvalError::Interrupted)?;
        tracing::trace!(function = name, "call");

        function
            .invoke(
                args,
                &Call {
                    host,
                    functions: self,
                },
            )
            .map_err(failed)
    }
}

fn check_args(function: &dyn Function, args: Vec<Value>) -> Result<Vec<Value>, FunctionError> {
    let params = function.params();
    let variadic = function.variadic();

    let arity_ok = match variadic {
        Some(_) => args.len() >= params.len(),
        None => args.len() == params.len(),
    };
    if !arity_ok {
        return Err(FunctionError::Arity {
            expected: params.len(),
            variadic: variadic.is_some(),
            got: args.len(),
        });
    }

    args.into_iter()
        .enumerate()
        .map(|(index, arg)| {
            let param = params.get(index).or(variadic).copied();
            match param {
                Some(param) => coerce(param, arg),
                None => Ok(arg),
            }
        })
        .collect()
}

/// Numbers and booleans are accepted where a string is expected, as their text form
fn coerce(param: Param, arg: Value) -> Result<Value, FunctionError> {
    let Some(expected) = param.kind else {
        return Ok(arg);
    };

    match (expected, arg) {
        (expected, arg) if arg.kind() == expected => Ok(arg),
        (Kind::String, arg @ (Value::Integer(_) | Value::Decimal(_) | Value::Boolean(_))) => {
            Ok(Value::String(arg.to_text()))
        }
        (Kind::Number, Value::String(text)) => text
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .or_else(|_| text.trim().parse::<f64>().map(Value::Decimal))
            .map_err(|_| FunctionError::ArgType {
                param: param.name,
                expected,
                got: Kind::String,
            }),
        (expected, arg) => Err(FunctionError::ArgType {
            param: param.name,
            expected,
            got: arg.kind(),
        }),
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FunctionError {
    #[error("expected {expected}{} argument(s), got {got}", or_more(.variadic))]
    Arity {
        expected: usize,
        variadic: bool,
        got: usize,
    },
    #[error("argument `{param}` must be {expected}, got {got}")]
    ArgType {
        param: &'static str,
        expected: Kind,
        got: Kind,
    },
    #[error("{0}")]
    Failed(String),
    #[error("unable to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Secret(#[from] SecretError),
    #[error("{0} is disabled for security")]
    Disabled(&'static str),
    #[error("config include cycle: {}", chain(.0))]
    Cycle(Vec<PathBuf>),
    #[error("unable to load {}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: Box<crate::Error>,
    },
    #[error("unable to evaluate template")]
    Template(#[source] Box<EvalError>),
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

fn or_more(variadic: &bool) -> &'static str {
    if *variadic {
        " or more"
    } else {
        ""
    }
}

fn chain(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl FunctionError {
    pub(crate) fn failed(message: impl Into<String>) -> Self {
        FunctionError::Failed(message.into())
    }
}

/// Pops the next argument; signatures are checked before bodies run
pub(crate) fn next(args: &mut std::vec::IntoIter<Value>) -> Value {
    args.next().unwrap_or_default()
}

pub(crate) fn string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_text(),
    }
}

pub(crate) fn list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

pub(crate) fn object(value: Value) -> IndexMap<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => IndexMap::new(),
    }
}

pub(crate) fn number(value: &Value) -> f64 {
    value.as_f64().unwrap_or_default()
}

/// Most elements or characters one call may generate
pub(crate) const GENERATED_LIMIT: usize = 1 << 20;

pub(crate) fn integer(value: &Value, param: &'static str) -> Result<i64, FunctionError> {
    value
        .as_i64()
        .ok_or_else(|| FunctionError::failed(format!("`{param}` must be a whole number")))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
        FunctionRegistry::standard().call(name, args, &Detached)
    }

    #[test]
    fn arity_is_checked() {
        let error = call("upper", vec![]).unwrap_err();
        assert_eq!(error.to_string(), "call to `upper` failed");
        assert!(matches!(
            error,
            EvalError::Function {
                source: FunctionError::Arity { expected: 1, got: 0, .. },
                ..
            }
        ));
    }

    #[test]
    fn kinds_are_checked() {
        let error = call("keys", vec![Value::from("nope")]).unwrap_err();
        assert!(matches!(
            error,
            EvalError::Function {
                source: FunctionError::ArgType {
                    expected: Kind::Object,
                    got: Kind::String,
                    ..
                },
                ..
            }
        ));
    }

    #[test]
    fn numbers_coerce_to_strings() {
        assert_eq!(call("upper", vec![Value::Integer(1)]).unwrap(), Value::from("1"));
        assert_eq!(
            call("abs", vec![Value::from("-3")]).unwrap(),
            Value::Integer(3)
        );
    }

    #[test]
    fn unknown_function() {
        assert!(matches!(
            call("nope", vec![]),
            Err(EvalError::UnknownFunction(name)) if name == "nope"
        ));
    }

    #[test]
    fn custom_functions_override() {
        let mut registry = FunctionRegistry::standard();
        registry.register(
            FuncDef::new("upper", |_, _| Ok(Value::from("custom"))).param(Param::any("s")),
        );
        assert_eq!(
            registry
                .call("upper", vec![Value::from("x")], &Detached)
                .unwrap(),
            Value::from("custom")
        );
    }

    #[test]
    fn run_cmd_is_disabled() {
        let error = call("run_cmd", vec![Value::from("ls")]).unwrap_err();
        let EvalError::Function { source, .. } = error else {
            panic!("expected a function error");
        };
        assert_eq!(source.to_string(), "run_cmd is disabled for security");
    }
}
