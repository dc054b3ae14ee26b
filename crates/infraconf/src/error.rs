//! crate level errors
use crate::context::Interrupted;
use crate::eval::EvalError;
use crate::secrets::SecretError;
use crate::validator::ValidationReport;
use std::fmt;
use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unable to access {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("unsupported config format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },
    #[error("unable to render {format} document")]
    Render {
        format: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("unable to evaluate `{expression}` in {field}")]
    Evaluation {
        field: String,
        expression: String,
        #[source]
        source: EvalError,
    },
    #[error("unable to resolve secret `{key}` for {field}")]
    SecretResolution {
        field: String,
        key: String,
        #[source]
        source: SecretError,
    },
    #[error("lookup key is empty")]
    EmptyKey,
    #[error(transparent)]
    Validation(#[from] ValidationReport),
    #[error("resolution aborted")]
    Cancelled(#[from] Interrupted),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Malformed document, with the position of the problem when the format reports one
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub path: Option<PathBuf>,
    pub location: Option<Location>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    /// Line and column (both 1-based) of a byte offset into `source`
    pub fn of_offset(source: &str, offset: usize) -> Self {
        let before = source.get(..offset).unwrap_or(source);
        let line = before.matches('\n').count() + 1;
        let column = before
            .rfind('\n')
            .map_or(before.len(), |newline| before.len() - newline - 1)
            + 1;
        Self { line, column }
    }
}

impl SyntaxError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            path: None,
            location: None,
            message: message.into(),
        }
    }

    pub fn at(mut self, location: impl Into<Option<Location>>) -> Self {
        self.location = location.into();
        self
    }

    pub fn in_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("syntax error")?;
        if let Some(path) = &self.path {
            write!(f, " in {}", path.display())?;
        }
        if let Some(Location { line, column }) = self.location {
            write!(f, " at line {line}, column {column}")?;
        }
        write!(f, ": {}", self.message)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn offset_to_location() {
        let source = "a = 1\nbb = 2\n";
        assert_eq!(
            Location::of_offset(source, 0),
            Location { line: 1, column: 1 }
        );
        assert_eq!(
            Location::of_offset(source, 9),
            Location { line: 2, column: 4 }
        );
    }

    #[test]
    fn syntax_error_display() {
        let error = SyntaxError::new("unexpected token")
            .at(Location { line: 3, column: 7 })
            .in_file("infra.hcl");
        assert_eq!(
            error.to_string(),
            "syntax error in infra.hcl at line 3, column 7: unexpected token"
        );
    }
}
