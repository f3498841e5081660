use std::fmt::{self, Display, Formatter};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IOError: {0}")]
    IO(#[from] std::io::Error),
    #[error("IOError: malformed token dump: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SyntaxError at token {index} ({token}): {message}")]
    Syntax {
        message: String,
        index: usize,
        token: String,
    },
    #[error("{kind} at token {index}: {message}")]
    Runtime {
        kind: RuntimeErrorKind,
        message: String,
        index: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    Name,
    Type,
    Arithmetic,
    Arity,
    Input,
    Limit,
}

impl Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self {
            RuntimeErrorKind::Name => "NameError",
            RuntimeErrorKind::Type => "TypeError",
            RuntimeErrorKind::Arithmetic => "ArithmeticError",
            RuntimeErrorKind::Arity => "ArityError",
            RuntimeErrorKind::Input => "InputError",
            RuntimeErrorKind::Limit => "LimitError",
        };
        write!(f, "{}", label)
    }
}

impl Error {
    /// Taxonomy label of this error, e.g. `SyntaxError` or `NameError`.
    pub fn kind_name(&self) -> String {
        match self {
            Error::IO(_) | Error::Json(_) => "IOError".to_string(),
            Error::Syntax { .. } => "SyntaxError".to_string(),
            Error::Runtime { kind, .. } => kind.to_string(),
        }
    }

    pub fn runtime_kind(&self) -> Option<RuntimeErrorKind> {
        match self {
            Error::Runtime { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Index of the offending token in the full token sequence, if any.
    pub fn token_index(&self) -> Option<usize> {
        match self {
            Error::Syntax { index, .. } | Error::Runtime { index, .. } => Some(*index),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn syntax_error<T>(message: impl Into<String>, index: usize, token: &str) -> Result<T> {
    Err(Error::Syntax {
        message: message.into(),
        index,
        token: token.to_string(),
    })
}

pub fn runtime_error<T>(kind: RuntimeErrorKind, message: impl Into<String>, index: usize) -> Result<T> {
    Err(Error::Runtime {
        kind,
        message: message.into(),
        index,
    })
}
