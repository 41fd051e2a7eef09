//! Runtime error taxonomy.
//!
//! Most of these become a diagnostic plus an exit status at the enclosing
//! simple-command boundary; they only abort the shell where POSIX says so
//! (nounset and `${x:?}` in non-interactive shells).

use thiserror::Error;

use crate::environment::EnvError;
use crate::parser::types::ParseError;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Env(#[from] EnvError),

    #[error("{name}: command not found")]
    NotFound { name: String },

    #[error("{name}: {reason}")]
    NotExecutable { name: String, reason: String },

    #[error("{context}: {source}")]
    Redirect {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}: ambiguous redirect")]
    AmbiguousRedirect(String),

    #[error("{0}: bad substitution")]
    BadSubstitution(String),

    /// Generic expansion diagnostic (`${x:?msg}`, bad subscripts, ...).
    #[error("{0}")]
    Expansion(String),

    /// nounset violation.
    #[error("{0}: unbound variable")]
    Unbound(String),

    /// `${x:?message}` failure.
    #[error("{0}")]
    ParamError(String),

    #[error("{0}")]
    Arith(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Sys(#[from] nix::Error),
}

impl ExecError {
    /// The exit status this error maps to when reported.
    pub fn status(&self) -> i32 {
        match self {
            ExecError::Parse(_) => 2,
            ExecError::NotFound { .. } => 127,
            ExecError::NotExecutable { .. } => 126,
            _ => 1,
        }
    }

    /// Errors that terminate a non-interactive shell outright.
    pub fn is_fatal(&self, interactive: bool) -> bool {
        !interactive && matches!(self, ExecError::Unbound(_) | ExecError::ParamError(_))
    }
}
