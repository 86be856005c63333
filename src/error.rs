//! Error taxonomy shared by every stage of an update run.
//!
//! Configuration errors are fatal to the whole run when they are raised by
//! the validation phase. Every other variant is scoped to a single project:
//! the orchestrator records it against the project and moves on.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = UpdateError> = std::result::Result<T, E>;

/// Coarse category of an [`UpdateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Io,
    Repository,
    NotFound,
}

/// Errors raised while loading configuration or processing a project.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A manifest or configuration file could not be read or written.
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An underlying version-control operation failed.
    #[error("repository error: {message}")]
    Repository { message: String },

    /// An expected branch or ref is absent and may not be created.
    #[error("not found: {what}")]
    NotFound { what: String },
}

impl UpdateError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Wrap a git2 error with the operation that produced it.
    pub fn from_git2(err: git2::Error, context: &str) -> Self {
        Self::repository(format!("{}... {}", context, err.message()))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Io { .. } => ErrorKind::Io,
            Self::Repository { .. } => ErrorKind::Repository,
            Self::NotFound { .. } => ErrorKind::NotFound,
        }
    }
}

impl From<git2::Error> for UpdateError {
    fn from(err: git2::Error) -> Self {
        Self::repository(err.message().to_string())
    }
}
