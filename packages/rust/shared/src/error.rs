//! Error types for contentpipe.
//!
//! Library crates use [`ContentPipeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for run-level diagnostics.
//!
//! Every variant belongs to one [`ErrorKind`], which decides how the pipeline
//! runner reports a record: data problems skip it, infrastructure problems
//! fail it (retryable on a later run), programming errors fail it loudly.

use std::path::PathBuf;

/// Top-level error type for all contentpipe operations.
#[derive(Debug, thiserror::Error)]
pub enum ContentPipeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP transport error against any collaborator.
    #[error("network error: {0}")]
    Network(String),

    /// An external call exceeded its time bound.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Record store read/write error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Text generation failure (quota, auth, malformed response).
    #[error("generation error: {0}")]
    Generation(String),

    /// Content fetch failure (non-2xx or transport fault).
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Publishing target rejected or failed the post.
    #[error("publish error: {0}")]
    Publish(String),

    /// Response or document parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filter formula syntax error.
    #[error("formula error at offset {offset}: {message}")]
    Formula { offset: usize, message: String },

    /// Markdown/HTML conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A record lacks a field its processor requires.
    #[error("missing field: {name}")]
    MissingField { name: String },

    /// Record data is present but unusable.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A caller broke an API contract (e.g. nothing to persist).
    #[error("{message}")]
    Contract { message: String },
}

/// How a failure should be treated at the per-record boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing/malformed record data. The record is skipped.
    Data,
    /// Collaborator fault (network, timeout, auth, quota). The record fails.
    Infrastructure,
    /// Contract violation. The record fails and the error is logged loudly.
    Programming,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ContentPipeError>;

impl ContentPipeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a formula syntax error at a byte offset.
    pub fn formula(offset: usize, msg: impl Into<String>) -> Self {
        Self::Formula {
            offset,
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a missing-field error for the named record field.
    pub fn missing_field(name: impl Into<String>) -> Self {
        Self::MissingField { name: name.into() }
    }

    /// Create a contract-violation error.
    pub fn contract(msg: impl Into<String>) -> Self {
        Self::Contract {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error for per-record reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField { .. } | Self::Validation { .. } => ErrorKind::Data,
            Self::Contract { .. } => ErrorKind::Programming,
            _ => ErrorKind::Infrastructure,
        }
    }
}
