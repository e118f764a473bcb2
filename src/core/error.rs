//! Domain-specific error types and error handling utilities.
//!
//! This module defines [`SyncError`] which covers every failure mode of a sync
//! cycle. It uses `thiserror` for ergonomic error definitions and includes
//! constructors for the common failure scenarios.
//!
//! # Public API
//! - [`SyncError`]: Main error enum covering all failure modes
//! - [`Result<T>`]: Type alias for `std::result::Result<T, SyncError>`
//!
//! # Error Categories
//! - **Configuration**: missing or malformed variables, failed validation
//! - **Transient**: HTTP transport failures, git network errors, rejected pushes
//! - **Filesystem**: I/O errors carrying the offending path
//! - **Control flow**: cancellation, stage wrappers and partial progress

use std::path::PathBuf;
use thiserror::Error;

/// Domain-specific error types for grafana-git-sync
#[derive(Error, Debug)]
pub enum SyncError {
    // Configuration errors
    #[error("required environment variable {name} is not set")]
    MissingVariable { name: &'static str },

    #[error("invalid value for {name}: '{value}' ({reason})")]
    InvalidVariable {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Filesystem errors
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to walk '{path}': {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    // Serialization errors
    #[error("failed to encode {context}: {source}")]
    Encode {
        context: String,
        source: serde_json::Error,
    },

    #[error("failed to decode {context}: {source}")]
    Decode {
        context: String,
        source: serde_json::Error,
    },

    // Dashboard source errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Grafana rejected credentials ({status}) for {url}")]
    GrafanaAuth { status: u16, url: String },

    #[error("Grafana returned {status} for {url}")]
    GrafanaStatus { status: u16, url: String },

    // Version-control errors
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("push of {branch} rejected: {message}")]
    PushRejected { branch: String, message: String },

    // Control flow
    #[error("operation cancelled")]
    Cancelled,

    #[error("{operation} failed: {source}")]
    Operation {
        operation: String,
        source: Box<SyncError>,
    },

    #[error("aborted after {written} written and {deleted} deleted: {source}")]
    Partial {
        written: usize,
        deleted: usize,
        source: Box<SyncError>,
    },
}

/// Convenience type alias for Results using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Create an I/O error tagged with the path it happened at
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a directory walk error
    pub fn walk(path: impl Into<PathBuf>, source: walkdir::Error) -> Self {
        Self::Walk {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid variable error
    pub fn invalid_variable(
        name: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidVariable {
            name,
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a generic configuration validation error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create an encode error
    pub fn encode(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Encode {
            context: context.into(),
            source,
        }
    }

    /// Create a decode error
    pub fn decode(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            context: context.into(),
            source,
        }
    }

    /// Wrap an error with the name of the stage or operation that produced it
    pub fn operation(operation: impl Into<String>, source: SyncError) -> Self {
        Self::Operation {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// Wrap an error with the progress made before it occurred
    pub fn partial(written: usize, deleted: usize, source: SyncError) -> Self {
        Self::Partial {
            written,
            deleted,
            source: Box::new(source),
        }
    }

    /// True if this error, or any error it wraps, is a cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Operation { source, .. } | Self::Partial { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// True for failures worth retrying: network, remote and push races
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::PushRejected { .. } | Self::GrafanaStatus { .. } => true,
            Self::Git(e) => matches!(
                e.class(),
                git2::ErrorClass::Net | git2::ErrorClass::Ssh | git2::ErrorClass::Http
            ),
            Self::Operation { source, .. } | Self::Partial { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Files already affected when an apply phase aborted, `(written, deleted)`
    pub fn progress(&self) -> Option<(usize, usize)> {
        match self {
            Self::Partial {
                written, deleted, ..
            } => Some((*written, *deleted)),
            Self::Operation { source, .. } => source.progress(),
            _ => None,
        }
    }
}
