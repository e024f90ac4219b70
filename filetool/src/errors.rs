//! Error types for filetool.
//!
//! Errors fall into two groups that the pipeline treats very differently:
//!
//! 1. **Run-level errors** abort before any worker is started:
//!    [`ProcessError::Config`] and [`ProcessError::ConfigLoad`].
//! 2. **Per-file errors** are recorded into [`crate::stats::Stats`] keyed by
//!    path and never stop the run: I/O, encoding, format and persist errors.
//!
//! A [`ProcessError::Traversal`] sits in between: it stops the walker from
//! producing more paths, but everything already handed off still completes.
//!
//! ```rust,ignore
//! match filetool::process(&config, reporter) {
//!     Ok(outcome) => // print outcome.stats,
//!     Err(ProcessError::Config(msg)) => // bad arguments, exit non-zero,
//!     Err(e) => // worker spawn or panic
//! }
//! ```
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for file processing operations
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Errors that can occur while processing a directory
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),
    #[error("Failed to walk {path}: {message}")]
    Traversal { path: PathBuf, message: String },
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid UTF-8 in file {path}: {source}")]
    Encoding {
        path: PathBuf,
        source: std::string::FromUtf8Error,
    },
    #[error("Line {line} is not in 'key:value' format: {content}")]
    Format { line: usize, content: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to write {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Worker error: {0}")]
    Worker(String),
}

impl ProcessError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn traversal(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Traversal {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn encoding(path: impl Into<PathBuf>, source: std::string::FromUtf8Error) -> Self {
        Self::Encoding {
            path: path.into(),
            source,
        }
    }

    pub fn format(line: usize, content: impl Into<String>) -> Self {
        Self::Format {
            line,
            content: content.into(),
        }
    }

    pub fn persist(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persist {
            path: path.into(),
            source,
        }
    }

    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }

    /// Classifies an I/O error raised while opening or reading `path`
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::file_not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::Io(err),
        }
    }
}
