//! Error types for docmesh.
//!
//! Library crates use [`DocmeshError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all docmesh operations.
#[derive(Debug, thiserror::Error)]
pub enum DocmeshError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Front matter or document parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A transformer declares a stage outside the fixed stage set.
    #[error("transform {transform:?} has invalid stage {stage:?}")]
    InvalidStage { transform: String, stage: String },

    /// Transformers within one stage depend on each other in a loop.
    #[error("circular dependency detected in stage {stage}: {}", .transforms.join(", "))]
    CircularDependency {
        stage: String,
        transforms: Vec<String>,
    },

    /// The same transformer name appears twice in the set being ordered.
    #[error("duplicate transform name {name:?}")]
    DuplicateTransform { name: String },

    /// A pipeline filter excluded every registered transformer.
    #[error("no transforms matched the filter")]
    EmptyFilter,

    /// A transformer failed while processing one document.
    #[error("transform {transform:?} failed for {document}: {message}")]
    Transform {
        document: String,
        transform: String,
        message: String,
    },

    /// Data validation error (dependency report, schema mismatch, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Encoding a document or report failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocmeshError>;

impl DocmeshError {
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

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
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

    /// Attribute a failure to a (document, transformer) pair.
    pub fn transform(
        document: impl Into<String>,
        transform: impl Into<String>,
        msg: impl std::fmt::Display,
    ) -> Self {
        Self::Transform {
            document: document.into(),
            transform: transform.into(),
            message: msg.to_string(),
        }
    }

    /// Whether this error came from a same-stage dependency cycle.
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }
}
