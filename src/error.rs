//! Crate-level error type.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::generate::GenerateError;

/// Errors that abort a fuzzing run before or outside the loop.
///
/// Per-iteration failures (spawn errors, timeouts) are verdicts, not errors.
#[derive(Debug, Error)]
pub enum FuzzError {
    /// Invalid or unreadable configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The generators cannot satisfy the configured tier.
    #[error(transparent)]
    Generate(#[from] GenerateError),
    /// A required file or directory operation failed.
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The logging subscriber could not be installed.
    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

impl FuzzError {
    /// Wrap an I/O error with a description of the failed operation.
    #[must_use]
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result type for fallible run setup.
pub type Result<T> = std::result::Result<T, FuzzError>;
