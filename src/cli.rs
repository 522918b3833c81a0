//! CLI command implementations for Mazefuzz.

pub(crate) mod generate;
pub(crate) mod replay;
pub(crate) mod run;

mod output;

use clap::ValueEnum;
use mazefuzz::{CancelToken, FuzzConfig};
use std::error::Error;
use std::fmt;
use std::path::Path;

/// Output format for the `run` and `replay` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// CLI error type.
#[derive(Debug)]
pub(crate) struct CliError {
    message: String,
}

impl CliError {
    /// Create a new CLI error.
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<mazefuzz::FuzzError> for CliError {
    fn from(e: mazefuzz::FuzzError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<mazefuzz::ConfigError> for CliError {
    fn from(e: mazefuzz::ConfigError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<mazefuzz::GenerateError> for CliError {
    fn from(e: mazefuzz::GenerateError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(format!("JSON serialization failed: {e}"))
    }
}

/// Load and validate the configuration file.
fn load_config(path: &Path) -> Result<FuzzConfig, CliError> {
    Ok(FuzzConfig::load(path)?)
}

/// Cancel `token` on Ctrl-C.
fn install_interrupt_handler(token: &CancelToken) -> Result<(), CliError> {
    let token = token.clone();
    ctrlc::set_handler(move || token.cancel())
        .map_err(|e| CliError::new(format!("Failed to install Ctrl-C handler: {e}")))
}
