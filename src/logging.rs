//! Tracing subscriber setup.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LOG_FILE_NAME;
use crate::error::{FuzzError, Result};

/// Install the global subscriber: stderr plus a fresh `fuzzer.log` in `log_dir`.
///
/// `RUST_LOG` overrides the level; otherwise it is `debug` when `verbose`
/// and `info` when not.
///
/// # Errors
///
/// Returns an error if the log directory or file cannot be created, or if a
/// global subscriber is already installed.
pub fn init(log_dir: &Path, verbose: bool) -> Result<()> {
    fs::create_dir_all(log_dir).map_err(|err| {
        FuzzError::io(
            format!("failed to create log directory {}", log_dir.display()),
            err,
        )
    })?;
    let path = log_dir.join(LOG_FILE_NAME);
    let file = File::create(&path)
        .map_err(|err| FuzzError::io(format!("failed to create {}", path.display()), err))?;

    tracing_subscriber::registry()
        .with(level_filter(verbose))
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .try_init()
        .map_err(|err| FuzzError::Logging(err.to_string()))
}

/// Install a stderr-only subscriber, leaving any existing log file untouched.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_stderr(verbose: bool) -> Result<()> {
    tracing_subscriber::registry()
        .with(level_filter(verbose))
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .try_init()
        .map_err(|err| FuzzError::Logging(err.to_string()))
}

fn level_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
}
