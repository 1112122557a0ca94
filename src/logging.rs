//! Tracing subscriber setup.

use crate::error::{Result, ResegmentError};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Level for this crate given `-v` count and `-q`.
pub fn log_level(verbosity: u8, quiet: bool) -> &'static str {
    match (quiet, verbosity) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    }
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,resegment={level}")))
}

/// Installs the global subscriber: stderr, plus `log_file` without ANSI
/// colors when given. `RUST_LOG` overrides the level of both.
///
/// The log file always records at least `info`, even in quiet mode.
pub fn init_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter(log_level(verbosity, quiet)));

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path).map_err(|e| {
                ResegmentError::Other(format!(
                    "Failed to create log file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(filter(log_level(verbosity, false))),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ResegmentError::Other(format!("Failed to initialize logging: {}", e)))
}
