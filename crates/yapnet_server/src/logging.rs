//! Logging system setup and configuration
//!
//! This module handles the initialization of the tracing-based logging system
//! used throughout the server for debugging, monitoring, and diagnostic output.

use crate::error::ServerError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging system
///
/// Sets up structured logging with either human-readable or JSON output.
/// `RUST_LOG` overrides `level` when set (e.g. `RUST_LOG=yapnet_server=trace`).
///
/// # Arguments
/// * `level` - Default filter directive such as `"info"` or `"debug"`
/// * `json_format` - Emit one JSON object per line instead of plain text
///
/// # Returns
/// * `Result<(), ServerError>` - Fails if a global subscriber is already installed
pub fn setup_logging(level: &str, json_format: bool) -> Result<(), ServerError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let result = if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(false))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .try_init()
    };

    result.map_err(|e| ServerError::Internal(format!("failed to install logger: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error_not_a_panic() {
        // Only one global subscriber can exist per process; whichever call
        // comes second must report it instead of panicking.
        let first = setup_logging("info", false);
        let second = setup_logging("debug", true);
        assert!(first.is_err() || second.is_err());
    }
}
