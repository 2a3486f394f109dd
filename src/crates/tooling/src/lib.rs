//! Tooling utilities shared across the flowgraph workspace
//!
//! # Modules
//!
//! - `config` - Configuration loading from environment variables
//! - `logging` - Structured logging helpers built on `tracing`
//! - `watchdog` - Liveness checker reporting names that stopped making progress

pub mod config;
pub mod logging;
pub mod watchdog;

use thiserror::Error;

/// Errors that can occur in the tooling crate
#[derive(Debug, Error)]
pub enum ToolingError {
    /// Environment variable present but unusable
    #[error("Invalid environment variable {key}: {message}")]
    Env { key: String, message: String },

    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for tooling operations
pub type Result<T> = std::result::Result<T, ToolingError>;

/// Get version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
