//! Configuration management utilities
//!
//! - `ConfigBuilder` trait for configuration structs loaded from the environment
//! - Environment variable helpers that parse into typed values
//!
//! # Example
//!
//! ```rust,ignore
//! use tooling::config::{ConfigBuilder, get_env_parse_or, get_env_duration_secs_or};
//! use std::time::Duration;
//!
//! #[derive(Clone, Default)]
//! struct QueueConfig {
//!     pub capacity: usize,
//!     pub poll: Duration,
//! }
//!
//! impl ConfigBuilder for QueueConfig {
//!     fn validate(&self) -> tooling::Result<()> {
//!         if self.poll.is_zero() {
//!             return Err(tooling::ToolingError::Config("poll must be non-zero".into()));
//!         }
//!         Ok(())
//!     }
//!
//!     fn from_env(prefix: &str) -> tooling::Result<Self> {
//!         let defaults = Self::default();
//!         Ok(Self {
//!             capacity: get_env_parse_or(&format!("{}CAPACITY", prefix), defaults.capacity)?,
//!             poll: get_env_duration_secs_or(&format!("{}POLL_SECS", prefix), defaults.poll)?,
//!         })
//!     }
//! }
//!
//! let config = QueueConfig::load("QUEUE_")?;
//! ```

mod builder;
mod env;

pub use builder::ConfigBuilder;
pub use env::{
    build_env_key, get_env, get_env_bool, get_env_bool_or, get_env_duration_secs_or,
    get_env_parse, get_env_parse_or,
};
