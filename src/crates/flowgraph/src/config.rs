//! Engine configuration.
//!
//! Values come from three places, in increasing precedence: built-in
//! defaults, a YAML/JSON document embedded in the host configuration, and
//! `FLOWGRAPH_*` environment variables.
//!
//! | field                  | env var                                  | default |
//! |------------------------|------------------------------------------|---------|
//! | `max_queue_length`     | `FLOWGRAPH_MAX_QUEUE_LENGTH`             | 16      |
//! | `max_parallelism`      | `FLOWGRAPH_MAX_PARALLELISM`              | 1       |
//! | `enable_tt_checker`    | `FLOWGRAPH_ENABLE_TT_CHECKER`            | true    |
//! | `tt_check_interval`    | `FLOWGRAPH_TT_CHECK_INTERVAL_SECS`       | 120s    |
//! | `block_warn_threshold` | `FLOWGRAPH_BLOCK_WARN_THRESHOLD_SECS`    | 10s     |

use crate::error::{FlowGraphError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tooling::config::{
    build_env_key, get_env_bool_or, get_env_duration_secs_or, get_env_parse_or, ConfigBuilder,
};
use tooling::ToolingError;

/// Environment variable prefix for [`FlowGraphConfig::from_env`].
pub const ENV_PREFIX: &str = "FLOWGRAPH_";

/// Default inbound queue length for a stage.
pub const DEFAULT_MAX_QUEUE_LENGTH: usize = 16;

/// Default declared parallelism for a stage.
pub const DEFAULT_MAX_PARALLELISM: usize = 1;

/// Default grace period before a slow `block()` is reported.
pub const DEFAULT_BLOCK_WARN_THRESHOLD: Duration = Duration::from_secs(10);

/// Runtime settings for a [`Scheduler`](crate::Scheduler) and its stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowGraphConfig {
    /// Inbound queue length for stages built with
    /// [`BaseStage::from_config`](crate::BaseStage::from_config) or
    /// [`PipelineBuilder::pass_through`](crate::PipelineBuilder::pass_through)
    pub max_queue_length: usize,

    /// Declared parallelism for stages built with
    /// [`BaseStage::from_config`](crate::BaseStage::from_config)
    pub max_parallelism: usize,

    /// Whether workers check in with the liveness watchdog
    pub enable_tt_checker: bool,

    /// Watchdog interval; a stage silent for longer is reported
    #[serde(with = "duration_secs")]
    pub tt_check_interval: Duration,

    /// `block()` waits at least this long are logged as warnings
    #[serde(with = "duration_secs")]
    pub block_warn_threshold: Duration,
}

impl Default for FlowGraphConfig {
    fn default() -> Self {
        Self {
            max_queue_length: DEFAULT_MAX_QUEUE_LENGTH,
            max_parallelism: DEFAULT_MAX_PARALLELISM,
            enable_tt_checker: true,
            tt_check_interval: tooling::watchdog::DEFAULT_CHECK_INTERVAL,
            block_warn_threshold: DEFAULT_BLOCK_WARN_THRESHOLD,
        }
    }
}

impl FlowGraphConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `FLOWGRAPH_*` variables over the defaults and validate.
    pub fn from_default_env() -> Result<Self> {
        Ok(<Self as ConfigBuilder>::load(ENV_PREFIX)?)
    }

    /// Parse a YAML (or JSON) document; missing fields keep their defaults.
    pub fn from_yaml_str(doc: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(doc)
            .map_err(|e| FlowGraphError::Config(ToolingError::Config(e.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the watchdog interval
    pub fn with_tt_check_interval(mut self, interval: Duration) -> Self {
        self.tt_check_interval = interval;
        self
    }

    /// Enable or disable the watchdog
    pub fn with_tt_checker(mut self, enabled: bool) -> Self {
        self.enable_tt_checker = enabled;
        self
    }

    /// Set the slow-`block()` warning threshold
    pub fn with_block_warn_threshold(mut self, threshold: Duration) -> Self {
        self.block_warn_threshold = threshold;
        self
    }

    /// Set the default stage queue length
    pub fn with_max_queue_length(mut self, len: usize) -> Self {
        self.max_queue_length = len;
        self
    }
}

impl ConfigBuilder for FlowGraphConfig {
    fn validate(&self) -> tooling::Result<()> {
        if self.enable_tt_checker && self.tt_check_interval.is_zero() {
            return Err(ToolingError::Config(
                "tt_check_interval must be non-zero when the tt checker is enabled".to_string(),
            ));
        }
        if self.max_parallelism == 0 {
            return Err(ToolingError::Config(
                "max_parallelism must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn from_env(prefix: &str) -> tooling::Result<Self> {
        let defaults = Self::default();
        let key = |name: &str| build_env_key(prefix, name);

        Ok(Self {
            max_queue_length: get_env_parse_or(&key("max_queue_length"), defaults.max_queue_length)?,
            max_parallelism: get_env_parse_or(&key("max_parallelism"), defaults.max_parallelism)?,
            enable_tt_checker: get_env_bool_or(&key("enable_tt_checker"), defaults.enable_tt_checker)?,
            tt_check_interval: get_env_duration_secs_or(
                &key("tt_check_interval_secs"),
                defaults.tt_check_interval,
            )?,
            block_warn_threshold: get_env_duration_secs_or(
                &key("block_warn_threshold_secs"),
                defaults.block_warn_threshold,
            )?,
        })
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
