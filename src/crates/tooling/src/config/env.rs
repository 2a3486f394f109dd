//! Environment variable loading utilities

use crate::{Result, ToolingError};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Load an environment variable as a string.
///
/// Returns `Ok(None)` when the variable is unset and an error when it holds
/// invalid UTF-8.
pub fn get_env(key: &str) -> Result<Option<String>> {
    match env::var(key) {
        Ok(val) => Ok(Some(val)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ToolingError::Env {
            key: key.to_string(),
            message: "contains invalid UTF-8".to_string(),
        }),
    }
}

/// Load and parse an environment variable.
///
/// # Example
///
/// ```rust,ignore
/// let capacity: Option<usize> = get_env_parse("FLOWGRAPH_MAX_QUEUE_LENGTH")?;
/// ```
pub fn get_env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_env(key)? {
        Some(val) => val
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ToolingError::Env {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Load and parse an environment variable, falling back to `default` when unset.
///
/// A value that is set but does not parse is still an error.
pub fn get_env_parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(get_env_parse(key)?.unwrap_or(default))
}

/// Load a boolean environment variable
///
/// Recognizes "true", "1", "yes", "on" and "false", "0", "no", "off"
/// (case-insensitive).
pub fn get_env_bool(key: &str) -> Result<Option<bool>> {
    let Some(val) = get_env(key)? else {
        return Ok(None);
    };

    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        _ => Err(ToolingError::Env {
            key: key.to_string(),
            message: format!("invalid boolean value '{}'", val),
        }),
    }
}

/// Load a boolean environment variable with a default.
pub fn get_env_bool_or(key: &str, default: bool) -> Result<bool> {
    Ok(get_env_bool(key)?.unwrap_or(default))
}

/// Load a duration expressed in (possibly fractional) seconds.
///
/// `FLOWGRAPH_TT_CHECK_INTERVAL_SECS=0.5` yields 500ms. Negative or
/// non-finite values are rejected.
pub fn get_env_duration_secs_or(key: &str, default: Duration) -> Result<Duration> {
    match get_env_parse::<f64>(key)? {
        Some(secs) => Duration::try_from_secs_f64(secs).map_err(|e| ToolingError::Env {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Build a prefixed environment variable name
///
/// ```rust,ignore
/// assert_eq!(build_env_key("FLOWGRAPH_", "max_queue_length"), "FLOWGRAPH_MAX_QUEUE_LENGTH");
/// ```
pub fn build_env_key(prefix: &str, name: &str) -> String {
    format!("{}{}", prefix, name.to_uppercase())
}
