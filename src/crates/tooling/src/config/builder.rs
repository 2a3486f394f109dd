//! Configuration builder trait

use crate::Result;

/// Trait for configuration structs that load from the environment
///
/// Implementors read each field from `{PREFIX}{FIELD_NAME}` and fall back to
/// their `Default` value when the variable is unset.
pub trait ConfigBuilder: Default + Clone {
    /// Validate the configuration
    ///
    /// Returns an error for values outside their valid range.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Load configuration from environment variables with the given prefix.
    fn from_env(prefix: &str) -> Result<Self>;

    /// Load from the environment and validate the result.
    fn load(prefix: &str) -> Result<Self> {
        let config = Self::from_env(prefix)?;
        config.validate()?;
        Ok(config)
    }
}
