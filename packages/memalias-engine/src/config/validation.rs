//! Configuration validation

use super::error::ConfigResult;
use tracing::warn;

/// Trait for validatable configuration objects
pub trait Validatable {
    /// Returns `Ok(())` if valid, `Err(ConfigError)` with details if invalid.
    fn validate(&self) -> ConfigResult<()>;

    /// Get the configuration name for error messages
    fn config_name(&self) -> &'static str {
        "Config"
    }
}

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate any Validatable config, logging a rejection under its name
    pub fn validate_config<V: Validatable>(config: &V) -> ConfigResult<()> {
        config.validate().map_err(|err| {
            warn!("{} rejected: {}", config.config_name(), err);
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigError, EngineConfig};

    #[test]
    fn test_validate_config_passes_error_through() {
        let config = EngineConfig::default().max_frames(0);
        assert_eq!(config.config_name(), "EngineConfig");

        let err = ConfigValidator::validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Range { .. }));
        assert!(ConfigValidator::validate_config(&EngineConfig::default()).is_ok());
    }
}
