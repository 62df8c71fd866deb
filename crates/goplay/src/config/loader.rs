//! Configuration file loading for goplay
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};

use crate::config::{Config, ConfigError, ENV_PREFIX, EXAMPLE_CONFIG};

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from(path.as_ref()))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load the embedded defaults, then an optional file, then `GOPLAY__*`
    /// environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(File::from_str(EXAMPLE_CONFIG, FileFormat::Toml));
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.variants.is_empty() {
            return Err(ConfigError::Invalid("no variants configured".to_owned()));
        }
        if !self.variants.contains_key(&self.default_variant) {
            return Err(ConfigError::Invalid(format!(
                "default variant '{}' is not configured",
                self.default_variant
            )));
        }

        for (id, variant) in &self.variants {
            if variant.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "variant '{id}' has empty name"
                )));
            }
            if variant.root.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "variant '{id}' has empty root"
                )));
            }
        }

        if self.limits.cpu_time_limit == 0 {
            return Err(ConfigError::Invalid(
                "cpu_time_limit must be positive".to_owned(),
            ));
        }
        if self.limits.memory_limit == 0 {
            return Err(ConfigError::Invalid("memory_limit must be positive".to_owned()));
        }
        check_seconds("wall_time_limit", self.limits.wall_time_limit)?;
        check_seconds("request_timeout", self.request_timeout)?;
        if self.request_timeout < self.limits.wall_time_limit {
            return Err(ConfigError::Invalid(format!(
                "request_timeout ({}s) is shorter than wall_time_limit ({}s)",
                self.request_timeout, self.limits.wall_time_limit
            )));
        }
        if self.max_concurrent == Some(0) {
            return Err(ConfigError::Invalid(
                "max_concurrent must be at least 1".to_owned(),
            ));
        }

        Ok(())
    }
}

/// A duration setting must be positive and representable as a `Duration`
fn check_seconds(name: &str, seconds: f64) -> Result<(), ConfigError> {
    if seconds > 0.0 && Duration::try_from_secs_f64(seconds).is_ok() {
        return Ok(());
    }
    Err(ConfigError::Invalid(format!(
        "{name} must be a positive, finite number of seconds (got {seconds})"
    )))
}
