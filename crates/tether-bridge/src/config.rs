//! Environment-driven configuration for the bridge and its in-process host.

use tether_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig};
use thiserror::Error;
use tracing::info;

use crate::error::{BridgeError, BridgeResult};

/// Environment variable holding the dispatcher queue capacity.
pub const ENV_DISPATCHER_CAPACITY: &str = "TETHER_DISPATCHER_CAPACITY";
/// Environment variable holding the log level or filter directive.
pub const ENV_LOG_LEVEL: &str = "TETHER_LOG_LEVEL";
/// Environment variable selecting `json` or `pretty` log output.
pub const ENV_LOG_FORMAT: &str = "TETHER_LOG_FORMAT";
/// Default bounded queue size between the host transport and its dispatcher.
pub const DEFAULT_DISPATCHER_CAPACITY: usize = 256;

/// Errors raised while parsing configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A value was present but unusable.
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Setting that failed validation.
        field: &'static str,
        /// Raw value supplied.
        value: String,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
}

/// Result alias for configuration parsing.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Runtime settings for the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Queue size for [`crate::LocalHost::spawn_dispatcher`].
    pub dispatcher_capacity: usize,
    /// Log level or `EnvFilter` directive.
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            dispatcher_capacity: DEFAULT_DISPATCHER_CAPACITY,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: LogFormat::infer(),
        }
    }
}

impl BridgeConfig {
    /// Read settings from the process environment, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a variable is set to an
    /// unusable value.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`; blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a value is unusable.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(raw) = read(ENV_DISPATCHER_CAPACITY) {
            config.dispatcher_capacity = parse_capacity(&raw)?;
        }
        if let Some(raw) = read(ENV_LOG_LEVEL) {
            config.log_level = raw;
        }
        if let Some(raw) = read(ENV_LOG_FORMAT) {
            config.log_format = LogFormat::parse(&raw).ok_or_else(|| ConfigError::InvalidValue {
                field: ENV_LOG_FORMAT,
                value: raw.clone(),
                reason: "must be 'json' or 'pretty'",
            })?;
        }
        Ok(config)
    }

    /// Logging settings derived from this configuration.
    #[must_use]
    pub fn logging(&self) -> LoggingConfig<'_> {
        LoggingConfig {
            level: &self.log_level,
            format: self.log_format,
        }
    }
}

/// Load configuration from the environment and install logging.
///
/// # Errors
///
/// Returns an error when the configuration is invalid or a foreign tracing
/// subscriber is already installed.
pub fn bootstrap_from_env() -> BridgeResult<BridgeConfig> {
    let config =
        BridgeConfig::from_env().map_err(|err| BridgeError::config("config.from_env", err))?;
    tether_telemetry::init_logging(&config.logging())
        .map_err(|err| BridgeError::telemetry("telemetry.init_logging", err))?;
    info!(
        dispatcher_capacity = config.dispatcher_capacity,
        log_level = %config.log_level,
        "bridge configured"
    );
    Ok(config)
}

fn parse_capacity(raw: &str) -> ConfigResult<usize> {
    match raw.parse::<usize>() {
        Ok(capacity) if capacity > 0 => Ok(capacity),
        _ => Err(ConfigError::InvalidValue {
            field: ENV_DISPATCHER_CAPACITY,
            value: raw.to_string(),
            reason: "must be a positive integer",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect();
        move |name| values.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() -> ConfigResult<()> {
        let config = BridgeConfig::from_lookup(lookup_from(&[]))?;
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.dispatcher_capacity, DEFAULT_DISPATCHER_CAPACITY);
        assert_eq!(config.logging().level, "info");
        Ok(())
    }

    #[test]
    fn values_override_defaults() -> ConfigResult<()> {
        let config = BridgeConfig::from_lookup(lookup_from(&[
            (ENV_DISPATCHER_CAPACITY, " 32 "),
            (ENV_LOG_LEVEL, "tether_bridge=debug"),
            (ENV_LOG_FORMAT, "JSON"),
        ]))?;
        assert_eq!(config.dispatcher_capacity, 32);
        assert_eq!(config.log_level, "tether_bridge=debug");
        assert_eq!(config.log_format, LogFormat::Json);
        Ok(())
    }

    #[test]
    fn blank_values_count_as_unset() -> ConfigResult<()> {
        let config = BridgeConfig::from_lookup(lookup_from(&[
            (ENV_DISPATCHER_CAPACITY, "  "),
            (ENV_LOG_LEVEL, ""),
        ]))?;
        assert_eq!(config, BridgeConfig::default());
        Ok(())
    }

    #[test]
    fn zero_or_garbage_capacity_is_rejected() {
        for raw in ["0", "-1", "lots"] {
            let result = BridgeConfig::from_lookup(lookup_from(&[(ENV_DISPATCHER_CAPACITY, raw)]));
            assert_eq!(
                result,
                Err(ConfigError::InvalidValue {
                    field: ENV_DISPATCHER_CAPACITY,
                    value: raw.to_string(),
                    reason: "must be a positive integer",
                })
            );
        }
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let result = BridgeConfig::from_lookup(lookup_from(&[(ENV_LOG_FORMAT, "xml")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                field: ENV_LOG_FORMAT,
                ..
            })
        ));
    }
}
