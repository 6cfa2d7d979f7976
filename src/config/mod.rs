//! # Configuration
//!
//! Immutable dispatcher configuration, sourced from the process environment.
//!
//! Required variables:
//! - `MQTT_BROKER_URL` — broker connection URI, e.g. `mqtt://localhost:1883`.
//! - `MIN_ORDER_WAIT_SECS` / `MAX_ORDER_WAIT_SECS` — bounds of the simulated
//!   kitchen work window, in seconds (fractional values allowed).
//!
//! Any missing or invalid variable is startup-fatal: the binary logs the error
//! and exits non-zero. There is no partial configuration.

use std::env;
use std::time::Duration;

/// Errors raised while building a [`DispatcherConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable '{0}' is not set")]
    Missing(&'static str),
    #[error("environment variable '{name}' has invalid value '{value}': expected a non-negative number of seconds")]
    Invalid { name: &'static str, value: String },
    #[error("MIN_ORDER_WAIT_SECS ({min:?}) must not exceed MAX_ORDER_WAIT_SECS ({max:?})")]
    InvertedWaitWindow { min: Duration, max: Duration },
}

/// Immutable configuration consumed by the dispatcher at construction.
#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    /// Broker connection URI.
    pub broker_url: String,
    /// Lower bound of the simulated processing window.
    pub min_wait: Duration,
    /// Upper bound of the simulated processing window.
    pub max_wait: Duration,
}

impl DispatcherConfig {
    /// Build a validated configuration.
    pub fn new(
        broker_url: impl Into<String>,
        min_wait: Duration,
        max_wait: Duration,
    ) -> Result<Self, ConfigError> {
        if min_wait > max_wait {
            return Err(ConfigError::InvertedWaitWindow {
                min: min_wait,
                max: max_wait,
            });
        }
        Ok(Self {
            broker_url: broker_url.into(),
            min_wait,
            max_wait,
        })
    }

    /// Build the configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let broker_url = require("MQTT_BROKER_URL")?;
        let min_wait = wait_secs("MIN_ORDER_WAIT_SECS")?;
        let max_wait = wait_secs("MAX_ORDER_WAIT_SECS")?;
        Self::new(broker_url, min_wait, max_wait)
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn wait_secs(name: &'static str) -> Result<Duration, ConfigError> {
    let raw = require(name)?;
    let secs: f64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.clone(),
    })?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigError::Invalid { name, value: raw });
    }
    Ok(Duration::from_secs_f64(secs))
}
