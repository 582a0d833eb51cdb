//! Application configuration, layered from files and `CHECKOUT_*` environment
//! variables.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";

/// How long a bridging stock reservation is held while the checkout lock is
/// released for the external payment call.
const DEFAULT_RESERVE_DURATION_SECS: u64 = 45;

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CheckoutConfig {
    /// Database connection URL.
    pub database_url: String,

    /// Reservation hold duration in seconds (bounds the unlocked payment
    /// window's inventory hold).
    #[serde(default = "default_reserve_duration")]
    #[validate(range(min = 1, max = 3600))]
    pub reserve_duration_secs: u64,

    /// Whether temporary reservations participate in availability checks.
    #[serde(default = "default_true")]
    pub reservations_enabled: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    /// Maximum database connections in the pool.
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
}

fn default_reserve_duration() -> u64 {
    DEFAULT_RESERVE_DURATION_SECS
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

impl CheckoutConfig {
    /// Loads configuration from `config/default`, an environment-specific
    /// overlay and `CHECKOUT_*` environment variables, in that order.
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("CHECKOUT_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let mut builder = Config::builder();
        let default_path = Path::new(CONFIG_DIR).join("default");
        builder = builder.add_source(File::from(default_path).required(false));
        let env_path = Path::new(CONFIG_DIR).join(&environment);
        builder = builder.add_source(File::from(env_path).required(false));
        builder = builder.add_source(Environment::with_prefix("CHECKOUT"));

        let cfg: CheckoutConfig = builder.build()?.try_deserialize()?;
        cfg.validate()
            .map_err(|e| ConfigError::Message(format!("invalid configuration: {e}")))?;
        Ok(cfg)
    }

    /// Configuration for tests and embedded use, bypassing file sources.
    pub fn for_database_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            reserve_duration_secs: DEFAULT_RESERVE_DURATION_SECS,
            reservations_enabled: true,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            environment: "test".to_string(),
            db_max_connections: 1,
        }
    }

    pub fn reserve_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.reserve_duration_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let cfg = CheckoutConfig::for_database_url("sqlite::memory:");
        assert_eq!(cfg.reserve_duration_secs, 45);
        assert!(cfg.reservations_enabled);
        assert_eq!(cfg.reserve_duration(), chrono::Duration::seconds(45));
    }

    #[test]
    fn validation_rejects_zero_reserve_duration() {
        let mut cfg = CheckoutConfig::for_database_url("sqlite::memory:");
        cfg.reserve_duration_secs = 0;
        assert!(cfg.validate().is_err());
    }
}
