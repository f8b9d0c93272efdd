//! Configuration for the messenger

use crate::types::EndpointConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Messenger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessengerConfig {
    /// xApp name, sent as `source_xapp` and used as the bus client name
    pub xapp_name: String,

    /// Primary bus URL
    pub primary_url: String,

    /// Subject prefix; messages go to `{subject_prefix}.{type_id}`
    pub subject_prefix: String,

    /// Health loop period (milliseconds)
    pub health_check_interval_ms: u64,

    /// Max wait for primary readiness at startup (milliseconds)
    pub ready_timeout_ms: u64,

    /// Fallback send timeout (milliseconds)
    pub fallback_timeout_ms: u64,

    /// Fallback health probe timeout (milliseconds)
    pub health_probe_timeout_ms: u64,

    /// Consecutive failures before a path is Down
    pub failover_threshold: u32,

    /// Consecutive successes before a path is Healthy
    pub recovery_threshold: u32,

    /// Fallback attempts per send on connection errors
    pub max_retry_attempts: u32,

    /// Delay between fallback attempts (milliseconds)
    pub retry_delay_ms: u64,

    /// Endpoints registered at construction
    pub endpoints: Vec<EndpointConfig>,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            xapp_name: "dual-path-xapp".to_string(),
            primary_url: "nats://127.0.0.1:4222".to_string(),
            subject_prefix: "ric.msg".to_string(),
            health_check_interval_ms: 10_000,
            ready_timeout_ms: 5_000,
            fallback_timeout_ms: 5_000,
            health_probe_timeout_ms: 2_000,
            failover_threshold: 3,
            recovery_threshold: 5,
            max_retry_attempts: 2,
            retry_delay_ms: 500,
            endpoints: Vec::new(),
        }
    }
}

impl MessengerConfig {
    /// Health loop period
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    /// Startup readiness wait
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Fallback send timeout
    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback_timeout_ms)
    }

    /// Fallback probe timeout
    pub fn health_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.health_probe_timeout_ms)
    }

    /// Delay between fallback attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Reject values that would disable thresholds or make timers spin
    pub fn validate(&self) -> Result<()> {
        if self.failover_threshold == 0 {
            return Err(Error::Config("failover_threshold must be at least 1".into()));
        }
        if self.recovery_threshold == 0 {
            return Err(Error::Config("recovery_threshold must be at least 1".into()));
        }
        if self.max_retry_attempts == 0 {
            return Err(Error::Config("max_retry_attempts must be at least 1".into()));
        }

        let timers = [
            ("health_check_interval_ms", self.health_check_interval_ms),
            ("ready_timeout_ms", self.ready_timeout_ms),
            ("fallback_timeout_ms", self.fallback_timeout_ms),
            ("health_probe_timeout_ms", self.health_probe_timeout_ms),
        ];
        for (name, value) in timers {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than 0", name)));
            }
        }

        Ok(())
    }

    /// Load from TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MessengerConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `DUAL_PATH_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = MessengerConfig::default();

        if let Ok(name) = std::env::var("DUAL_PATH_XAPP_NAME") {
            config.xapp_name = name;
        }
        if let Ok(url) = std::env::var("DUAL_PATH_PRIMARY_URL") {
            config.primary_url = url;
        }
        if let Ok(prefix) = std::env::var("DUAL_PATH_SUBJECT_PREFIX") {
            config.subject_prefix = prefix;
        }

        config.health_check_interval_ms =
            env_number("DUAL_PATH_HEALTH_CHECK_INTERVAL_MS", config.health_check_interval_ms)?;
        config.ready_timeout_ms = env_number("DUAL_PATH_READY_TIMEOUT_MS", config.ready_timeout_ms)?;
        config.fallback_timeout_ms =
            env_number("DUAL_PATH_FALLBACK_TIMEOUT_MS", config.fallback_timeout_ms)?;
        config.health_probe_timeout_ms =
            env_number("DUAL_PATH_HEALTH_PROBE_TIMEOUT_MS", config.health_probe_timeout_ms)?;
        config.failover_threshold =
            env_number("DUAL_PATH_FAILOVER_THRESHOLD", config.failover_threshold)?;
        config.recovery_threshold =
            env_number("DUAL_PATH_RECOVERY_THRESHOLD", config.recovery_threshold)?;
        config.max_retry_attempts =
            env_number("DUAL_PATH_MAX_RETRY_ATTEMPTS", config.max_retry_attempts)?;
        config.retry_delay_ms = env_number("DUAL_PATH_RETRY_DELAY_MS", config.retry_delay_ms)?;

        config.validate()?;
        Ok(config)
    }
}

fn env_number<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} is not a valid number: {:?}", key, raw))),
        Err(_) => Ok(default),
    }
}
