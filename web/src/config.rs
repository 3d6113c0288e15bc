//! Configuration management.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Unset or unparsable values fall back to the default silently.

use admission_core::QueueConfig;
use admission_core::queue::{DEFAULT_ACTIVE_KEY, DEFAULT_MAX_ACTIVE, DEFAULT_WAITING_KEY};
use admission_runtime::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Redis configuration
    pub redis: RedisConfig,
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Admission queue configuration
    pub queue: QueueSettings,
    /// Activation scheduler configuration
    pub scheduler: SchedulerSettings,
}

/// Redis configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// Queue configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Capacity of the active set
    pub max_active_buyers: u64,
    /// Activation look-ahead; derived from capacity when unset
    pub scan_window: Option<u64>,
    /// Key of the waiting list
    pub queue_key: String,
    /// Key of the active set
    pub active_key: String,
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Seconds between steady-state activation passes
    pub poll_interval_seconds: u64,
    /// Activation attempts during startup
    pub startup_retry_count: usize,
    /// Seconds between startup attempts
    pub startup_retry_delay_seconds: u64,
}

impl Config {
    /// Load configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// [`from_env`](Self::from_env) is this over `std::env::var`.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str, default: &str| {
            lookup(key)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            redis: RedisConfig {
                url: text("REDIS_URL", "redis://localhost:6379"),
            },
            server: ServerConfig {
                host: text("HOST", "0.0.0.0"),
                port: parsed(&lookup, "PORT").unwrap_or(8080),
                shutdown_timeout: parsed(&lookup, "SHUTDOWN_TIMEOUT").unwrap_or(10),
            },
            queue: QueueSettings {
                max_active_buyers: parsed(&lookup, "MAX_ACTIVE_BUYERS")
                    .unwrap_or(DEFAULT_MAX_ACTIVE),
                scan_window: parsed(&lookup, "ACTIVATION_SCAN_WINDOW"),
                queue_key: text("QUEUE_KEY", DEFAULT_WAITING_KEY),
                active_key: text("ACTIVE_KEY", DEFAULT_ACTIVE_KEY),
            },
            scheduler: SchedulerSettings {
                poll_interval_seconds: parsed(&lookup, "ACTIVATION_POLL_INTERVAL_SECONDS")
                    .unwrap_or(5),
                startup_retry_count: parsed(&lookup, "STARTUP_RETRY_COUNT").unwrap_or(5),
                startup_retry_delay_seconds: parsed(&lookup, "STARTUP_RETRY_DELAY_SECONDS")
                    .unwrap_or(2),
            },
        }
    }

    /// `host:port` to bind the HTTP listener to.
    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Graceful shutdown timeout.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout)
    }

    /// Queue settings in the form the queue takes them.
    #[must_use]
    pub fn queue(&self) -> QueueConfig {
        QueueConfig {
            waiting_key: self.queue.queue_key.clone(),
            active_key: self.queue.active_key.clone(),
            max_active: self.queue.max_active_buyers,
            scan_window: self.queue.scan_window,
        }
    }

    /// Scheduler settings in the form the scheduler takes them.
    #[must_use]
    pub const fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_secs(self.scheduler.poll_interval_seconds),
            startup_retries: self.scheduler.startup_retry_count,
            startup_retry_delay: Duration::from_secs(self.scheduler.startup_retry_delay_seconds),
        }
    }
}

/// Value of `key` parsed as `T`, ignoring surrounding whitespace.
fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|raw| raw.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);

        assert_eq!(config.redis.url, "redis://localhost:6379");
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(10));
        assert_eq!(config.queue(), QueueConfig::default());
        assert_eq!(config.scheduler(), SchedulerConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("REDIS_URL", "redis://cache:6380"),
            ("PORT", "9000"),
            ("MAX_ACTIVE_BUYERS", "25"),
            ("ACTIVATION_SCAN_WINDOW", "200"),
            ("QUEUE_KEY", "drop:waiting"),
            ("ACTIVE_KEY", "drop:active"),
            ("ACTIVATION_POLL_INTERVAL_SECONDS", "1"),
            ("STARTUP_RETRY_COUNT", "10"),
            ("STARTUP_RETRY_DELAY_SECONDS", " 3 "),
        ]);

        assert_eq!(config.redis.url, "redis://cache:6380");
        assert_eq!(config.server.port, 9000);

        let queue = config.queue();
        assert_eq!(queue.max_active, 25);
        assert_eq!(queue.scan_window, Some(200));
        assert_eq!(queue.waiting_key, "drop:waiting");
        assert_eq!(queue.active_key, "drop:active");

        let scheduler = config.scheduler();
        assert_eq!(scheduler.poll_interval, Duration::from_secs(1));
        assert_eq!(scheduler.startup_retries, 10);
        assert_eq!(scheduler.startup_retry_delay, Duration::from_secs(3));
    }

    #[test]
    fn test_each_setting_parses_as_its_own_type() {
        let config = config_from(&[
            ("PORT", "65535"),
            ("SHUTDOWN_TIMEOUT", "100000"),
            ("MAX_ACTIVE_BUYERS", "70000"),
            ("STARTUP_RETRY_COUNT", "3"),
        ]);

        assert_eq!(config.server.port, u16::MAX);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(100_000));
        assert_eq!(config.queue.max_active_buyers, 70_000);
        assert_eq!(config.scheduler.startup_retry_count, 3);
    }

    #[test]
    fn test_zero_poll_interval_is_caught_by_scheduler_validation() {
        let config = config_from(&[("ACTIVATION_POLL_INTERVAL_SECONDS", "0")]);
        assert!(config.scheduler().validate().is_err());
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = config_from(&[("PORT", "eighty"), ("MAX_ACTIVE_BUYERS", "-4"), ("HOST", "")]);

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.queue.max_active_buyers, DEFAULT_MAX_ACTIVE);
        assert_eq!(config.server.host, "0.0.0.0");
    }
}
