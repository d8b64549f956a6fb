//! Configuration management for the registration engine.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Binaries call `dotenvy::dotenv()` first so a local `.env` file is honoured.

use crate::validation::{DEFAULT_MAX_AGE, ValidationRules};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Log filter used when `RUST_LOG` is unset (`LOG_LEVEL`, default `info`)
    pub log_level: String,
    /// Buffer size of the domain event broadcast channel
    pub event_channel_capacity: usize,
    /// Buffer size of the payment confirmation queue
    pub payment_queue_capacity: usize,
    /// How long shutdown waits for in-flight effects, in seconds
    pub shutdown_timeout_secs: u64,
    /// Oldest accepted participant age
    pub max_participant_age: u32,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            log_level: env::var("RUST_LOG")
                .or_else(|_| env::var("LOG_LEVEL"))
                .unwrap_or(defaults.log_level),
            event_channel_capacity: env::var("MEDCAMP_EVENT_CHANNEL_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(defaults.event_channel_capacity),
            payment_queue_capacity: env::var("MEDCAMP_PAYMENT_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(defaults.payment_queue_capacity),
            shutdown_timeout_secs: env::var("MEDCAMP_SHUTDOWN_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.shutdown_timeout_secs),
            max_participant_age: env::var("MEDCAMP_MAX_PARTICIPANT_AGE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(defaults.max_participant_age),
        }
    }

    /// Shutdown timeout as a [`Duration`]
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Validation limits derived from this configuration
    #[must_use]
    pub const fn validation_rules(&self) -> ValidationRules {
        ValidationRules {
            max_age: self.max_participant_age,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            event_channel_capacity: 256,
            payment_queue_capacity: 64,
            shutdown_timeout_secs: 5,
            max_participant_age: DEFAULT_MAX_AGE,
        }
    }
}
