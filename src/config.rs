//! Configuration module for live-events
//!
//! This module handles loading and validating configuration from environment
//! variables, providing strongly-typed configuration structures for all
//! application components.

use envconfig::Envconfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::kafka::MAX_BATCH_SIZE;
use crate::models::validate_event_id;
use crate::retry::RetryPolicy;

pub use crate::kafka::KafkaConfig;

/// Main configuration structure for live-events
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct Config {
    /// Server configuration
    #[serde(flatten)]
    #[envconfig(nested)]
    pub server: ServerConfig,

    /// Kafka configuration
    #[serde(flatten)]
    #[envconfig(nested)]
    pub kafka: KafkaConfig,

    /// Consumer retry configuration
    #[serde(flatten)]
    #[envconfig(nested)]
    pub retry: RetryConfig,

    /// Score tracker configuration
    #[serde(flatten)]
    #[envconfig(nested)]
    pub tracker: TrackerConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct ServerConfig {
    /// Host to bind to
    #[envconfig(from = "HOST", default = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[envconfig(from = "PORT", default = "8080")]
    pub port: u16,

    /// Log level
    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,

    /// Environment (development, staging, production)
    #[envconfig(from = "ENVIRONMENT", default = "development")]
    pub environment: String,

    /// Request timeout in seconds
    #[envconfig(from = "REQUEST_TIMEOUT_SECS", default = "30")]
    pub request_timeout_secs: u64,

    /// Grace period for in-flight messages on shutdown, in seconds
    #[envconfig(from = "SHUTDOWN_TIMEOUT_SECS", default = "30")]
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    /// Get the server address as a string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Retry policy for consumed messages
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct RetryConfig {
    /// Retries after the first failed attempt
    #[envconfig(from = "MAX_RETRIES", default = "3")]
    pub max_retries: u32,

    /// First backoff delay in milliseconds
    #[envconfig(from = "BACKOFF_BASE_MS", default = "1000")]
    pub backoff_base_ms: u64,

    /// Backoff ceiling in milliseconds
    #[envconfig(from = "BACKOFF_CAP_MS", default = "30000")]
    pub backoff_cap_ms: u64,
}

impl RetryConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::from(self)
    }
}

/// Score tracker configuration
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct TrackerConfig {
    /// Score API base URL; the event id is appended as a path segment
    #[envconfig(from = "SCORE_API_BASE_URL", default = "http://localhost:8080/mock/status")]
    pub score_api_base_url: String,

    /// Seconds between polls of one event
    #[envconfig(from = "TRACKER_CYCLE_SECS", default = "10")]
    pub cycle_secs: u64,

    /// Attempts per fetch and per publish within a cycle
    #[envconfig(from = "TRACKER_MAX_ATTEMPTS", default = "3")]
    pub max_attempts: u32,

    /// Fixed delay between those attempts, in milliseconds
    #[envconfig(from = "TRACKER_RETRY_DELAY_MS", default = "1000")]
    pub retry_delay_ms: u64,

    /// Comma-separated event ids tracked at startup
    #[envconfig(from = "TRACKER_EVENT_IDS", default = "")]
    pub event_ids: String,
}

impl TrackerConfig {
    pub fn cycle(&self) -> Duration {
        Duration::from_secs(self.cycle_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.max_attempts, Duration::from_millis(self.retry_delay_ms))
    }

    /// Parse the startup event ids, rejecting malformed or out-of-range ids
    pub fn event_ids(&self) -> Result<Vec<i64>> {
        self.event_ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| {
                let event_id = id
                    .parse::<i64>()
                    .map_err(|e| Error::config(format!("Invalid event id '{}': {}", id, e)))?;
                validate_event_id(event_id).map_err(|e| Error::config(e.to_string()))
            })
            .collect()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            environment: "development".to_string(),
            request_timeout_secs: 30,
            shutdown_timeout_secs: 30,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 1000,
            backoff_cap_ms: 30000,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            score_api_base_url: "http://localhost:8080/mock/status".to_string(),
            cycle_secs: 10,
            max_attempts: 3,
            retry_delay_ms: 1000,
            event_ids: String::new(),
        }
    }
}

/// Mirrors the environment defaults
impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            kafka: KafkaConfig::default(),
            retry: RetryConfig::default(),
            tracker: TrackerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenv::dotenv().ok();

        // Parse configuration from environment
        Config::init_from_env().map_err(Error::from)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::config("Server port cannot be 0"));
        }

        if self.kafka.brokers_list().is_empty() {
            return Err(Error::config("Kafka brokers cannot be empty"));
        }

        if self.kafka.topic.trim().is_empty() {
            return Err(Error::config("Kafka topic cannot be empty"));
        }

        if self.kafka.topic == self.kafka.dlq_topic {
            return Err(Error::config(
                "Dead-letter topic must differ from the source topic",
            ));
        }

        if self.kafka.batch_size == 0 {
            return Err(Error::config("Batch size must be at least 1"));
        }

        if self.kafka.batch_size > MAX_BATCH_SIZE {
            return Err(Error::config(format!(
                "Batch size cannot exceed {}",
                MAX_BATCH_SIZE
            )));
        }

        if self.retry.backoff_base_ms == 0 {
            return Err(Error::config("Backoff base must be greater than 0"));
        }

        if self.retry.backoff_cap_ms < self.retry.backoff_base_ms {
            return Err(Error::config("Backoff cap cannot be below the backoff base"));
        }

        if self.tracker.max_attempts == 0 {
            return Err(Error::config("Tracker max attempts must be at least 1"));
        }

        if self.tracker.cycle_secs == 0 {
            return Err(Error::config("Tracker cycle must be at least 1 second"));
        }

        self.tracker.event_ids()?;

        Ok(())
    }

    /// Log configuration
    pub fn log_config(&self) {
        tracing::info!(
            server_address = %self.server.address(),
            environment = %self.server.environment,
            log_level = %self.server.log_level,
            shutdown_timeout_secs = self.server.shutdown_timeout_secs,
            "Server configuration"
        );

        tracing::info!(
            brokers = %self.kafka.brokers,
            consumer_group = %self.kafka.consumer_group,
            topic = %self.kafka.topic,
            dlq_topic = %self.kafka.dlq_topic,
            score_topic = %self.kafka.score_topic,
            batch_size = self.kafka.batch_size,
            "Kafka configuration"
        );

        tracing::info!(
            max_retries = self.retry.max_retries,
            backoff_base_ms = self.retry.backoff_base_ms,
            backoff_cap_ms = self.retry.backoff_cap_ms,
            "Retry configuration"
        );

        tracing::info!(
            score_api = %self.tracker.score_api_base_url,
            cycle_secs = self.tracker.cycle_secs,
            max_attempts = self.tracker.max_attempts,
            event_ids = %self.tracker.event_ids,
            "Tracker configuration"
        );
    }
}
