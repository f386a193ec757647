//! Error handling module for live-events
//!
//! One error type for the whole service. Every variant is classified
//! twice: whether another attempt can help (`is_retryable`) and whether the
//! data itself is at fault (`should_dlq`). The consumer, the handlers and
//! the tracker all branch on that classification.

use thiserror::Error;

/// Result type alias for live-events operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for live-events
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Broker, producer or offset commit failures
    #[error("Kafka error: {0}")]
    Kafka(String),

    /// Validation errors for incoming data
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Score API transport failures and retryable statuses
    #[error("HTTP error: {0}")]
    Http(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Intake stopped; the message was not handed over
    #[error("Service is shutting down")]
    ShuttingDown,
}

impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a Kafka error
    pub fn kafka<S: Into<String>>(msg: S) -> Self {
        Error::Kafka(msg.into())
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Error::Validation(msg.into())
    }

    /// Create an HTTP client error
    pub fn http<S: Into<String>>(msg: S) -> Self {
        Error::Http(msg.into())
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Infrastructure faults that may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Kafka(_) | Error::Timeout(_) | Error::Http(_))
    }

    /// Malformed or rule-breaking data that belongs on the dead-letter topic
    pub fn should_dlq(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::Serialization(_))
    }

    /// Stable label for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "configuration_error",
            Error::Kafka(_) => "kafka_error",
            Error::Validation(_) => "validation_error",
            Error::Serialization(_) => "serialization_error",
            Error::Io(_) => "io_error",
            Error::Http(_) => "http_error",
            Error::Internal(_) => "internal_error",
            Error::Timeout(_) => "timeout",
            Error::ShuttingDown => "shutting_down",
        }
    }
}

/// Convert from anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

/// Convert from envconfig::Error to our Error type
impl From<envconfig::Error> for Error {
    fn from(err: envconfig::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Timeouts and transport failures stay retryable; an undecodable body does not
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(err.to_string())
        } else if err.is_decode() {
            Error::Internal(format!("Malformed response body: {}", err))
        } else {
            Error::Http(err.to_string())
        }
    }
}
