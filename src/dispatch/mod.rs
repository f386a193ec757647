//! Dispatch handlers
//!
//! A handler applies the business logic to one decoded message. It must be
//! idempotent: a message can be delivered again after a restart or a
//! rebalance. Handlers report failures as values; `Transient` failures are
//! retried by the coordinator, `Permanent` ones go straight to dead-letter.

pub mod live_score;

pub use live_score::{LiveScoreBoard, LiveScoreHandler};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::Error;
use crate::models::Message;
use crate::retry::ErrorClass;

/// Result returned by a dispatch handler
pub type HandlerResult = std::result::Result<(), HandlerFailure>;

/// Why a handler could not process a message
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerFailure {
    /// Infrastructure fault (network, timeout); worth another attempt
    #[error("transient failure: {0}")]
    Transient(String),

    /// Business rule violation; retrying cannot help
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl HandlerFailure {
    pub fn transient<S: Into<String>>(reason: S) -> Self {
        HandlerFailure::Transient(reason.into())
    }

    pub fn permanent<S: Into<String>>(reason: S) -> Self {
        HandlerFailure::Permanent(reason.into())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            HandlerFailure::Transient(_) => ErrorClass::Transient,
            HandlerFailure::Permanent(_) => ErrorClass::BusinessRule,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            HandlerFailure::Transient(reason) | HandlerFailure::Permanent(reason) => reason,
        }
    }
}

/// Classify crate errors raised inside a handler
impl From<Error> for HandlerFailure {
    fn from(err: Error) -> Self {
        if err.is_retryable() {
            HandlerFailure::Transient(err.to_string())
        } else {
            HandlerFailure::Permanent(err.to_string())
        }
    }
}

/// Business logic applied to each consumed message
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Payload type decoded from the message body (JSON)
    type Payload: DeserializeOwned + Send + Sync;

    /// Process one message. Called again for the same message on retry.
    async fn handle(&self, payload: &Self::Payload, message: &Message) -> HandlerResult;
}
