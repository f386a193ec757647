//! Message processing: decode, resolve through the retry coordinator,
//! route to dead-letter

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{DeadLetterRecord, DeadLetterSink, KafkaIntegrationError};
use crate::dispatch::MessageHandler;
use crate::error::Result;
use crate::logging::Timer;
use crate::models::Message;
use crate::retry::{ErrorClass, Resolution, RetryCoordinator, RetryState};

/// How a message left the processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Handler succeeded; the offset may be committed
    Acknowledged { attempts: u32 },

    /// Published to the dead-letter topic; the offset may be committed
    DeadLettered { attempts: u32, class: ErrorClass },

    /// Shutdown interrupted a retry wait; the offset must not be committed
    Interrupted { attempts: u32 },
}

impl Outcome {
    /// Whether the message reached a terminal state
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Outcome::Interrupted { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Outcome::Acknowledged { attempts }
            | Outcome::DeadLettered { attempts, .. }
            | Outcome::Interrupted { attempts } => *attempts,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Acknowledged { .. } => "acknowledged",
            Outcome::DeadLettered { .. } => "dead_lettered",
            Outcome::Interrupted { .. } => "interrupted",
        }
    }
}

/// Decode a JSON payload; an absent or empty payload is a decode failure
pub fn decode<T: DeserializeOwned>(
    message: &Message,
) -> std::result::Result<T, KafkaIntegrationError> {
    let payload = message
        .payload()
        .filter(|payload| !payload.is_empty())
        .ok_or_else(|| {
            KafkaIntegrationError::DeserializationError("Empty message payload".to_string())
        })?;

    serde_json::from_slice(payload)
        .map_err(|e| KafkaIntegrationError::DeserializationError(e.to_string()))
}

/// Runs one message through the pipeline
pub struct MessageProcessor<H: MessageHandler> {
    /// Business logic for decoded payloads
    handler: Arc<H>,

    /// Retry policy applied around the handler
    coordinator: RetryCoordinator,

    /// Dead-letter destination
    dead_letters: Arc<dyn DeadLetterSink>,
}

impl<H: MessageHandler> MessageProcessor<H> {
    pub fn new(
        handler: Arc<H>,
        coordinator: RetryCoordinator,
        dead_letters: Arc<dyn DeadLetterSink>,
    ) -> Self {
        Self {
            handler,
            coordinator,
            dead_letters,
        }
    }

    /// Process a single message.
    ///
    /// Returns an error only when a dead-letter publish fails; the message
    /// is then unresolved and its offset must not be committed.
    pub async fn process(&self, message: &Message) -> Result<Outcome> {
        let timer = Timer::start("process_message");

        let outcome = match decode::<H::Payload>(message) {
            Ok(payload) => self.resolve(&payload, message).await,
            Err(e) => {
                warn!(
                    partition = message.partition(),
                    offset = message.offset(),
                    error = %e,
                    "Undecodable message, routing to dead-letter without retry"
                );
                let mut state = RetryState::new(self.coordinator.policy());
                // a fresh state is never terminal
                let _ = state.reject_undecodable(e.to_string());
                self.dead_letter(message, &state).await
            },
        };

        let elapsed = timer.stop();
        debug!(
            partition = message.partition(),
            offset = message.offset(),
            processing_time_ms = elapsed.as_millis() as u64,
            "Message processed"
        );

        outcome
    }

    async fn resolve(&self, payload: &H::Payload, message: &Message) -> Result<Outcome> {
        match self
            .coordinator
            .resolve(self.handler.as_ref(), payload, message)
            .await
        {
            Resolution::Succeeded { attempts } => Ok(Outcome::Acknowledged { attempts }),
            Resolution::DeadLettered(state) => self.dead_letter(message, &state).await,
            Resolution::Interrupted(state) => Ok(Outcome::Interrupted {
                attempts: state.attempts(),
            }),
        }
    }

    async fn dead_letter(&self, message: &Message, state: &RetryState) -> Result<Outcome> {
        let record = DeadLetterRecord::from_state(message, state);
        self.dead_letters.send(&record).await?;

        Ok(Outcome::DeadLettered {
            attempts: record.attempts,
            class: record.error_class,
        })
    }
}

impl<H: MessageHandler> Clone for MessageProcessor<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            coordinator: self.coordinator.clone(),
            dead_letters: Arc::clone(&self.dead_letters),
        }
    }
}
