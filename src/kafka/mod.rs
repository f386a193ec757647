//! Kafka integration module for the consume pipeline
//!
//! This module provides:
//! - Event consumer with manual offset management
//! - Per-partition workers fed by bounded channels (backpressure)
//! - Message processing: decode, retry coordination, dead-letter routing
//! - Dead-letter producer carrying failure metadata in record headers
//! - Graceful shutdown that never commits an unresolved offset

mod config;
mod consumer;
mod processor;
mod producer;
mod router;
mod worker;

pub use config::{KafkaConfig, MAX_BATCH_SIZE};
pub use consumer::{EventConsumer, KafkaOffsetCommitter};
pub use processor::{decode, MessageProcessor, Outcome};
pub use producer::{DeadLetterSink, DlqProducer};
pub use router::PartitionRouter;
pub use worker::{OffsetCommitter, PartitionWorker, WorkerReport};

use chrono::{DateTime, Utc};
use rdkafka::error::KafkaError;
use thiserror::Error;

use crate::error::Error;
use crate::models::Message;
use crate::retry::{ErrorClass, FailureRecord, RetryState};

/// Dead-letter header names
pub mod headers {
    pub const ORIGINAL_TOPIC: &str = "x-dlt-original-topic";
    pub const ORIGINAL_PARTITION: &str = "x-dlt-original-partition";
    pub const ORIGINAL_OFFSET: &str = "x-dlt-original-offset";
    pub const ATTEMPTS: &str = "x-dlt-attempts";
    pub const ERROR_CLASS: &str = "x-dlt-error-class";
    pub const LAST_ERROR: &str = "x-dlt-last-error";
    pub const FAILURE_HISTORY: &str = "x-dlt-failure-history";
    pub const TIMESTAMP: &str = "x-dlt-timestamp";
}

/// Kafka-specific error types
#[derive(Debug, Error)]
pub enum KafkaIntegrationError {
    #[error("Kafka connection error: {0}")]
    ConnectionError(#[from] KafkaError),

    #[error("Message deserialization failed: {0}")]
    DeserializationError(String),

    #[error("Offset commit failed: {0}")]
    OffsetCommitError(String),

    #[error("DLQ send failed: {0}")]
    DlqError(String),

    #[error("Publish failed: {0}")]
    PublishError(String),
}

impl From<KafkaIntegrationError> for Error {
    fn from(err: KafkaIntegrationError) -> Self {
        match err {
            KafkaIntegrationError::DeserializationError(reason) => Error::validation(reason),
            other => Error::kafka(other.to_string()),
        }
    }
}

/// A message that could not be processed, with its failure metadata.
///
/// Payload and key are the original bytes; everything else travels as
/// record headers.
#[derive(Debug, Clone)]
pub struct DeadLetterRecord {
    pub payload: Option<Vec<u8>>,
    pub key: Option<Vec<u8>>,
    pub source_topic: String,
    pub source_partition: i32,
    pub source_offset: i64,
    pub attempts: u32,
    pub error_class: ErrorClass,
    pub last_error: String,
    pub failure_history: Vec<FailureRecord>,
    pub dead_lettered_at: DateTime<Utc>,
}

impl DeadLetterRecord {
    /// Build the record for a message whose retry state reached dead-letter
    pub fn from_state(message: &Message, state: &RetryState) -> Self {
        Self {
            payload: message.payload().map(<[u8]>::to_vec),
            key: message.key().map(<[u8]>::to_vec),
            source_topic: message.topic().to_string(),
            source_partition: message.partition(),
            source_offset: message.offset(),
            attempts: state.attempts(),
            error_class: state.last_class().unwrap_or(ErrorClass::BusinessRule),
            last_error: state.last_failure().unwrap_or_default().to_string(),
            failure_history: state.history().to_vec(),
            dead_lettered_at: Utc::now(),
        }
    }

    /// Record key on the dead-letter topic; falls back to `partition-offset`
    pub fn record_key(&self) -> Vec<u8> {
        self.key.clone().unwrap_or_else(|| {
            format!("{}-{}", self.source_partition, self.source_offset).into_bytes()
        })
    }

    /// Failure metadata as header name/value pairs
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let history = serde_json::to_string(&self.failure_history).unwrap_or_else(|_| "[]".into());

        vec![
            (headers::ORIGINAL_TOPIC, self.source_topic.clone()),
            (headers::ORIGINAL_PARTITION, self.source_partition.to_string()),
            (headers::ORIGINAL_OFFSET, self.source_offset.to_string()),
            (headers::ATTEMPTS, self.attempts.to_string()),
            (headers::ERROR_CLASS, self.error_class.to_string()),
            (headers::LAST_ERROR, self.last_error.clone()),
            (headers::FAILURE_HISTORY, history),
            (headers::TIMESTAMP, self.dead_lettered_at.to_rfc3339()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use std::time::Duration;

    fn header<'a>(headers: &'a [(&'static str, String)], name: &str) -> &'a str {
        headers
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
            .unwrap()
    }

    #[tokio::test]
    async fn test_record_carries_failure_metadata() {
        let message = Message::new("live_score", 2, 41, Some(b"{\"eventId\":1234}".to_vec()))
            .with_key(Some(b"1234".to_vec()));
        let mut state = RetryState::new(&RetryPolicy::new(
            1,
            Duration::from_millis(10),
            Duration::from_millis(10),
        ));
        state.record_failure(ErrorClass::Transient, "timeout").unwrap();
        state.record_failure(ErrorClass::Transient, "connection reset").unwrap();

        let record = DeadLetterRecord::from_state(&message, &state);

        assert_eq!(record.payload.as_deref(), message.payload());
        assert_eq!(record.record_key(), b"1234".to_vec());
        assert_eq!(record.attempts, 2);
        assert_eq!(record.error_class, ErrorClass::Transient);

        let headers = record.headers();
        assert_eq!(header(&headers, headers::ORIGINAL_TOPIC), "live_score");
        assert_eq!(header(&headers, headers::ORIGINAL_PARTITION), "2");
        assert_eq!(header(&headers, headers::ORIGINAL_OFFSET), "41");
        assert_eq!(header(&headers, headers::ATTEMPTS), "2");
        assert_eq!(header(&headers, headers::ERROR_CLASS), "transient");
        assert_eq!(header(&headers, headers::LAST_ERROR), "connection reset");

        let history: Vec<FailureRecord> =
            serde_json::from_str(header(&headers, headers::FAILURE_HISTORY)).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].reason, "timeout");
    }

    #[test]
    fn test_record_key_falls_back_to_position() {
        let message = Message::new("live_score", 0, 9, None);
        let mut state = RetryState::new(&RetryPolicy::default());
        state.reject_undecodable("empty payload").unwrap();

        let record = DeadLetterRecord::from_state(&message, &state);

        assert_eq!(record.record_key(), b"0-9".to_vec());
        assert_eq!(record.attempts, 0);
        assert_eq!(record.error_class, ErrorClass::Deserialization);
    }

    #[test]
    fn test_deserialization_error_maps_to_validation() {
        let err = Error::from(KafkaIntegrationError::DeserializationError("bad".into()));
        assert!(err.should_dlq());
        let err = Error::from(KafkaIntegrationError::DlqError("broker down".into()));
        assert!(err.is_retryable());
    }
}
