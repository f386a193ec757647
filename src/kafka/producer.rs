//! Dead-letter producer for messages that cannot be processed

use async_trait::async_trait;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::{error, info};

use super::{DeadLetterRecord, KafkaIntegrationError};
use crate::error::{Error, Result};

/// Destination for dead-lettered messages
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Publish one record; `Ok` means the broker acknowledged it
    async fn send(&self, record: &DeadLetterRecord) -> Result<()>;

    /// Flush any pending messages
    fn flush(&self) -> Result<()>;
}

/// Producer for sending messages to the dead-letter topic
#[derive(Clone)]
pub struct DlqProducer {
    /// Kafka producer instance
    producer: FutureProducer,

    /// Dead-letter topic name
    dlq_topic: String,

    /// Timeout for send operations
    send_timeout: Duration,
}

impl DlqProducer {
    /// Create a new DLQ producer
    pub fn new(config: ClientConfig, dlq_topic: String) -> Result<Self> {
        let producer: FutureProducer = config
            .create()
            .map_err(|e| Error::from(KafkaIntegrationError::ConnectionError(e)))?;

        Ok(Self {
            producer,
            dlq_topic,
            send_timeout: Duration::from_secs(30),
        })
    }

    pub fn topic(&self) -> &str {
        &self.dlq_topic
    }
}

fn owned_headers(record: &DeadLetterRecord) -> OwnedHeaders {
    record
        .headers()
        .into_iter()
        .fold(OwnedHeaders::new(), |headers, (key, value)| {
            headers.insert(Header {
                key,
                value: Some(value.as_bytes()),
            })
        })
}

#[async_trait]
impl DeadLetterSink for DlqProducer {
    async fn send(&self, record: &DeadLetterRecord) -> Result<()> {
        let key = record.record_key();

        let mut kafka_record: FutureRecord<'_, Vec<u8>, Vec<u8>> =
            FutureRecord::to(&self.dlq_topic)
                .key(&key)
                .headers(owned_headers(record));
        if let Some(payload) = record.payload.as_ref() {
            kafka_record = kafka_record.payload(payload);
        }

        match self.producer.send(kafka_record, self.send_timeout).await {
            Ok(delivery) => {
                info!(
                    dlq_topic = %self.dlq_topic,
                    source_partition = record.source_partition,
                    source_offset = record.source_offset,
                    attempts = record.attempts,
                    error_class = %record.error_class,
                    delivery = ?delivery,
                    "Sent message to dead-letter topic"
                );
                Ok(())
            },
            Err((kafka_error, _)) => {
                error!(
                    dlq_topic = %self.dlq_topic,
                    source_partition = record.source_partition,
                    source_offset = record.source_offset,
                    error = %kafka_error,
                    "Failed to send message to dead-letter topic"
                );
                Err(Error::from(KafkaIntegrationError::DlqError(format!(
                    "Failed to send to {}: {}",
                    self.dlq_topic, kafka_error
                ))))
            },
        }
    }

    fn flush(&self) -> Result<()> {
        self.producer
            .flush(self.send_timeout)
            .map_err(|e| Error::from(KafkaIntegrationError::DlqError(e.to_string())))
    }
}
