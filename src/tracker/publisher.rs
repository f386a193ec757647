//! Publishes score snapshots to the live score topic

use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::kafka::KafkaIntegrationError;
use crate::models::LiveScoreMessage;

#[async_trait]
pub trait ScorePublisher: Send + Sync {
    async fn publish(&self, message: &LiveScoreMessage) -> Result<()>;
}

/// Sends `LiveScoreMessage` JSON keyed by event id
#[derive(Clone)]
pub struct KafkaScorePublisher {
    producer: FutureProducer,
    topic: String,
    send_timeout: Duration,
}

impl KafkaScorePublisher {
    pub fn new(config: ClientConfig, topic: String) -> Result<Self> {
        let producer: FutureProducer = config
            .create()
            .map_err(KafkaIntegrationError::ConnectionError)?;

        Ok(Self {
            producer,
            topic,
            send_timeout: Duration::from_secs(5),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl ScorePublisher for KafkaScorePublisher {
    async fn publish(&self, message: &LiveScoreMessage) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        let key = message.event_id.to_string();

        let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

        match self.producer.send(record, self.send_timeout).await {
            Ok(delivery) => {
                info!(
                    topic = %self.topic,
                    event_id = message.event_id,
                    current_score = %message.current_score,
                    delivery = ?delivery,
                    "Live score published"
                );
                Ok(())
            },
            Err((kafka_error, _)) => {
                error!(
                    topic = %self.topic,
                    event_id = message.event_id,
                    error = %kafka_error,
                    "Failed to publish live score"
                );
                Err(Error::from(KafkaIntegrationError::PublishError(
                    kafka_error.to_string(),
                )))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publisher_creation() {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", "localhost:9092");

        let publisher = KafkaScorePublisher::new(config, "live_score".to_string()).unwrap();
        assert_eq!(publisher.topic(), "live_score");
    }

    #[test]
    fn test_publish_error_is_retryable() {
        let err = Error::from(KafkaIntegrationError::PublishError("queue full".into()));
        assert!(err.is_retryable());
    }
}
