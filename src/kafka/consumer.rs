//! Kafka event consumer with manual offset management

use futures::stream::StreamExt;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message as KafkaMessage;
use rdkafka::topic_partition_list::TopicPartitionList;
use rdkafka::Offset;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{
    DeadLetterSink, DlqProducer, KafkaConfig, KafkaIntegrationError, MessageProcessor,
    OffsetCommitter, PartitionRouter, WorkerReport,
};
use crate::api::{HealthState, HealthStatus};
use crate::dispatch::MessageHandler;
use crate::error::{Error, Result};
use crate::models::Message;
use crate::retry::{RetryCoordinator, RetryPolicy};

const COMPONENT: &str = "consumer";

/// Commits offsets synchronously through the shared consumer
#[derive(Clone)]
pub struct KafkaOffsetCommitter {
    consumer: Arc<StreamConsumer>,
}

impl KafkaOffsetCommitter {
    pub fn new(consumer: Arc<StreamConsumer>) -> Self {
        Self { consumer }
    }
}

impl OffsetCommitter for KafkaOffsetCommitter {
    fn commit(&self, topic: &str, partition: i32, next_offset: i64) -> Result<()> {
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(topic, partition, Offset::Offset(next_offset))
            .map_err(|e| KafkaIntegrationError::OffsetCommitError(e.to_string()))?;

        self.consumer
            .commit(&offsets, CommitMode::Sync)
            .map_err(|e| KafkaIntegrationError::OffsetCommitError(e.to_string()))?;

        Ok(())
    }
}

/// Copy a broker message into an owned [`Message`]
pub(crate) fn to_message<M: KafkaMessage>(message: &M) -> Message {
    Message::new(
        message.topic(),
        message.partition(),
        message.offset(),
        message.payload().map(<[u8]>::to_vec),
    )
    .with_key(message.key().map(<[u8]>::to_vec))
    .with_timestamp(message.timestamp().to_millis())
}

/// Event consumer that feeds the partition workers
pub struct EventConsumer<H: MessageHandler> {
    /// Kafka consumer instance, shared with the offset committer
    consumer: Arc<StreamConsumer>,

    /// Partition fan-out
    router: PartitionRouter<H>,

    /// Dead-letter producer, flushed on shutdown
    dead_letters: Arc<DlqProducer>,

    /// Configuration
    config: KafkaConfig,

    /// Stops intake when cancelled
    shutdown: CancellationToken,

    health: Option<Arc<HealthState>>,
}

impl<H: MessageHandler> EventConsumer<H> {
    /// Create a consumer subscribed to the configured topic.
    ///
    /// `shutdown` stops intake; `interrupt` ends in-flight backoff waits.
    pub fn new(
        config: KafkaConfig,
        handler: Arc<H>,
        policy: RetryPolicy,
        shutdown: CancellationToken,
        interrupt: CancellationToken,
    ) -> Result<Self> {
        let consumer: StreamConsumer = config
            .build_consumer_config()
            .create()
            .map_err(KafkaIntegrationError::ConnectionError)?;

        consumer
            .subscribe(&[&config.topic])
            .map_err(KafkaIntegrationError::ConnectionError)?;

        let consumer = Arc::new(consumer);

        let dead_letters = Arc::new(DlqProducer::new(
            config.build_producer_config(),
            config.dlq_topic.clone(),
        )?);

        let processor = MessageProcessor::new(
            handler,
            RetryCoordinator::new(policy, interrupt),
            Arc::clone(&dead_letters) as Arc<dyn DeadLetterSink>,
        );

        let router = PartitionRouter::new(
            processor,
            Arc::new(KafkaOffsetCommitter::new(Arc::clone(&consumer))),
            config.batch_size,
            shutdown.clone(),
        );

        Ok(Self {
            consumer,
            router,
            dead_letters,
            config,
            shutdown,
            health: None,
        })
    }

    /// Report consumer and worker state to the readiness endpoint
    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.router = self.router.with_health(Arc::clone(&health));
        self.health = Some(health);
        self
    }

    async fn set_health(&self, status: HealthStatus, message: &str) {
        if let Some(health) = &self.health {
            health
                .update_component(COMPONENT.to_string(), status, Some(message.to_string()))
                .await;
        }
    }

    /// Consume until shutdown, then wait for the partition workers
    pub async fn start(mut self) -> Result<Vec<WorkerReport>> {
        info!(
            topic = %self.config.topic,
            consumer_group = %self.config.consumer_group,
            batch_size = self.config.batch_size,
            "Starting Kafka consumer"
        );
        self.set_health(HealthStatus::Healthy, "consuming").await;

        let intake = self.consume_loop().await;

        let Self {
            router,
            dead_letters,
            health,
            ..
        } = self;

        let workers = router.shutdown().await;

        if let Err(e) = dead_letters.flush() {
            warn!(error = %e, "Failed to flush dead-letter producer");
        }

        let outcome = intake.and(workers);
        if let Some(health) = health {
            let (status, message) = match &outcome {
                Ok(_) => (HealthStatus::Degraded, "stopped".to_string()),
                Err(e) => (HealthStatus::Unhealthy, e.to_string()),
            };
            health
                .update_component(COMPONENT.to_string(), status, Some(message))
                .await;
        }

        info!("Kafka consumer stopped");
        outcome
    }

    /// Internal consumption loop
    async fn consume_loop(&mut self) -> Result<()> {
        let consumer = Arc::clone(&self.consumer);
        let stream = consumer.stream();
        tokio::pin!(stream);

        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, stopping intake");
                    return Ok(());
                },
                // copy out before the next await; borrowed messages are not Send
                next = stream.next() => next.map(|polled| polled.map(|m| to_message(&m))),
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    error!(error = %e, "Kafka consumer error");
                    continue;
                },
                None => {
                    warn!("Kafka message stream ended");
                    return Ok(());
                },
            };

            match self.router.route(message).await {
                Ok(()) => {},
                Err(Error::ShuttingDown) => {
                    info!("Shutdown requested while routing, stopping intake");
                    return Ok(());
                },
                Err(e) => {
                    error!(error = %e, error_kind = e.kind(), "Cannot route message, stopping intake");
                    self.shutdown.cancel();
                    return Err(e);
                },
            }
        }
    }
}
