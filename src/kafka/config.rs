//! Kafka settings shared by the consumer, the dead-letter producer and the
//! score publisher

use envconfig::Envconfig;
use rdkafka::ClientConfig;
use serde::{Deserialize, Serialize};

/// Largest accepted `batch_size`; worker queues are sized at twice this
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Kafka configuration settings
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct KafkaConfig {
    /// Comma-separated broker addresses
    #[envconfig(from = "KAFKA_BROKERS", default = "localhost:9092")]
    pub brokers: String,

    #[envconfig(from = "KAFKA_CONSUMER_GROUP", default = "live_score_group")]
    pub consumer_group: String,

    /// Source topic of the consumer
    #[envconfig(from = "KAFKA_TOPIC", default = "live_score")]
    pub topic: String,

    /// Dead-letter topic; must differ from `topic`
    #[envconfig(from = "KAFKA_DLQ_TOPIC", default = "live_score-dlt")]
    pub dlq_topic: String,

    /// Topic the score tracker publishes to
    #[envconfig(from = "KAFKA_SCORE_TOPIC", default = "live_score")]
    pub score_topic: String,

    #[envconfig(from = "KAFKA_SESSION_TIMEOUT_MS", default = "30000")]
    pub session_timeout_ms: u32,

    #[envconfig(from = "KAFKA_MAX_POLL_INTERVAL_MS", default = "300000")]
    pub max_poll_interval_ms: u32,

    /// Messages a partition worker takes per batch; its queue holds twice that
    #[envconfig(from = "KAFKA_BATCH_SIZE", default = "100")]
    pub batch_size: usize,

    #[envconfig(from = "KAFKA_IDEMPOTENT_PRODUCER", default = "true")]
    pub idempotent_producer: bool,

    #[envconfig(from = "KAFKA_COMPRESSION_TYPE", default = "snappy")]
    pub compression_type: String,

    #[envconfig(from = "KAFKA_FETCH_MIN_BYTES", default = "1")]
    pub fetch_min_bytes: i32,

    #[envconfig(from = "KAFKA_FETCH_MAX_WAIT_MS", default = "500")]
    pub fetch_max_wait_ms: i32,
}

/// Same values as the environment defaults
impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            consumer_group: "live_score_group".to_string(),
            topic: "live_score".to_string(),
            dlq_topic: "live_score-dlt".to_string(),
            score_topic: "live_score".to_string(),
            session_timeout_ms: 30_000,
            max_poll_interval_ms: 300_000,
            batch_size: 100,
            idempotent_producer: true,
            compression_type: "snappy".to_string(),
            fetch_min_bytes: 1,
            fetch_max_wait_ms: 500,
        }
    }
}

impl KafkaConfig {
    pub fn from_env() -> Result<Self, envconfig::Error> {
        Self::init_from_env()
    }

    /// Broker addresses with blanks dropped
    pub fn brokers_list(&self) -> Vec<String> {
        self.brokers
            .split(',')
            .map(str::trim)
            .filter(|broker| !broker.is_empty())
            .map(String::from)
            .collect()
    }

    /// Consumer settings. Offsets are neither stored nor committed by the
    /// client; partition workers commit them once messages are resolved.
    pub fn build_consumer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();

        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.consumer_group)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", self.session_timeout_ms.to_string())
            .set("max.poll.interval.ms", self.max_poll_interval_ms.to_string())
            .set("fetch.min.bytes", self.fetch_min_bytes.to_string())
            .set("fetch.wait.max.ms", self.fetch_max_wait_ms.to_string())
            .set("enable.partition.eof", "false")
            .set("isolation.level", "read_committed");

        config
    }

    /// Producer settings for the dead-letter and score topics
    pub fn build_producer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();

        config
            .set("bootstrap.servers", &self.brokers)
            .set("message.timeout.ms", "30000")
            .set("compression.type", &self.compression_type);

        if self.idempotent_producer {
            config
                .set("enable.idempotence", "true")
                .set("acks", "all")
                .set("max.in.flight.requests.per.connection", "5");
        } else {
            config.set("acks", "1");
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_topics() {
        let config = KafkaConfig::default();
        assert_eq!(config.topic, "live_score");
        assert_eq!(config.dlq_topic, "live_score-dlt");
        assert_eq!(config.score_topic, config.topic);
    }

    #[test]
    fn test_consumer_config_disables_auto_commit() {
        let consumer_config = KafkaConfig::default().build_consumer_config();

        assert_eq!(consumer_config.get("enable.auto.commit"), Some("false"));
        assert_eq!(consumer_config.get("enable.auto.offset.store"), Some("false"));
        assert_eq!(consumer_config.get("group.id"), Some("live_score_group"));
    }

    #[test]
    fn test_producer_config_idempotence() {
        let mut config = KafkaConfig::default();
        assert_eq!(config.build_producer_config().get("acks"), Some("all"));

        config.idempotent_producer = false;
        let producer_config = config.build_producer_config();
        assert_eq!(producer_config.get("acks"), Some("1"));
        assert_eq!(producer_config.get("enable.idempotence"), None);
    }

    #[test]
    fn test_brokers_list() {
        let config = KafkaConfig {
            brokers: "broker1:9092, broker2:9092,".to_string(),
            ..Default::default()
        };
        assert_eq!(config.brokers_list(), vec!["broker1:9092", "broker2:9092"]);
    }
}
