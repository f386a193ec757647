//! Integration tests for Kafka consumer functionality
//!
//! Tests marked `#[ignore]` need a broker on localhost:9092.

use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{Headers, Message as _};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use live_events::dispatch::LiveScoreHandler;
use live_events::kafka::{headers, EventConsumer, KafkaConfig};
use live_events::models::LiveScoreMessage;
use live_events::retry::RetryPolicy;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Test Kafka broker address
const TEST_KAFKA_BROKER: &str = "localhost:9092";

/// Create test topics for integration testing
async fn create_test_topics(topics: &[&str]) -> Result<(), Box<dyn std::error::Error>> {
    let admin: AdminClient<DefaultClientContext> =
        ClientConfig::new().set("bootstrap.servers", TEST_KAFKA_BROKER).create()?;

    let new_topics: Vec<NewTopic> = topics
        .iter()
        .map(|topic| NewTopic::new(topic, 1, TopicReplication::Fixed(1)))
        .collect();

    let results = admin.create_topics(&new_topics, &AdminOptions::new()).await?;

    for result in results {
        if let Err((topic, err)) = result {
            // Ignore if topic already exists
            if !err.to_string().contains("already exists") {
                return Err(format!("Failed to create topic {}: {}", topic, err).into());
            }
        }
    }

    Ok(())
}

/// Send a raw payload keyed by `key`
async fn send_raw(topic: &str, key: &str, payload: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", TEST_KAFKA_BROKER)
        .set("message.timeout.ms", "5000")
        .create()?;

    let record = FutureRecord::to(topic).payload(payload).key(key);

    producer
        .send(record, Timeout::After(Duration::from_secs(5)))
        .await
        .map_err(|(err, _)| err)?;

    Ok(())
}

fn test_config(topic: &str, dlq_topic: &str) -> KafkaConfig {
    KafkaConfig {
        brokers: TEST_KAFKA_BROKER.to_string(),
        consumer_group: format!("test-group-{}", Uuid::new_v4()),
        topic: topic.to_string(),
        dlq_topic: dlq_topic.to_string(),
        batch_size: 10,
        idempotent_producer: false,
        compression_type: "none".to_string(),
        ..KafkaConfig::default()
    }
}

#[tokio::test]
#[ignore] // Requires Kafka to be running
async fn test_kafka_consumer_dead_letters_bad_messages() {
    let topic = format!("test-live-score-{}", Uuid::new_v4());
    let dlq_topic = format!("{}-dlt", topic);
    create_test_topics(&[&topic, &dlq_topic]).await.expect("Failed to create topics");

    let valid = serde_json::to_vec(&LiveScoreMessage::new(1234, "1:0")).unwrap();
    let out_of_range = serde_json::to_vec(&LiveScoreMessage::new(42, "1:0")).unwrap();
    send_raw(&topic, "1234", &valid).await.expect("Failed to send");
    send_raw(&topic, "poison", b"{not json").await.expect("Failed to send");
    send_raw(&topic, "42", &out_of_range).await.expect("Failed to send");

    let handler = Arc::new(LiveScoreHandler::default());
    let shutdown = CancellationToken::new();
    let consumer = EventConsumer::new(
        test_config(&topic, &dlq_topic),
        Arc::clone(&handler),
        RetryPolicy::new(1, Duration::from_millis(100), Duration::from_millis(100)),
        shutdown.clone(),
        CancellationToken::new(),
    )
    .expect("Failed to create consumer");

    let task = tokio::spawn(consumer.start());
    tokio::time::sleep(Duration::from_secs(10)).await;
    shutdown.cancel();

    let reports = task.await.unwrap().expect("Consumer failed");
    assert_eq!(reports.iter().map(|r| r.acknowledged).sum::<u64>(), 1);
    assert_eq!(reports.iter().map(|r| r.dead_lettered).sum::<u64>(), 2);
    assert_eq!(handler.board().latest(1234).await.unwrap().score, "1:0");

    // Read the dead-letter topic back
    let dlq_consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", TEST_KAFKA_BROKER)
        .set("group.id", format!("dlq-reader-{}", Uuid::new_v4()))
        .set("auto.offset.reset", "earliest")
        .create()
        .expect("Failed to create DLQ reader");
    dlq_consumer.subscribe(&[&dlq_topic]).unwrap();

    let mut classes = HashMap::new();
    for _ in 0..2 {
        let message = tokio::time::timeout(Duration::from_secs(10), dlq_consumer.recv())
            .await
            .expect("Timed out reading dead-letter topic")
            .unwrap();

        let header_map: HashMap<String, String> = message
            .headers()
            .map(|hs| {
                hs.iter()
                    .map(|h| {
                        (
                            h.key.to_string(),
                            String::from_utf8_lossy(h.value.unwrap_or_default()).into_owned(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        assert_eq!(header_map[headers::ORIGINAL_TOPIC], topic);
        let key = String::from_utf8_lossy(message.key().unwrap()).into_owned();
        classes.insert(key, header_map[headers::ERROR_CLASS].clone());
    }

    assert_eq!(classes["poison"], "deserialization");
    assert_eq!(classes["42"], "business_rule");
}

#[test]
fn test_kafka_config_defaults() {
    let config = KafkaConfig::default();

    assert_eq!(config.brokers, "localhost:9092");
    assert_eq!(config.consumer_group, "live_score_group");
    assert_eq!(config.topic, "live_score");
    assert_eq!(config.dlq_topic, "live_score-dlt");
    assert_eq!(config.batch_size, 100);
}

#[test]
fn test_consumer_config_disables_auto_commit() {
    let client_config = KafkaConfig::default().build_consumer_config();

    assert_eq!(client_config.get("enable.auto.commit"), Some("false"));
    assert_eq!(client_config.get("group.id"), Some("live_score_group"));
}

#[test]
fn test_kafka_config_from_env() {
    std::env::set_var("KAFKA_BROKERS", "broker1:9092,broker2:9092");
    std::env::set_var("KAFKA_CONSUMER_GROUP", "test-group");
    std::env::set_var("KAFKA_TOPIC", "test-live-score");
    std::env::set_var("KAFKA_DLQ_TOPIC", "test-live-score-dlt");
    std::env::set_var("KAFKA_BATCH_SIZE", "50");

    let config = KafkaConfig::from_env().expect("Failed to load config from env");

    assert_eq!(config.brokers_list(), vec!["broker1:9092", "broker2:9092"]);
    assert_eq!(config.consumer_group, "test-group");
    assert_eq!(config.topic, "test-live-score");
    assert_eq!(config.dlq_topic, "test-live-score-dlt");
    assert_eq!(config.batch_size, 50);

    // Cleanup
    for var in [
        "KAFKA_BROKERS",
        "KAFKA_CONSUMER_GROUP",
        "KAFKA_TOPIC",
        "KAFKA_DLQ_TOPIC",
        "KAFKA_BATCH_SIZE",
    ] {
        std::env::remove_var(var);
    }
}
