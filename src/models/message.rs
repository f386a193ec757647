//! Consumed message model
//!
//! A `Message` is the owned, immutable view of one record pulled from the
//! source topic. It is detached from the broker client so it can cross task
//! boundaries and outlive the poll that produced it.

/// A record consumed from a topic partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    topic: String,
    partition: i32,
    offset: i64,
    key: Option<Vec<u8>>,
    payload: Option<Vec<u8>>,
    timestamp: Option<i64>,
}

impl Message {
    /// Create a message without key or broker timestamp
    pub fn new(
        topic: impl Into<String>,
        partition: i32,
        offset: i64,
        payload: Option<Vec<u8>>,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            payload,
            timestamp: None,
        }
    }

    /// Attach the record key
    pub fn with_key(mut self, key: Option<Vec<u8>>) -> Self {
        self.key = key;
        self
    }

    /// Attach the broker timestamp (milliseconds since epoch)
    pub fn with_timestamp(mut self, timestamp: Option<i64>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    /// Offset to commit once this message is resolved
    pub fn next_offset(&self) -> i64 {
        self.offset + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_accessors() {
        let message = Message::new("live_score", 2, 41, Some(b"{}".to_vec()))
            .with_key(Some(b"1234".to_vec()))
            .with_timestamp(Some(1_700_000_000_000));

        assert_eq!(message.topic(), "live_score");
        assert_eq!(message.partition(), 2);
        assert_eq!(message.offset(), 41);
        assert_eq!(message.key(), Some(&b"1234"[..]));
        assert_eq!(message.payload(), Some(&b"{}"[..]));
        assert_eq!(message.timestamp(), Some(1_700_000_000_000));
        assert_eq!(message.next_offset(), 42);
    }

    #[test]
    fn test_message_without_payload() {
        let message = Message::new("live_score", 0, 0, None);
        assert!(message.payload().is_none());
        assert!(message.key().is_none());
    }
}
