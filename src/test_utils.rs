//! Test utilities for live-events
//!
//! This module provides in-memory stand-ins for the Kafka, handler and
//! score API seams, shared by unit and integration tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use crate::dispatch::{HandlerFailure, HandlerResult, MessageHandler};
use crate::error::{Error, Result};
use crate::kafka::{DeadLetterRecord, DeadLetterSink, OffsetCommitter};
use crate::models::{LiveScoreMessage, Message};
use crate::tracker::{ScorePublisher, ScoreSnapshot, ScoreSource};

/// Build a live score message at `partition`/`offset`
pub fn live_score_record(partition: i32, offset: i64, event_id: i64) -> Message {
    let payload = serde_json::to_vec(&LiveScoreMessage::new(event_id, format!("{}:0", offset)))
        .unwrap_or_default();

    Message::new("live_score", partition, offset, Some(payload))
        .with_key(Some(event_id.to_string().into_bytes()))
}

/// Handler whose result per `(partition, offset)` is scripted
#[derive(Debug, Clone, Default)]
pub struct ScriptedHandler {
    scripts: Arc<Mutex<HashMap<(i32, i64), VecDeque<HandlerFailure>>>>,
    always: Arc<Mutex<HashMap<(i32, i64), HandlerFailure>>>,
    calls: Arc<Mutex<Vec<(i32, i64)>>>,
}

impl ScriptedHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` invocations for a message, then succeed
    pub fn fail_times(&self, partition: i32, offset: i64, times: usize, failure: HandlerFailure) {
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts.entry((partition, offset)).or_default();
        script.extend(std::iter::repeat(failure).take(times));
    }

    /// Fail every invocation for a message
    pub fn always_fail(&self, partition: i32, offset: i64, failure: HandlerFailure) {
        self.always
            .lock()
            .unwrap()
            .insert((partition, offset), failure);
    }

    /// Every invocation in order
    pub fn calls(&self) -> Vec<(i32, i64)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, partition: i32, offset: i64) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| **call == (partition, offset))
            .count()
    }

    /// Distinct messages the handler has seen
    pub fn seen(&self) -> HashSet<(i32, i64)> {
        self.calls.lock().unwrap().iter().copied().collect()
    }
}

#[async_trait]
impl MessageHandler for ScriptedHandler {
    type Payload = LiveScoreMessage;

    async fn handle(&self, _payload: &LiveScoreMessage, message: &Message) -> HandlerResult {
        let key = (message.partition(), message.offset());
        self.calls.lock().unwrap().push(key);

        if let Some(failure) = self.always.lock().unwrap().get(&key) {
            return Err(failure.clone());
        }

        match self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
        {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

/// Dead-letter sink that keeps records in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingDeadLetterSink {
    records: Arc<Mutex<Vec<DeadLetterRecord>>>,
    failing: bool,
}

impl RecordingDeadLetterSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every send fails
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<DeadLetterRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeadLetterSink for RecordingDeadLetterSink {
    async fn send(&self, record: &DeadLetterRecord) -> Result<()> {
        if self.failing {
            return Err(Error::kafka("dead-letter topic unavailable"));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Committer that records `(partition, next_offset)` pairs
#[derive(Debug, Clone, Default)]
pub struct RecordingCommitter {
    commits: Arc<Mutex<Vec<(i32, i64)>>>,
    reject_next: Arc<Mutex<HashSet<i32>>>,
}

impl RecordingCommitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next commit for `partition` the way a broker does after
    /// the group rebalanced
    pub fn fail_next_commit(&self, partition: i32) {
        self.reject_next.lock().unwrap().insert(partition);
    }

    pub fn commits(&self) -> Vec<(i32, i64)> {
        self.commits.lock().unwrap().clone()
    }

    /// Highest committed next-offset per partition
    pub fn last_committed(&self) -> Vec<(i32, i64)> {
        let mut last: HashMap<i32, i64> = HashMap::new();
        for (partition, offset) in self.commits.lock().unwrap().iter() {
            let entry = last.entry(*partition).or_insert(*offset);
            *entry = (*entry).max(*offset);
        }
        last.into_iter().collect()
    }
}

impl OffsetCommitter for RecordingCommitter {
    fn commit(&self, _topic: &str, partition: i32, next_offset: i64) -> Result<()> {
        if self.reject_next.lock().unwrap().remove(&partition) {
            return Err(Error::kafka(
                "Broker: Specified group generation id is not valid",
            ));
        }
        self.commits.lock().unwrap().push((partition, next_offset));
        Ok(())
    }
}

/// Score source returning `"{n}:0"` on the n-th successful call
#[derive(Debug, Clone, Default)]
pub struct MockScoreSource {
    calls: Arc<Mutex<usize>>,
    failures_left: Arc<Mutex<usize>>,
    reject: Arc<Mutex<bool>>,
}

impl MockScoreSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` calls with a retryable error
    pub fn fail_times(&self, times: usize) {
        *self.failures_left.lock().unwrap() = times;
    }

    /// Reject every call with a non-retryable error
    pub fn reject_all(&self) {
        *self.reject.lock().unwrap() = true;
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ScoreSource for MockScoreSource {
    async fn current_score(&self, event_id: i64) -> Result<ScoreSnapshot> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls
        };

        if *self.reject.lock().unwrap() {
            return Err(Error::validation(format!("unknown event {}", event_id)));
        }

        let mut failures_left = self.failures_left.lock().unwrap();
        if *failures_left > 0 {
            *failures_left -= 1;
            return Err(Error::http("score api unavailable"));
        }

        Ok(ScoreSnapshot {
            event_id,
            current_score: format!("{}:0", call),
        })
    }
}

/// Publisher that keeps published messages in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingScorePublisher {
    published: Arc<Mutex<Vec<LiveScoreMessage>>>,
    attempts: Arc<Mutex<usize>>,
    failures_left: Arc<Mutex<usize>>,
}

impl RecordingScorePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` publishes with a retryable error
    pub fn fail_times(&self, times: usize) {
        *self.failures_left.lock().unwrap() = times;
    }

    pub fn published(&self) -> Vec<LiveScoreMessage> {
        self.published.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl ScorePublisher for RecordingScorePublisher {
    async fn publish(&self, message: &LiveScoreMessage) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;

        let mut failures_left = self.failures_left.lock().unwrap();
        if *failures_left > 0 {
            *failures_left -= 1;
            return Err(Error::kafka("broker transport failure"));
        }

        self.published.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_handler_follows_script() {
        let handler = ScriptedHandler::new();
        handler.fail_times(0, 1, 1, HandlerFailure::transient("timeout"));
        let message = live_score_record(0, 1, 1234);
        let payload = LiveScoreMessage::new(1234, "1:0");

        assert!(handler.handle(&payload, &message).await.is_err());
        assert!(handler.handle(&payload, &message).await.is_ok());
        assert_eq!(handler.calls_for(0, 1), 2);
    }

    #[test]
    fn test_live_score_record_is_valid_json() {
        let message = live_score_record(1, 5, 1234);
        let decoded: LiveScoreMessage = serde_json::from_slice(message.payload().unwrap()).unwrap();
        assert_eq!(decoded, LiveScoreMessage::new(1234, "5:0"));
        assert_eq!(message.key(), Some(&b"1234"[..]));
    }
}
