//! Live score handler

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{HandlerFailure, HandlerResult, MessageHandler};
use crate::models::{LiveScoreMessage, Message};

/// Latest score seen per event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreEntry {
    pub score: String,
    pub offset: i64,
    pub partition: i32,
}

/// In-memory view of the most recent score per event.
///
/// Updates are keyed on the source offset so a redelivered message never
/// overwrites a newer score.
#[derive(Debug, Clone, Default)]
pub struct LiveScoreBoard {
    scores: Arc<RwLock<HashMap<i64, ScoreEntry>>>,
}

impl LiveScoreBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a score; returns false when the entry is already at or past `offset`
    pub async fn update(&self, event_id: i64, score: &str, partition: i32, offset: i64) -> bool {
        let mut scores = self.scores.write().await;

        match scores.get(&event_id) {
            Some(entry) if entry.partition == partition && entry.offset >= offset => false,
            _ => {
                scores.insert(
                    event_id,
                    ScoreEntry {
                        score: score.to_string(),
                        offset,
                        partition,
                    },
                );
                true
            },
        }
    }

    pub async fn latest(&self, event_id: i64) -> Option<ScoreEntry> {
        self.scores.read().await.get(&event_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.scores.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.scores.read().await.is_empty()
    }
}

/// Handles messages from the live score topic
#[derive(Debug, Clone, Default)]
pub struct LiveScoreHandler {
    board: LiveScoreBoard,
}

impl LiveScoreHandler {
    pub fn new(board: LiveScoreBoard) -> Self {
        Self { board }
    }

    pub fn board(&self) -> &LiveScoreBoard {
        &self.board
    }
}

#[async_trait]
impl MessageHandler for LiveScoreHandler {
    type Payload = LiveScoreMessage;

    async fn handle(&self, payload: &LiveScoreMessage, message: &Message) -> HandlerResult {
        payload
            .check()
            .map_err(|errors| HandlerFailure::permanent(errors.to_string()))?;

        info!(
            event_id = payload.event_id,
            current_score = %payload.current_score,
            partition = message.partition(),
            offset = message.offset(),
            "Received live score"
        );

        let applied = self
            .board
            .update(
                payload.event_id,
                &payload.current_score,
                message.partition(),
                message.offset(),
            )
            .await;

        if !applied {
            debug!(
                event_id = payload.event_id,
                offset = message.offset(),
                "Score already applied, skipping"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::live_score_record;

    #[tokio::test]
    async fn test_valid_score_updates_board() {
        let handler = LiveScoreHandler::default();
        let payload = LiveScoreMessage::new(1234, "2:1");

        let result = handler.handle(&payload, &live_score_record(0, 7, 1234)).await;

        assert!(result.is_ok());
        let entry = handler.board().latest(1234).await.unwrap();
        assert_eq!(entry.score, "2:1");
        assert_eq!(entry.offset, 7);
    }

    #[tokio::test]
    async fn test_out_of_range_event_is_business_failure() {
        let handler = LiveScoreHandler::default();
        let payload = LiveScoreMessage::new(42, "0:0");

        let result = handler.handle(&payload, &live_score_record(0, 1, 42)).await;

        assert!(matches!(result, Err(HandlerFailure::Permanent(_))));
        assert!(handler.board().is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_score_is_business_failure() {
        let handler = LiveScoreHandler::default();
        let payload = LiveScoreMessage::new(1234, "");

        let result = handler.handle(&payload, &live_score_record(0, 1, 1234)).await;

        assert!(matches!(result, Err(HandlerFailure::Permanent(_))));
    }

    #[tokio::test]
    async fn test_redelivery_is_idempotent() {
        let handler = LiveScoreHandler::default();

        handler
            .handle(&LiveScoreMessage::new(1234, "1:0"), &live_score_record(0, 5, 1234))
            .await
            .unwrap();
        handler
            .handle(&LiveScoreMessage::new(1234, "2:0"), &live_score_record(0, 6, 1234))
            .await
            .unwrap();
        // offset 5 delivered again after a restart
        handler
            .handle(&LiveScoreMessage::new(1234, "1:0"), &live_score_record(0, 5, 1234))
            .await
            .unwrap();

        let entry = handler.board().latest(1234).await.unwrap();
        assert_eq!(entry.score, "2:0");
        assert_eq!(entry.offset, 6);
        assert_eq!(handler.board().len().await, 1);
    }
}
