//! One fetch-and-publish cycle of a tracking job

use std::sync::Arc;
use tracing::info;

use super::{ScorePublisher, ScoreSource};
use crate::error::{Error, Result};
use crate::models::LiveScoreMessage;
use crate::retry::{RetryError, RetryPolicy};

fn classify(err: Error) -> backoff::Error<Error> {
    if err.is_retryable() {
        backoff::Error::transient(err)
    } else {
        backoff::Error::permanent(err)
    }
}

/// Fetches an event's score and publishes it, each step under the retry policy
pub struct ScoreCycle {
    source: Arc<dyn ScoreSource>,
    publisher: Arc<dyn ScorePublisher>,
    policy: RetryPolicy,
}

impl ScoreCycle {
    pub fn new(
        source: Arc<dyn ScoreSource>,
        publisher: Arc<dyn ScorePublisher>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            source,
            publisher,
            policy,
        }
    }

    pub async fn run_once(&self, event_id: i64) -> Result<LiveScoreMessage> {
        let source = &self.source;
        let snapshot = self
            .policy
            .run("fetch_score", || async move {
                source.current_score(event_id).await.map_err(classify)
            })
            .await
            .map_err(RetryError::into_inner)?;

        let message = LiveScoreMessage::from(snapshot);

        let publisher = &self.publisher;
        let outgoing = &message;
        self.policy
            .run("publish_score", || async move {
                publisher.publish(outgoing).await.map_err(classify)
            })
            .await
            .map_err(RetryError::into_inner)?;

        info!(
            event_id = message.event_id,
            current_score = %message.current_score,
            "Live score cycle completed"
        );

        Ok(message)
    }
}
