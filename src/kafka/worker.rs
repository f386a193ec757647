//! Partition worker: processes one partition's messages in offset order
//! and commits offsets only for resolved messages

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use super::{MessageProcessor, Outcome};
use crate::api::{HealthState, HealthStatus};
use crate::dispatch::MessageHandler;
use crate::error::Result;
use crate::models::Message;

/// Commits consumer offsets
pub trait OffsetCommitter: Send + Sync {
    /// Commit `next_offset` (last resolved offset + 1) for a partition
    fn commit(&self, topic: &str, partition: i32, next_offset: i64) -> Result<()>;
}

/// Counters for one partition worker's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub partition: i32,
    pub acknowledged: u64,
    pub dead_lettered: u64,
    pub interrupted: u64,
    /// Last committed next-offset
    pub committed_offset: Option<i64>,
    pub commit_failures: u64,
}

pub struct PartitionWorker<H: MessageHandler> {
    partition: i32,
    receiver: mpsc::Receiver<Message>,
    processor: MessageProcessor<H>,
    committer: Arc<dyn OffsetCommitter>,
    batch_size: usize,
    shutdown: CancellationToken,
    health: Option<Arc<HealthState>>,
    report: WorkerReport,
}

impl<H: MessageHandler> PartitionWorker<H> {
    pub fn new(
        partition: i32,
        receiver: mpsc::Receiver<Message>,
        processor: MessageProcessor<H>,
        committer: Arc<dyn OffsetCommitter>,
        batch_size: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            partition,
            receiver,
            processor,
            committer,
            batch_size: batch_size.max(1),
            shutdown,
            health: None,
            report: WorkerReport {
                partition,
                ..Default::default()
            },
        }
    }

    /// Report worker state to the readiness endpoint
    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = Some(health);
        self
    }

    fn component(&self) -> String {
        format!("partition-{}", self.partition)
    }

    async fn set_health(&self, status: HealthStatus, message: String) {
        if let Some(health) = &self.health {
            health
                .update_component(self.component(), status, Some(message))
                .await;
        }
    }

    /// Run until the channel closes, shutdown is requested, or a
    /// dead-letter publish fails
    pub async fn run(mut self) -> Result<WorkerReport> {
        info!(partition = self.partition, "Partition worker started");
        self.set_health(HealthStatus::Healthy, "running".to_string())
            .await;

        let mut batch = Vec::with_capacity(self.batch_size);

        loop {
            batch.clear();

            let received = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => 0,
                count = self.receiver.recv_many(&mut batch, self.batch_size) => count,
            };

            // zero means shutdown or a closed channel
            if received == 0 {
                break;
            }

            debug!(partition = self.partition, size = received, "Processing batch");

            match self.process_batch(&batch).await {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => {
                    self.set_health(HealthStatus::Unhealthy, e.to_string()).await;
                    return Err(e);
                },
            }
        }

        info!(
            partition = self.partition,
            acknowledged = self.report.acknowledged,
            dead_lettered = self.report.dead_lettered,
            interrupted = self.report.interrupted,
            committed_offset = ?self.report.committed_offset,
            "Partition worker stopped"
        );
        self.set_health(HealthStatus::Degraded, "stopped".to_string())
            .await;

        Ok(self.report)
    }

    /// Process a batch in order. Returns `Ok(false)` when the worker must
    /// stop taking messages.
    async fn process_batch(&mut self, batch: &[Message]) -> Result<bool> {
        let mut last_resolved: Option<&Message> = None;
        let mut keep_running = true;
        let mut failure = None;

        for message in batch {
            // messages not yet started stay uncommitted for redelivery
            if self.shutdown.is_cancelled() {
                keep_running = false;
                break;
            }

            let span = crate::kafka_span!(message.partition(), message.offset());
            let result = self.processor.process(message).instrument(span.clone()).await;

            match result {
                Ok(outcome) => {
                    span.record("attempts", outcome.attempts());
                    span.record("outcome", outcome.as_str());

                    match outcome {
                        Outcome::Acknowledged { .. } => self.report.acknowledged += 1,
                        Outcome::DeadLettered { .. } => self.report.dead_lettered += 1,
                        Outcome::Interrupted { .. } => {
                            self.report.interrupted += 1;
                            keep_running = false;
                            break;
                        },
                    }
                    last_resolved = Some(message);
                },
                Err(e) => {
                    error!(
                        partition = message.partition(),
                        offset = message.offset(),
                        error = %e,
                        "Dead-letter publish failed, stopping partition worker"
                    );
                    failure = Some(e);
                    break;
                },
            }
        }

        if let Some(message) = last_resolved {
            self.commit(message);
        }

        if let Some(e) = failure {
            return Err(e);
        }

        if !keep_running {
            warn!(
                partition = self.partition,
                committed_offset = ?self.report.committed_offset,
                "Partition worker interrupted, unresolved messages left uncommitted"
            );
        }

        Ok(keep_running)
    }

    /// A failed commit is not fatal: the offset stays uncommitted until the
    /// next successful commit on this partition covers it, or the message is
    /// redelivered after a rebalance.
    fn commit(&mut self, message: &Message) {
        let next_offset = message.next_offset();

        match self
            .committer
            .commit(message.topic(), self.partition, next_offset)
        {
            Ok(()) => {
                debug!(partition = self.partition, next_offset, "Committed offset");
                self.report.committed_offset = Some(next_offset);
            },
            Err(e) => {
                self.report.commit_failures += 1;
                warn!(
                    partition = self.partition,
                    next_offset,
                    error = %e,
                    error_kind = e.kind(),
                    "Offset commit failed, continuing"
                );
            },
        }
    }
}
