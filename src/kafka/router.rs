//! Routes consumed messages to per-partition workers

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{MessageProcessor, OffsetCommitter, PartitionWorker, WorkerReport};
use crate::api::HealthState;
use crate::dispatch::MessageHandler;
use crate::error::{Error, Result};
use crate::models::Message;

struct WorkerSlot {
    sender: mpsc::Sender<Message>,
    handle: JoinHandle<Result<WorkerReport>>,
}

/// Spawns one worker per partition on first sight and feeds it through a
/// bounded channel. A full channel suspends `route`, which stalls intake.
pub struct PartitionRouter<H: MessageHandler> {
    processor: MessageProcessor<H>,
    committer: Arc<dyn OffsetCommitter>,
    batch_size: usize,
    capacity: usize,
    shutdown: CancellationToken,
    health: Option<Arc<HealthState>>,
    workers: HashMap<i32, WorkerSlot>,
}

impl<H: MessageHandler> PartitionRouter<H> {
    pub fn new(
        processor: MessageProcessor<H>,
        committer: Arc<dyn OffsetCommitter>,
        batch_size: usize,
        shutdown: CancellationToken,
    ) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            processor,
            committer,
            batch_size,
            capacity: batch_size * 2,
            shutdown,
            health: None,
            workers: HashMap::new(),
        }
    }

    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = Some(health);
        self
    }

    /// Partitions with a running worker, ascending
    pub fn partitions(&self) -> Vec<i32> {
        let mut partitions: Vec<i32> = self.workers.keys().copied().collect();
        partitions.sort_unstable();
        partitions
    }

    fn spawn_worker(&self, partition: i32) -> WorkerSlot {
        let (sender, receiver) = mpsc::channel(self.capacity);

        let mut worker = PartitionWorker::new(
            partition,
            receiver,
            self.processor.clone(),
            Arc::clone(&self.committer),
            self.batch_size,
            self.shutdown.clone(),
        );
        if let Some(health) = &self.health {
            worker = worker.with_health(Arc::clone(health));
        }

        debug!(partition, capacity = self.capacity, "Spawning partition worker");

        WorkerSlot {
            sender,
            handle: tokio::spawn(worker.run()),
        }
    }

    /// Hand a message to its partition worker, waiting while the queue is full
    pub async fn route(&mut self, message: Message) -> Result<()> {
        let partition = message.partition();

        if !self.workers.contains_key(&partition) {
            let slot = self.spawn_worker(partition);
            self.workers.insert(partition, slot);
        }

        let sender = match self.workers.get(&partition) {
            Some(slot) => slot.sender.clone(),
            None => return Err(Error::internal(format!("No worker for partition {}", partition))),
        };

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(Error::ShuttingDown),
            sent = sender.send(message) => sent.map_err(|_| {
                Error::internal(format!("Partition worker {} has stopped", partition))
            }),
        }
    }

    /// Close every queue and wait for the workers to finish
    pub async fn shutdown(self) -> Result<Vec<WorkerReport>> {
        info!(workers = self.workers.len(), "Stopping partition workers");

        let mut reports = Vec::with_capacity(self.workers.len());
        let mut first_error = None;

        for (partition, slot) in self.workers {
            drop(slot.sender);

            match slot.handle.await {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(e)) => {
                    error!(partition, error = %e, "Partition worker failed");
                    first_error.get_or_insert(e);
                },
                Err(e) => {
                    error!(partition, error = %e, "Partition worker panicked");
                    first_error.get_or_insert(Error::internal(format!(
                        "Partition worker {} panicked",
                        partition
                    )));
                },
            }
        }

        reports.sort_by_key(|report| report.partition);

        match first_error {
            Some(e) => Err(e),
            None => Ok(reports),
        }
    }
}
