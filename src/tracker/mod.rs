//! Live event tracking
//!
//! Each tracked event gets a periodic job that fetches the current score
//! from the score API and publishes it to the score topic. A failed cycle
//! is logged; the next tick runs as usual.

mod job;
mod publisher;
mod source;

pub use job::ScoreCycle;
pub use publisher::{KafkaScorePublisher, ScorePublisher};
pub use source::{RestScoreSource, ScoreSnapshot, ScoreSource};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api::{HealthState, HealthStatus};
use crate::error::Result;
use crate::models::TrackingRequest;

/// What `track` did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackAction {
    Scheduled,
    AlreadyScheduled,
    Unscheduled,
    NotScheduled,
}

/// Snapshot of a scheduled job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobInfo {
    pub event_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub running: bool,
}

struct ScheduledJob {
    token: CancellationToken,
    handle: JoinHandle<()>,
    scheduled_at: DateTime<Utc>,
}

/// Schedules and unschedules one polling job per event
pub struct LiveEventTracker {
    cycle: Arc<ScoreCycle>,
    period: Duration,
    jobs: Mutex<HashMap<i64, ScheduledJob>>,
    shutdown: CancellationToken,
    health: Option<Arc<HealthState>>,
}

impl LiveEventTracker {
    /// Jobs tick every `period`, first tick immediately. Cancelling
    /// `shutdown` stops every job.
    pub fn new(cycle: ScoreCycle, period: Duration, shutdown: CancellationToken) -> Self {
        Self {
            cycle: Arc::new(cycle),
            period,
            jobs: Mutex::new(HashMap::new()),
            shutdown,
            health: None,
        }
    }

    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = Some(health);
        self
    }

    /// Start (`status = true`) or stop tracking an event
    pub async fn track(&self, request: TrackingRequest) -> Result<TrackAction> {
        request.check()?;

        let action = if request.status {
            self.schedule(request.event_id).await
        } else {
            self.unschedule(request.event_id).await
        };

        self.report_health().await;
        Ok(action)
    }

    async fn schedule(&self, event_id: i64) -> TrackAction {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&event_id) {
            return TrackAction::AlreadyScheduled;
        }

        info!(event_id, period_secs = self.period.as_secs(), "Scheduling live score tracker");

        let token = self.shutdown.child_token();
        let handle = tokio::spawn(run_job(
            Arc::clone(&self.cycle),
            event_id,
            self.period,
            token.clone(),
        ));

        jobs.insert(
            event_id,
            ScheduledJob {
                token,
                handle,
                scheduled_at: Utc::now(),
            },
        );
        TrackAction::Scheduled
    }

    async fn unschedule(&self, event_id: i64) -> TrackAction {
        match self.jobs.lock().await.remove(&event_id) {
            Some(job) => {
                info!(event_id, "Unscheduling live score tracker");
                // a cycle already in progress is allowed to finish
                job.token.cancel();
                TrackAction::Unscheduled
            },
            None => TrackAction::NotScheduled,
        }
    }

    pub async fn scheduled_job(&self, event_id: i64) -> Option<JobInfo> {
        self.jobs.lock().await.get(&event_id).map(|job| JobInfo {
            event_id,
            scheduled_at: job.scheduled_at,
            running: !job.handle.is_finished(),
        })
    }

    pub async fn is_tracking(&self, event_id: i64) -> bool {
        self.jobs.lock().await.contains_key(&event_id)
    }

    /// Tracked event ids, ascending
    pub async fn tracked_events(&self) -> Vec<i64> {
        let mut events: Vec<i64> = self.jobs.lock().await.keys().copied().collect();
        events.sort_unstable();
        events
    }

    /// Cancel every job and wait for them to stop
    pub async fn shutdown(&self) {
        let jobs: Vec<(i64, ScheduledJob)> = self.jobs.lock().await.drain().collect();
        info!(jobs = jobs.len(), "Stopping live score trackers");

        for (_, job) in &jobs {
            job.token.cancel();
        }
        for (event_id, job) in jobs {
            if let Err(e) = job.handle.await {
                error!(event_id, error = %e, "Live score tracker panicked");
            }
        }

        self.report_health().await;
    }

    async fn report_health(&self) {
        if let Some(health) = &self.health {
            let tracked = self.jobs.lock().await.len();
            health
                .update_component(
                    "tracker".to_string(),
                    HealthStatus::Healthy,
                    Some(format!("tracking {} event(s)", tracked)),
                )
                .await;
        }
    }
}

async fn run_job(cycle: Arc<ScoreCycle>, event_id: i64, period: Duration, token: CancellationToken) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {},
        }

        if let Err(e) = cycle.run_once(event_id).await {
            error!(
                event_id,
                error = %e,
                error_kind = e.kind(),
                "Could not publish live score for this cycle"
            );
        }
    }

    info!(event_id, "Live score tracker stopped");
}
