//! live-events
//!
//! Consumes live score messages with bounded retries and a dead-letter
//! topic, and polls the score API for tracked events.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use live_events::{
    api::{create_server, shutdown_signal, HealthState},
    config::Config,
    dispatch::LiveScoreHandler,
    error::{Error, Result},
    kafka::EventConsumer,
    logging,
    models::TrackingRequest,
    tracker::{KafkaScorePublisher, LiveEventTracker, RestScoreSource, ScoreCycle},
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Arc::new(Config::from_env()?);
    config.validate()?;

    logging::init_tracing(&config.server.log_level, &config.server.environment)?;
    config.log_config();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting live-events");

    let health = Arc::new(HealthState::with_required(["consumer"]));
    // stops intake and the tracker
    let shutdown = CancellationToken::new();
    // ends backoff waits once the grace period is over
    let interrupt = CancellationToken::new();

    let consumer = EventConsumer::new(
        config.kafka.clone(),
        Arc::new(LiveScoreHandler::default()),
        config.retry.policy(),
        shutdown.clone(),
        interrupt.clone(),
    )?
    .with_health(Arc::clone(&health));
    let mut consumer_task = tokio::spawn(consumer.start());

    let cycle = ScoreCycle::new(
        Arc::new(RestScoreSource::new(
            &config.tracker.score_api_base_url,
            config.server.request_timeout(),
        )?),
        Arc::new(KafkaScorePublisher::new(
            config.kafka.build_producer_config(),
            config.kafka.score_topic.clone(),
        )?),
        config.tracker.retry_policy(),
    );
    let tracker = LiveEventTracker::new(cycle, config.tracker.cycle(), shutdown.clone())
        .with_health(Arc::clone(&health));
    for event_id in config.tracker.event_ids()? {
        tracker.track(TrackingRequest::new(event_id, true)).await?;
    }

    let server = tokio::spawn(create_server(
        Arc::clone(&config),
        Arc::clone(&health),
        shutdown.clone(),
    ));

    let finished_early = tokio::select! {
        _ = shutdown_signal() => None,
        result = &mut consumer_task => Some(result),
    };
    shutdown.cancel();

    let consumer_result = match finished_early {
        Some(result) => result,
        None => {
            let grace = config.server.shutdown_timeout();
            match tokio::time::timeout(grace, &mut consumer_task).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        grace_secs = grace.as_secs(),
                        "Grace period elapsed, interrupting in-flight retries"
                    );
                    interrupt.cancel();
                    consumer_task.await
                },
            }
        },
    };

    tracker.shutdown().await;

    match server.await {
        Ok(Err(e)) => error!(error = %e, "HTTP server failed"),
        Err(e) => error!(error = %e, "HTTP server task panicked"),
        Ok(Ok(())) => {},
    }

    let reports = consumer_result
        .map_err(|e| Error::internal(format!("Consumer task panicked: {}", e)))?
        .inspect_err(|e| error!(error = %e, error_kind = e.kind(), "Consumer stopped with an error"))?;

    for report in reports {
        info!(
            partition = report.partition,
            acknowledged = report.acknowledged,
            dead_lettered = report.dead_lettered,
            interrupted = report.interrupted,
            committed_offset = ?report.committed_offset,
            commit_failures = report.commit_failures,
            "Partition worker summary"
        );
    }

    info!("live-events shutdown complete");
    Ok(())
}
