//! Logging module for live-events
//!
//! Structured logging with the tracing crate: JSON output in production,
//! pretty formatting everywhere else.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::error::{Error, Result};

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence over `log_level` when set.
pub fn init_tracing(log_level: &str, environment: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(log_level)));

    if environment == "production" {
        let formatting_layer = fmt::layer()
            .json()
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true);

        Registry::default()
            .with(env_filter)
            .with(formatting_layer)
            .try_init()
            .map_err(|e| Error::internal(format!("Failed to initialize tracing: {}", e)))?;
    } else {
        let formatting_layer = fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE);

        Registry::default()
            .with(env_filter)
            .with(formatting_layer)
            .try_init()
            .map_err(|e| Error::internal(format!("Failed to initialize tracing: {}", e)))?;
    }

    tracing::info!(
        environment = environment,
        log_level = log_level,
        "Logging initialized"
    );

    Ok(())
}

fn default_directives(log_level: &str) -> String {
    format!("live_events={},rdkafka=warn,tower_http=info", log_level)
}

/// Create a span for one consumed message.
///
/// `attempts` and `outcome` are recorded once the message is resolved.
#[macro_export]
macro_rules! kafka_span {
    ($partition:expr, $offset:expr) => {
        tracing::info_span!(
            "kafka_message",
            partition = $partition,
            offset = $offset,
            attempts = tracing::field::Empty,
            outcome = tracing::field::Empty,
        )
    };
}

/// Helper for timing operations
pub struct Timer {
    start: std::time::Instant,
    operation: &'static str,
}

impl Timer {
    pub fn start(operation: &'static str) -> Self {
        Timer {
            start: std::time::Instant::now(),
            operation,
        }
    }

    /// Stop the timer and log the duration at debug level
    pub fn stop(self) -> std::time::Duration {
        let duration = self.start.elapsed();
        tracing::debug!(
            operation = self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer() {
        let timer = Timer::start("test_operation");
        std::thread::sleep(std::time::Duration::from_millis(10));
        let duration = timer.stop();
        assert!(duration.as_millis() >= 10);
    }

    #[test]
    fn test_default_directives_parse() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("live_events=debug"));
        assert!(EnvFilter::try_new(directives).is_ok());
    }

    #[test]
    fn test_kafka_span_records_outcome() {
        let span = crate::kafka_span!(3, 42_i64);
        span.record("attempts", 2_u32);
        span.record("outcome", "acknowledged");
    }
}
