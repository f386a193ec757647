//! live-events library
//!
//! Exposes the consumer pipeline, retry coordination and score tracking for
//! the binary and for integration tests.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod kafka;
pub mod logging;
pub mod models;
pub mod retry;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod tracker;

// Re-export commonly used types at the crate root
pub use config::Config;
pub use error::{Error, Result};

pub use dispatch::{HandlerFailure, HandlerResult, MessageHandler};
pub use models::{LiveScoreMessage, Message, TrackingRequest};
pub use retry::{Resolution, RetryCoordinator, RetryPolicy, RetryState};

pub use api::{create_router, create_server, shutdown_signal, HealthState, HealthStatus};
