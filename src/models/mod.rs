//! Data models for live-events
//!
//! This module contains the domain models used throughout the service:
//! the owned consumed message, the live score documents, and validation.

pub mod error;
pub mod live_score;
pub mod message;
pub mod validation;

// Re-export commonly used types
pub use error::{ValidationError, ValidationErrorKind, ValidationErrors};
pub use live_score::{LiveScoreMessage, TrackingRequest};
pub use message::Message;
pub use validation::{validate_event_id, MAX_EVENT_ID, MIN_EVENT_ID};
