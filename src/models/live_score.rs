//! Live score data models
//!
//! `LiveScoreMessage` is the JSON document carried on the score topic;
//! `TrackingRequest` switches the periodic score poll for one event on or off.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::error::ValidationErrors;
use super::validation::{collect_errors, MAX_EVENT_ID, MIN_EVENT_ID};

/// Score snapshot published to and consumed from the score topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LiveScoreMessage {
    /// Tracked event identifier
    #[validate(range(min = MIN_EVENT_ID, max = MAX_EVENT_ID))]
    pub event_id: i64,

    /// Current score as reported by the score provider, e.g. "2:1"
    #[validate(length(min = 1))]
    pub current_score: String,
}

impl LiveScoreMessage {
    pub fn new(event_id: i64, current_score: impl Into<String>) -> Self {
        Self {
            event_id,
            current_score: current_score.into(),
        }
    }

    /// Run the field rules, returning model validation errors
    pub fn check(&self) -> Result<(), ValidationErrors> {
        self.validate().map_err(collect_errors)
    }
}

/// Request to start (`status = true`) or stop tracking an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRequest {
    /// Event identifier, four digits
    #[validate(range(min = MIN_EVENT_ID, max = MAX_EVENT_ID))]
    pub event_id: i64,

    /// Whether the event is live
    pub status: bool,
}

impl TrackingRequest {
    pub fn new(event_id: i64, status: bool) -> Self {
        Self { event_id, status }
    }

    /// Run the field rules, returning model validation errors
    pub fn check(&self) -> Result<(), ValidationErrors> {
        self.validate().map_err(collect_errors)
    }
}
