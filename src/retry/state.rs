//! Per-message delivery state machine
//!
//! `Pending -> Retrying -> ... -> Succeeded | DeadLettered`. The state is
//! owned by the coordinator resolving the message and dropped once the
//! message reaches a terminal state.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use super::RetryPolicy;

/// Lifecycle of one consumed message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Pending,
    Retrying,
    Succeeded,
    DeadLettered,
}

impl DeliveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryState::Succeeded | DeliveryState::DeadLettered)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::Pending => "pending",
            DeliveryState::Retrying => "retrying",
            DeliveryState::Succeeded => "succeeded",
            DeliveryState::DeadLettered => "dead_lettered",
        }
    }
}

/// Category of a processing failure; decides whether a retry is allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Payload could not be decoded (poison pill)
    Deserialization,
    /// Infrastructure fault: network, timeout, broker
    Transient,
    /// Handler rejected the message on business rules
    BusinessRule,
}

impl ErrorClass {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorClass::Transient)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Deserialization => "deserialization",
            ErrorClass::Transient => "transient",
            ErrorClass::BusinessRule => "business_rule",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// 1-based handler invocation; 0 when the handler never ran
    pub attempt: u32,
    pub class: ErrorClass,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// What the coordinator must do after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Wait this long, then invoke the handler again
    Retry(Duration),
    /// Stop and route the message to the dead-letter topic
    DeadLetter,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("message already resolved as {}", .0.as_str())]
    AlreadyResolved(DeliveryState),
}

/// Retry bookkeeping for a single message
#[derive(Debug)]
pub struct RetryState {
    state: DeliveryState,
    attempts: u32,
    max_retries: u32,
    last_failure: Option<String>,
    next_retry_at: Option<Instant>,
    history: Vec<FailureRecord>,
    backoff: ExponentialBackoff,
    max_delay: Duration,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            state: DeliveryState::Pending,
            attempts: 0,
            max_retries: policy.max_retries(),
            last_failure: None,
            next_retry_at: None,
            history: Vec::new(),
            backoff: policy.backoff(),
            max_delay: policy.max_delay(),
        }
    }

    pub fn state(&self) -> DeliveryState {
        self.state
    }

    /// Handler invocations so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    pub fn next_retry_at(&self) -> Option<Instant> {
        self.next_retry_at
    }

    pub fn history(&self) -> &[FailureRecord] {
        &self.history
    }

    /// Class of the most recent failure
    pub fn last_class(&self) -> Option<ErrorClass> {
        self.history.last().map(|record| record.class)
    }

    fn ensure_open(&self) -> Result<(), TransitionError> {
        if self.state.is_terminal() {
            Err(TransitionError::AlreadyResolved(self.state))
        } else {
            Ok(())
        }
    }

    /// The handler returned successfully
    pub fn record_success(&mut self) -> Result<(), TransitionError> {
        self.ensure_open()?;
        self.attempts += 1;
        self.state = DeliveryState::Succeeded;
        self.next_retry_at = None;
        Ok(())
    }

    /// The handler failed; decide between another attempt and dead-letter
    pub fn record_failure(
        &mut self,
        class: ErrorClass,
        reason: impl Into<String>,
    ) -> Result<Transition, TransitionError> {
        self.ensure_open()?;
        self.attempts += 1;
        self.push_failure(self.attempts, class, reason.into());

        if class.is_retryable() && self.attempts <= self.max_retries {
            let delay = self.backoff.next_backoff().unwrap_or(self.max_delay);
            self.state = DeliveryState::Retrying;
            self.next_retry_at = Some(Instant::now() + delay);
            Ok(Transition::Retry(delay))
        } else {
            self.state = DeliveryState::DeadLettered;
            self.next_retry_at = None;
            Ok(Transition::DeadLetter)
        }
    }

    /// The payload could not be decoded; the handler is never invoked
    pub fn reject_undecodable(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure_open()?;
        self.push_failure(0, ErrorClass::Deserialization, reason.into());
        self.state = DeliveryState::DeadLettered;
        self.next_retry_at = None;
        Ok(())
    }

    fn push_failure(&mut self, attempt: u32, class: ErrorClass, reason: String) {
        self.last_failure = Some(reason.clone());
        self.history.push(FailureRecord {
            attempt,
            class,
            reason,
            failed_at: Utc::now(),
        });
    }
}
