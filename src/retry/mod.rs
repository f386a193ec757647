//! Retry coordination
//!
//! This module provides:
//! - `RetryPolicy`: capped exponential backoff, applied explicitly at the call site
//! - `RetryState`: the per-message delivery state machine
//! - `RetryCoordinator`: drives one message through its handler until it
//!   succeeds or must be dead-lettered

mod coordinator;
mod policy;
mod state;

pub use coordinator::{Resolution, RetryCoordinator};
pub use policy::{RetryError, RetryPolicy};
pub use state::{
    DeliveryState, ErrorClass, FailureRecord, RetryState, Transition, TransitionError,
};
