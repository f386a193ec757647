//! Drives a single message through its handler under a retry policy

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use super::{RetryPolicy, RetryState, Transition};
use crate::dispatch::MessageHandler;
use crate::models::Message;

/// Final result of resolving one message
#[derive(Debug)]
pub enum Resolution {
    /// The handler returned success
    Succeeded { attempts: u32 },

    /// Retries exhausted or a non-retryable failure; route to dead-letter
    DeadLettered(RetryState),

    /// The grace period ended during a backoff wait; nothing was resolved
    Interrupted(RetryState),
}

impl Resolution {
    /// Handler invocations made for the message
    pub fn attempts(&self) -> u32 {
        match self {
            Resolution::Succeeded { attempts } => *attempts,
            Resolution::DeadLettered(state) | Resolution::Interrupted(state) => state.attempts(),
        }
    }
}

/// Wraps handler calls in an explicit retry policy.
///
/// Backoff waits are timer suspensions; cancelling `interrupt` ends a wait
/// early and leaves the message unresolved.
#[derive(Debug, Clone)]
pub struct RetryCoordinator {
    policy: RetryPolicy,
    interrupt: CancellationToken,
}

impl RetryCoordinator {
    pub fn new(policy: RetryPolicy, interrupt: CancellationToken) -> Self {
        Self { policy, interrupt }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invoke the handler until the message reaches a terminal state
    pub async fn resolve<H: MessageHandler>(
        &self,
        handler: &H,
        payload: &H::Payload,
        message: &Message,
    ) -> Resolution {
        let mut state = RetryState::new(&self.policy);

        loop {
            let failure = match handler.handle(payload, message).await {
                Ok(()) => {
                    // the loop returns on every terminal transition, so the state is open here
                    let _ = state.record_success();
                    return Resolution::Succeeded {
                        attempts: state.attempts(),
                    };
                },
                Err(failure) => failure,
            };

            let transition = state
                .record_failure(failure.class(), failure.reason())
                .unwrap_or(Transition::DeadLetter);

            match transition {
                Transition::Retry(delay) => {
                    warn!(
                        partition = message.partition(),
                        offset = message.offset(),
                        attempt = state.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "Handler failed, retry scheduled"
                    );

                    tokio::select! {
                        biased;
                        _ = self.interrupt.cancelled() => {
                            warn!(
                                partition = message.partition(),
                                offset = message.offset(),
                                attempts = state.attempts(),
                                "Retry interrupted by shutdown, leaving message uncommitted"
                            );
                            return Resolution::Interrupted(state);
                        },
                        _ = tokio::time::sleep(delay) => {},
                    }
                },
                Transition::DeadLetter => {
                    error!(
                        partition = message.partition(),
                        offset = message.offset(),
                        attempts = state.attempts(),
                        error_class = %failure.class(),
                        error = %failure,
                        "Message cannot be processed, routing to dead-letter"
                    );
                    return Resolution::DeadLettered(state);
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::HandlerFailure;
    use crate::models::LiveScoreMessage;
    use crate::retry::{DeliveryState, ErrorClass};
    use crate::test_utils::{live_score_record, ScriptedHandler};
    use std::time::Duration;

    fn coordinator(max_retries: u32) -> RetryCoordinator {
        RetryCoordinator::new(
            RetryPolicy::new(max_retries, Duration::from_millis(100), Duration::from_secs(1)),
            CancellationToken::new(),
        )
    }

    fn payload() -> LiveScoreMessage {
        LiveScoreMessage::new(1234, "1:0")
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_on_first_success() {
        let handler = ScriptedHandler::new();
        let message = live_score_record(0, 10, 1234);

        let resolution = coordinator(3).resolve(&handler, &payload(), &message).await;

        assert!(matches!(resolution, Resolution::Succeeded { attempts: 1 }));
        assert_eq!(handler.calls(), vec![(0, 10)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let handler = ScriptedHandler::new();
        handler.fail_times(0, 10, 2, HandlerFailure::transient("timeout"));
        let message = live_score_record(0, 10, 1234);

        let started = tokio::time::Instant::now();
        let resolution = coordinator(3).resolve(&handler, &payload(), &message).await;

        assert!(matches!(resolution, Resolution::Succeeded { attempts: 3 }));
        assert_eq!(handler.calls_for(0, 10), 3);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_letters_after_exhausting_retries() {
        let handler = ScriptedHandler::new();
        handler.always_fail(0, 10, HandlerFailure::transient("connection refused"));
        let message = live_score_record(0, 10, 1234);

        let resolution = coordinator(3).resolve(&handler, &payload(), &message).await;

        match resolution {
            Resolution::DeadLettered(state) => {
                assert_eq!(state.state(), DeliveryState::DeadLettered);
                assert_eq!(state.attempts(), 4);
                assert_eq!(state.history().len(), 4);
                assert_eq!(state.last_failure(), Some("connection refused"));
            },
            other => panic!("expected dead-letter, got {:?}", other),
        }
        assert_eq!(handler.calls_for(0, 10), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_business_rule_failure_is_not_retried() {
        let handler = ScriptedHandler::new();
        handler.always_fail(0, 10, HandlerFailure::permanent("unknown event"));
        let message = live_score_record(0, 10, 1234);

        let resolution = coordinator(3).resolve(&handler, &payload(), &message).await;

        match resolution {
            Resolution::DeadLettered(state) => {
                assert_eq!(state.attempts(), 1);
                assert_eq!(state.last_class(), Some(ErrorClass::BusinessRule));
            },
            other => panic!("expected dead-letter, got {:?}", other),
        }
        assert_eq!(handler.calls_for(0, 10), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_ends_backoff_wait() {
        let handler = ScriptedHandler::new();
        handler.always_fail(0, 10, HandlerFailure::transient("timeout"));
        let message = live_score_record(0, 10, 1234);

        let interrupt = CancellationToken::new();
        let coordinator = RetryCoordinator::new(
            RetryPolicy::new(5, Duration::from_secs(60), Duration::from_secs(60)),
            interrupt.clone(),
        );

        let trigger = interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let resolution = coordinator.resolve(&handler, &payload(), &message).await;

        assert!(matches!(resolution, Resolution::Interrupted(_)));
        assert_eq!(resolution.attempts(), 1);
        assert_eq!(handler.calls_for(0, 10), 1);
    }
}
