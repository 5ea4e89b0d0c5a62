//! Retry policy: a pure function from `(outcome, attempt)` to the next
//! action.
//!
//! The policy holds no clock and no state beyond its configured attempt
//! caps, which keeps every branch table-testable. `attempt` is the number of
//! the attempt that just completed, starting at 1.

use std::time::Duration;

use crate::transport::Outcome;

/// Floor applied to server-directed delays.
const MIN_SERVER_DELAY: Duration = Duration::from_secs(1);
/// First retry delay after a transient 5xx.
const SERVER_BASE_DELAY: Duration = Duration::from_secs(1);
/// First retry delay after a network error.
const NETWORK_BASE_DELAY: Duration = Duration::from_secs(5);
/// Ceiling on network-error backoff.
const NETWORK_DELAY_CAP: Duration = Duration::from_secs(40);

/// What the flusher does with the in-flight batch next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryAction {
    /// Batch delivered; dismiss it and update metrics.
    Commit,
    /// Batch is unsendable; dismiss it without delivery.
    DropBatch,
    /// Sleep, then reattempt the same batch.
    Retry(Duration),
    /// Stop attempting for now; return the batch to the queue head.
    Requeue,
}

/// Retry budgets for the bounded retry classes.
///
/// A budget of N means N retries after the initial failed attempt, so the
/// full backoff ladder (three delays under the defaults) is walked before
/// the batch is requeued.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_retries_server: u32,
    pub max_retries_network: u32,
}

impl RetryPolicy {
    /// Decide the next action after `attempt` attempts ended in `outcome`.
    pub fn plan(&self, outcome: &Outcome, attempt: u32) -> RetryAction {
        match outcome {
            Outcome::Accepted { .. } => RetryAction::Commit,
            Outcome::ClientValidation | Outcome::AuthInvalid | Outcome::NotFound => {
                RetryAction::DropBatch
            }
            // Server-directed delays are honoured indefinitely; the circuit
            // breaker bounds how long a dead remote can hold us here.
            Outcome::Throttled { retry_after } | Outcome::BackpressureFull { retry_after } => {
                RetryAction::Retry((*retry_after).max(MIN_SERVER_DELAY))
            }
            Outcome::ServerTransient { .. } => {
                if attempt > self.max_retries_server {
                    RetryAction::Requeue
                } else {
                    RetryAction::Retry(exponential(SERVER_BASE_DELAY, attempt, None))
                }
            }
            Outcome::NetworkError { .. } => {
                if attempt > self.max_retries_network {
                    RetryAction::Requeue
                } else {
                    RetryAction::Retry(exponential(
                        NETWORK_BASE_DELAY,
                        attempt,
                        Some(NETWORK_DELAY_CAP),
                    ))
                }
            }
        }
    }
}

/// `base * 2^(attempt-1)`, optionally capped.
fn exponential(base: Duration, attempt: u32, cap: Option<Duration>) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let delay = base.saturating_mul(1 << exponent);
    match cap {
        Some(cap) => delay.min(cap),
        None => delay,
    }
}
