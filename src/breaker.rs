//! Three-state circuit breaker gating the transport.
//!
//! Owned exclusively by the flusher, so no interior synchronization: the
//! breaker is a plain state machine parameterized over the caller's clock,
//! which keeps the transition table unit-testable with synthetic instants.

use std::time::{Duration, Instant};

/// Breaker position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }

    pub(crate) const fn as_u8(&self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
            Self::HalfOpen => 2,
        }
    }

    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Open,
            2 => Self::HalfOpen,
            _ => Self::Closed,
        }
    }
}

/// Answer to "may the flusher attempt a send right now?".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    /// Normal operation.
    Allow,
    /// Recovery probe: exactly one attempt with a single-record batch.
    AllowProbe,
    /// Circuit is open; no attempt for at least `remaining`.
    Blocked { remaining: Duration },
}

pub struct CircuitBreaker {
    threshold: u32,
    timeout: Duration,
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, timeout: Duration) -> Self {
        Self {
            threshold,
            timeout,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
        }
    }

    /// Consult the breaker before draining a batch.
    ///
    /// An open circuit transitions to half-open once the recovery timeout has
    /// elapsed, at which point exactly one probe is allowed.
    pub fn gate(&mut self, now: Instant) -> Gate {
        match self.state {
            CircuitState::Closed => Gate::Allow,
            CircuitState::HalfOpen => Gate::AllowProbe,
            CircuitState::Open => {
                let opened_at = self.opened_at.unwrap_or(now);
                let elapsed = now.duration_since(opened_at);
                if elapsed >= self.timeout {
                    self.state = CircuitState::HalfOpen;
                    Gate::AllowProbe
                } else {
                    Gate::Blocked {
                        remaining: self.timeout - elapsed,
                    }
                }
            }
        }
    }

    /// Record an `Accepted` outcome.
    pub fn record_success(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    /// Record any non-`Accepted` outcome.
    pub fn record_failure(&mut self, now: Instant) {
        match self.state {
            CircuitState::HalfOpen => {
                // Failed probe: back to open with a fresh recovery window.
                self.state = CircuitState::Open;
                self.opened_at = Some(now);
            }
            CircuitState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.threshold {
                    self.state = CircuitState::Open;
                    self.opened_at = Some(now);
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
