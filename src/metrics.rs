//! Concurrency-safe counter registry and its point-in-time snapshot.
//!
//! Producers touch the enqueue-side counters; the flusher owns everything
//! send-side. Counters are independent relaxed atomics: individually exact,
//! but a snapshot is not transactionally consistent across counters and does
//! not need to be.

use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};

use serde::Serialize;

use crate::breaker::CircuitState;
use crate::transport::Outcome;

#[derive(Default)]
pub(crate) struct Metrics {
    enqueued: AtomicU64,
    sent: AtomicU64,
    rejected_by_server: AtomicU64,
    dropped_validation: AtomicU64,
    dropped_on_shutdown: AtomicU64,
    batches_sent: AtomicU64,
    attempts: AtomicU64,

    accepted: AtomicU64,
    client_validation: AtomicU64,
    auth_invalid: AtomicU64,
    not_found: AtomicU64,
    throttled: AtomicU64,
    backpressure_full: AtomicU64,
    server_transient: AtomicU64,
    network_error: AtomicU64,

    breaker_state: AtomicU8,
    consecutive_failures: AtomicU32,
    sends_last_minute: AtomicU64,
    sends_last_hour: AtomicU64,
}

impl Metrics {
    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_validation(&self) {
        self.dropped_validation.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_on_shutdown(&self, count: u64) {
        self.dropped_on_shutdown.fetch_add(count, Ordering::Relaxed);
    }

    /// Count records dismissed after a terminal server verdict (400/401/404).
    pub(crate) fn record_dropped_rejected(&self, count: u64) {
        self.dropped_validation.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_committed(&self, records: u64, rejected: u64) {
        self.sent.fetch_add(records, Ordering::Relaxed);
        self.rejected_by_server.fetch_add(rejected, Ordering::Relaxed);
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_outcome(&self, outcome: &Outcome) {
        let counter = match outcome {
            Outcome::Accepted { .. } => &self.accepted,
            Outcome::ClientValidation => &self.client_validation,
            Outcome::AuthInvalid => &self.auth_invalid,
            Outcome::NotFound => &self.not_found,
            Outcome::Throttled { .. } => &self.throttled,
            Outcome::BackpressureFull { .. } => &self.backpressure_full,
            Outcome::ServerTransient { .. } => &self.server_transient,
            Outcome::NetworkError { .. } => &self.network_error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_breaker(&self, state: CircuitState, consecutive_failures: u32) {
        self.breaker_state.store(state.as_u8(), Ordering::Relaxed);
        self.consecutive_failures
            .store(consecutive_failures, Ordering::Relaxed);
    }

    pub(crate) fn set_window_rates(&self, minute: u64, hour: u64) {
        self.sends_last_minute.store(minute, Ordering::Relaxed);
        self.sends_last_hour.store(hour, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(
        &self,
        queue_size: usize,
        queue_capacity: usize,
        dropped_overflow: u64,
        api_key_invalid: bool,
        project_not_found: bool,
    ) -> MetricsSnapshot {
        MetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            rejected_by_server: self.rejected_by_server.load(Ordering::Relaxed),
            dropped_overflow,
            dropped_validation: self.dropped_validation.load(Ordering::Relaxed),
            dropped_on_shutdown: self.dropped_on_shutdown.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            outcomes: OutcomeCounts {
                accepted: self.accepted.load(Ordering::Relaxed),
                client_validation: self.client_validation.load(Ordering::Relaxed),
                auth_invalid: self.auth_invalid.load(Ordering::Relaxed),
                not_found: self.not_found.load(Ordering::Relaxed),
                throttled: self.throttled.load(Ordering::Relaxed),
                backpressure_full: self.backpressure_full.load(Ordering::Relaxed),
                server_transient: self.server_transient.load(Ordering::Relaxed),
                network_error: self.network_error.load(Ordering::Relaxed),
            },
            queue_size,
            queue_capacity,
            breaker_state: CircuitState::from_u8(self.breaker_state.load(Ordering::Relaxed)),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            sends_last_minute: self.sends_last_minute.load(Ordering::Relaxed),
            sends_last_hour: self.sends_last_hour.load(Ordering::Relaxed),
            api_key_invalid,
            project_not_found,
        }
    }
}

/// Per-outcome-class attempt counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub accepted: u64,
    pub client_validation: u64,
    pub auth_invalid: u64,
    pub not_found: u64,
    pub throttled: u64,
    pub backpressure_full: u64,
    pub server_transient: u64,
    pub network_error: u64,
}

/// Point-in-time view of the pipeline's counters.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub enqueued: u64,
    /// Records in batches the server committed (including any it rejected
    /// record-by-record; those are also in `rejected_by_server`).
    pub sent: u64,
    pub rejected_by_server: u64,
    pub dropped_overflow: u64,
    pub dropped_validation: u64,
    pub dropped_on_shutdown: u64,
    pub batches_sent: u64,
    pub attempts: u64,
    pub outcomes: OutcomeCounts,
    pub queue_size: usize,
    pub queue_capacity: usize,
    #[serde(serialize_with = "serialize_breaker_state")]
    pub breaker_state: CircuitState,
    pub consecutive_failures: u32,
    pub sends_last_minute: u64,
    pub sends_last_hour: u64,
    pub api_key_invalid: bool,
    pub project_not_found: bool,
}

fn serialize_breaker_state<S: serde::Serializer>(
    state: &CircuitState,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(state.as_str())
}
