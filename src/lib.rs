//! Non-blocking log ingestion client.
//!
//! `logship` accepts structured log records from any number of producer
//! threads and delivers them in batches to a remote ingestion endpoint,
//! keeping the producer path free of I/O: [`Client::enqueue`] validates the
//! record, pushes it into a bounded in-memory queue and returns. A single
//! background flusher drains the queue, batches records, paces itself under
//! a dual sliding-window rate limit, ships batches over pooled HTTP with
//! classified retries, and trips a circuit breaker when the remote is down.
//!
//! Delivery is at-least-once with bounded memory: when the queue is full the
//! oldest record is dropped and counted, and a remote outage shows up as
//! queue growth, drop counters and a degraded [`Client::health`] rather than
//! as latency in the application.
//!
//! ```no_run
//! use std::time::Duration;
//! use logship::{Client, Config, LogLevel, LogRecord};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::start(Config::new("pk-your-key", "https://ingest.example.com"))?;
//! client.enqueue(LogRecord::new(LogLevel::Info, "service started"))?;
//! client.enqueue(
//!     LogRecord::exception("ValueError", "bad input", "at handler.rs:42")
//!         .with_attribute("request_id", "abc123"),
//! )?;
//! client.shutdown(Duration::from_secs(5));
//! # Ok(())
//! # }
//! ```

mod breaker;
mod client;
mod config;
mod diagnostics;
mod error;
mod flusher;
mod health;
mod level;
mod metrics;
mod queue;
mod rate_limit;
mod record;
mod retry;
mod transport;
mod validator;

pub use breaker::CircuitState;
pub use client::Client;
pub use config::{API_KEY_PREFIX, Config};
pub use error::{ConfigError, EnqueueError, ValidationError};
pub use health::{HealthIssue, HealthReport, HealthStatus};
pub use level::{Importance, LogLevel, LogType};
pub use metrics::{MetricsSnapshot, OutcomeCounts};
pub use queue::{BoundedQueue, QueueSlot};
pub use rate_limit::{Admission, DualWindowLimiter};
pub use record::{LogRecord, parse_timestamp};
pub use retry::{RetryAction, RetryPolicy};
pub use transport::{INGEST_PATH, Outcome};
pub use validator::{
    MAX_ATTRIBUTES_BYTES, MAX_ERROR_MESSAGE_BYTES, MAX_ERROR_TYPE_BYTES, MAX_MESSAGE_BYTES,
    MAX_STACK_TRACE_BYTES, TRUNCATION_MARKER, validate,
};
