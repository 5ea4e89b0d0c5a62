//! Error types surfaced at the crate boundary.
//!
//! Producers only ever see [`EnqueueError`]; everything downstream of the
//! queue is absorbed by the flusher and reported through metrics and health.

use thiserror::Error;

/// A record failed validation and was not enqueued.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    /// A string did not name a known enum value.
    #[error("unknown {field} value: {value:?}")]
    UnknownEnum {
        field: &'static str,
        value: String,
    },
    /// A timestamp string could not be parsed.
    #[error("unparseable timestamp: {0:?}")]
    InvalidTimestamp(String),
    /// The attributes map serializes past the hard size limit.
    ///
    /// Attributes are never truncated; a record carrying an oversized map is
    /// rejected outright.
    #[error("attributes serialize to {size} bytes, exceeding the {limit} byte limit")]
    AttributesTooLarge { size: usize, limit: usize },
}

/// Errors returned synchronously from [`Client::enqueue`](crate::Client::enqueue).
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnqueueError {
    /// The record failed validation; the producer may fix and resubmit.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The client has been shut down and no longer accepts records.
    #[error("client is shut down")]
    Closed,
}

/// Construction-time configuration failure.
///
/// Every violated constraint is collected so a misconfigured deployment
/// fails fast with the complete list rather than one complaint at a time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid configuration: {}", violations.join("; "))]
pub struct ConfigError {
    pub violations: Vec<String>,
}

impl ConfigError {
    pub(crate) fn new(violations: Vec<String>) -> Self {
        Self { violations }
    }
}
