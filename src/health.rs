//! Aggregated health evaluation over a metrics snapshot.

use std::fmt;

use crate::breaker::CircuitState;
use crate::metrics::MetricsSnapshot;

/// Queue fill fraction above which health degrades.
const QUEUE_PRESSURE_THRESHOLD: f64 = 0.8;
/// Consecutive send failures above which health degrades.
const FAILURE_STREAK_THRESHOLD: u32 = 2;

/// Overall pipeline health.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// One concrete reason the pipeline is not fully healthy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HealthIssue {
    BreakerOpen,
    ApiKeyInvalid,
    ProjectNotFound,
    QueueNearCapacity { size: usize, capacity: usize },
    RepeatedFailures { consecutive: u32 },
}

impl fmt::Display for HealthIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BreakerOpen => write!(f, "circuit breaker is open"),
            Self::ApiKeyInvalid => write!(f, "api key was rejected; refresh credentials"),
            Self::ProjectNotFound => write!(f, "project not found; refresh credentials"),
            Self::QueueNearCapacity { size, capacity } => {
                write!(f, "queue at {size}/{capacity} records")
            }
            Self::RepeatedFailures { consecutive } => {
                write!(f, "{consecutive} consecutive send failures")
            }
        }
    }
}

/// Health status plus every issue that contributed to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub issues: Vec<HealthIssue>,
}

/// Derive health from a snapshot.
///
/// A latch or an open breaker means sending has stopped entirely, which is
/// `Unhealthy`; pressure signals alone only degrade.
pub fn evaluate(snapshot: &MetricsSnapshot) -> HealthReport {
    let mut issues = Vec::new();
    let mut unhealthy = false;

    if snapshot.breaker_state == CircuitState::Open {
        issues.push(HealthIssue::BreakerOpen);
        unhealthy = true;
    }
    if snapshot.api_key_invalid {
        issues.push(HealthIssue::ApiKeyInvalid);
        unhealthy = true;
    }
    if snapshot.project_not_found {
        issues.push(HealthIssue::ProjectNotFound);
        unhealthy = true;
    }
    if snapshot.queue_capacity > 0 {
        let fill = snapshot.queue_size as f64 / snapshot.queue_capacity as f64;
        if fill > QUEUE_PRESSURE_THRESHOLD {
            issues.push(HealthIssue::QueueNearCapacity {
                size: snapshot.queue_size,
                capacity: snapshot.queue_capacity,
            });
        }
    }
    if snapshot.consecutive_failures > FAILURE_STREAK_THRESHOLD {
        issues.push(HealthIssue::RepeatedFailures {
            consecutive: snapshot.consecutive_failures,
        });
    }

    let status = if unhealthy {
        HealthStatus::Unhealthy
    } else if issues.is_empty() {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    HealthReport { status, issues }
}
