//! HTTP transport: turns a drained batch into a classified [`Outcome`].
//!
//! The transport owns a pooled `ureq` agent with connect and per-request
//! timeouts. It never retries and never sleeps; classification is its whole
//! job, and the retry policy decides what an outcome means.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::diagnostics::diag;
use crate::record::LogRecord;

/// Path of the batch ingestion endpoint, relative to the configured base URL.
pub const INGEST_PATH: &str = "/api/v1/ingest/batch";

/// Fallback server-directed delay when a 429/503 carries no `Retry-After`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Classified result of one transport attempt.
///
/// This is the sole input to the retry policy; nothing downstream ever sees
/// a raw status code or I/O error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// HTTP 202. Partial rejections still commit the batch.
    Accepted {
        accepted: u64,
        rejected: u64,
        errors: Vec<String>,
    },
    /// HTTP 400: the server judged the batch malformed. Not retryable.
    ClientValidation,
    /// HTTP 401: credentials rejected. Latches the client.
    AuthInvalid,
    /// HTTP 404: unknown project. Latches the client.
    NotFound,
    /// HTTP 429 with the server-directed delay.
    Throttled { retry_after: Duration },
    /// HTTP 503: ingestion backpressure, with the server-directed delay.
    BackpressureFull { retry_after: Duration },
    /// Any other 5xx.
    ServerTransient { status: u16 },
    /// Timeout, DNS failure, refused connection, TLS failure.
    NetworkError { error: String },
}

impl Outcome {
    /// Whether this outcome counts as a success for the circuit breaker.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted { .. })
    }

    /// Short class name used in diagnostics.
    pub const fn class(&self) -> &'static str {
        match self {
            Outcome::Accepted { .. } => "accepted",
            Outcome::ClientValidation => "client_validation",
            Outcome::AuthInvalid => "auth_invalid",
            Outcome::NotFound => "not_found",
            Outcome::Throttled { .. } => "throttled",
            Outcome::BackpressureFull { .. } => "backpressure_full",
            Outcome::ServerTransient { .. } => "server_transient",
            Outcome::NetworkError { .. } => "network_error",
        }
    }
}

/// Shared credential cell plus the sticky failure latches.
///
/// Producers and the flusher both hold this behind an `Arc`: the flusher
/// latches on 401/404 and refuses to send until an operator swaps in fresh
/// credentials, while enqueue keeps accepting records so nothing is silently
/// lost during a configuration mishap.
pub struct CredentialStore {
    api_key: Mutex<String>,
    api_key_invalid: AtomicBool,
    project_not_found: AtomicBool,
}

impl CredentialStore {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key: Mutex::new(api_key),
            api_key_invalid: AtomicBool::new(false),
            project_not_found: AtomicBool::new(false),
        }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.lock())
    }

    /// Swap in a new key and clear both latches.
    pub fn refresh(&self, new_key: Option<String>) {
        if let Some(key) = new_key {
            *self.api_key.lock() = key;
        }
        self.api_key_invalid.store(false, Ordering::Release);
        self.project_not_found.store(false, Ordering::Release);
    }

    pub fn latch_api_key_invalid(&self) {
        self.api_key_invalid.store(true, Ordering::Release);
    }

    pub fn latch_project_not_found(&self) {
        self.project_not_found.store(true, Ordering::Release);
    }

    pub fn api_key_invalid(&self) -> bool {
        self.api_key_invalid.load(Ordering::Acquire)
    }

    pub fn project_not_found(&self) -> bool {
        self.project_not_found.load(Ordering::Acquire)
    }

    pub fn any_latched(&self) -> bool {
        self.api_key_invalid() || self.project_not_found()
    }
}

#[derive(Serialize)]
struct BatchPayload<'a> {
    logs: &'a [&'a LogRecord],
}

/// Body of a 202 response.
#[derive(Debug, Default, Deserialize)]
struct IngestResponse {
    #[serde(default)]
    accepted: u64,
    #[serde(default)]
    rejected: u64,
    #[serde(default)]
    errors: Vec<String>,
}

/// Connection-pooled HTTP client for the ingestion endpoint.
pub struct HttpTransport {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.http_timeout)
            .timeout(config.http_timeout)
            .max_idle_connections(config.http_pool_size)
            .max_idle_connections_per_host(config.http_pool_size)
            .build();
        let endpoint = format!(
            "{}{INGEST_PATH}",
            config.base_url.trim_end_matches('/')
        );
        Self { agent, endpoint }
    }

    /// Ship one batch and classify the result.
    pub fn send(&self, batch: &[&LogRecord], credentials: &CredentialStore) -> Outcome {
        let body = match serde_json::to_string(&BatchPayload { logs: batch }) {
            Ok(body) => body,
            Err(err) => {
                diag!("batch serialization failed, dropping batch: {err}");
                return Outcome::ClientValidation;
            }
        };

        let response = self
            .agent
            .post(&self.endpoint)
            .set("Authorization", &credentials.bearer())
            .set("Content-Type", "application/json")
            .send_string(&body);

        match response {
            Ok(response) => {
                let fallback = batch.len() as u64;
                let parsed = response
                    .into_string()
                    .ok()
                    .and_then(|text| serde_json::from_str::<IngestResponse>(&text).ok())
                    .unwrap_or(IngestResponse {
                        accepted: fallback,
                        ..IngestResponse::default()
                    });
                Outcome::Accepted {
                    accepted: parsed.accepted,
                    rejected: parsed.rejected,
                    errors: parsed.errors,
                }
            }
            Err(ureq::Error::Status(status, response)) => {
                let retry_after = parse_retry_after(response.header("Retry-After"));
                classify_status(status, retry_after)
            }
            Err(ureq::Error::Transport(transport)) => Outcome::NetworkError {
                error: transport.to_string(),
            },
        }
    }
}

/// Map a non-2xx status to its outcome class.
pub(crate) fn classify_status(status: u16, retry_after: Duration) -> Outcome {
    match status {
        400 => Outcome::ClientValidation,
        401 => Outcome::AuthInvalid,
        404 => Outcome::NotFound,
        429 => Outcome::Throttled { retry_after },
        503 => Outcome::BackpressureFull { retry_after },
        500..=599 => Outcome::ServerTransient { status },
        // Remaining 4xx have no dedicated class; treat them like a malformed
        // batch so they are dropped rather than retried forever.
        _ => Outcome::ClientValidation,
    }
}

/// `Retry-After` is read as integer seconds; absent or unparseable means 60.
pub(crate) fn parse_retry_after(header: Option<&str>) -> Duration {
    header
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(400, Outcome::ClientValidation)]
    #[case(401, Outcome::AuthInvalid)]
    #[case(404, Outcome::NotFound)]
    #[case(422, Outcome::ClientValidation)]
    #[case(500, Outcome::ServerTransient { status: 500 })]
    #[case(502, Outcome::ServerTransient { status: 502 })]
    fn classifies_statuses(#[case] status: u16, #[case] expected: Outcome) {
        assert_eq!(classify_status(status, DEFAULT_RETRY_AFTER), expected);
    }

    #[rstest]
    fn classifies_throttle_and_backpressure_with_delay() {
        let delay = Duration::from_secs(2);
        assert_eq!(
            classify_status(429, delay),
            Outcome::Throttled { retry_after: delay }
        );
        assert_eq!(
            classify_status(503, delay),
            Outcome::BackpressureFull { retry_after: delay }
        );
    }

    #[rstest]
    #[case(Some("2"), Duration::from_secs(2))]
    #[case(Some(" 30 "), Duration::from_secs(30))]
    #[case(Some("soon"), DEFAULT_RETRY_AFTER)]
    #[case(None, DEFAULT_RETRY_AFTER)]
    fn parses_retry_after(#[case] header: Option<&str>, #[case] expected: Duration) {
        assert_eq!(parse_retry_after(header), expected);
    }

    #[rstest]
    fn latches_are_sticky_until_refresh() {
        let credentials = CredentialStore::new("pk-old".into());
        credentials.latch_api_key_invalid();
        credentials.latch_project_not_found();
        assert!(credentials.any_latched());
        credentials.refresh(Some("pk-new".into()));
        assert!(!credentials.any_latched());
        assert_eq!(credentials.bearer(), "Bearer pk-new");
    }

    #[rstest]
    fn refresh_without_key_only_clears_latches() {
        let credentials = CredentialStore::new("pk-keep".into());
        credentials.latch_api_key_invalid();
        credentials.refresh(None);
        assert!(!credentials.api_key_invalid());
        assert_eq!(credentials.bearer(), "Bearer pk-keep");
    }
}
