//! Client configuration and fail-fast validation.
//!
//! Every option the facade recognizes lives here with its default. Validation
//! runs once at construction and collects *all* violations into a single
//! [`ConfigError`], so a bad deployment surfaces its full list of mistakes on
//! the first start attempt.

use std::time::Duration;

use crate::error::ConfigError;

/// Required prefix on project API keys.
pub const API_KEY_PREFIX: &str = "pk-";
/// Hard ceiling on `max_batch_size`.
pub const MAX_BATCH_SIZE_LIMIT: usize = 1000;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_FLUSH_SIZE: usize = 100;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 10_000;
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_HTTP_POOL_SIZE: usize = 10;
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 3000;
pub const DEFAULT_RATE_LIMIT_PER_HOUR: u32 = 100_000;
pub const DEFAULT_RATE_LIMIT_BUFFER: f64 = 0.9;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BREAKER_THRESHOLD: u32 = 5;
pub const DEFAULT_BREAKER_TIMEOUT: Duration = Duration::from_secs(60);

/// Everything a [`Client`](crate::Client) needs to run.
#[derive(Clone, Debug)]
pub struct Config {
    /// Bearer credential; must start with [`API_KEY_PREFIX`].
    pub api_key: String,
    /// HTTP(S) endpoint root, e.g. `https://ingest.example.com`.
    pub base_url: String,
    /// Interval between time-triggered flushes.
    pub flush_interval: Duration,
    /// Queue length that forces an immediate flush.
    pub flush_size: usize,
    /// Upper bound on records per request.
    pub max_batch_size: usize,
    /// Hard queue capacity; the oldest record is dropped above this.
    pub max_queue_size: usize,
    /// Per-request transport timeout.
    pub http_timeout: Duration,
    /// Persistent connections kept in the transport pool.
    pub http_pool_size: usize,
    pub rate_limit_per_minute: u32,
    pub rate_limit_per_hour: u32,
    /// Fraction of each rate cap actually used, in `(0, 1]`.
    pub rate_limit_buffer: f64,
    pub max_retries_server: u32,
    pub max_retries_network: u32,
    /// Consecutive failures that open the circuit breaker.
    pub breaker_threshold: u32,
    /// Recovery delay before the breaker probes again.
    pub breaker_timeout: Duration,
}

impl Config {
    /// Build a configuration with defaults for everything but the
    /// credentials and endpoint.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            flush_size: DEFAULT_FLUSH_SIZE,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            http_pool_size: DEFAULT_HTTP_POOL_SIZE,
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            rate_limit_per_hour: DEFAULT_RATE_LIMIT_PER_HOUR,
            rate_limit_buffer: DEFAULT_RATE_LIMIT_BUFFER,
            max_retries_server: DEFAULT_MAX_RETRIES,
            max_retries_network: DEFAULT_MAX_RETRIES,
            breaker_threshold: DEFAULT_BREAKER_THRESHOLD,
            breaker_timeout: DEFAULT_BREAKER_TIMEOUT,
        }
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_flush_size(mut self, size: usize) -> Self {
        self.flush_size = size;
        self
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_http_pool_size(mut self, size: usize) -> Self {
        self.http_pool_size = size;
        self
    }

    pub fn with_rate_limits(mut self, per_minute: u32, per_hour: u32) -> Self {
        self.rate_limit_per_minute = per_minute;
        self.rate_limit_per_hour = per_hour;
        self
    }

    pub fn with_rate_limit_buffer(mut self, buffer: f64) -> Self {
        self.rate_limit_buffer = buffer;
        self
    }

    pub fn with_max_retries(mut self, server: u32, network: u32) -> Self {
        self.max_retries_server = server;
        self.max_retries_network = network;
        self
    }

    pub fn with_breaker(mut self, threshold: u32, timeout: Duration) -> Self {
        self.breaker_threshold = threshold;
        self.breaker_timeout = timeout;
        self
    }

    /// Check every constraint, collecting all violations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut violations = Vec::new();

        if let Err(violation) = validate_api_key(&self.api_key) {
            violations.push(violation);
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            violations.push(format!(
                "base_url must start with http:// or https://, got {:?}",
                self.base_url
            ));
        }
        if self.flush_interval.is_zero() {
            violations.push("flush_interval must be greater than zero".into());
        }
        if self.flush_size == 0 {
            violations.push("flush_size must be greater than zero".into());
        }
        if self.max_batch_size == 0 || self.max_batch_size > MAX_BATCH_SIZE_LIMIT {
            violations.push(format!(
                "max_batch_size must be between 1 and {MAX_BATCH_SIZE_LIMIT}, got {}",
                self.max_batch_size
            ));
        }
        if self.max_queue_size == 0 {
            violations.push("max_queue_size must be greater than zero".into());
        }
        if self.http_timeout.is_zero() {
            violations.push("http_timeout must be greater than zero".into());
        }
        if self.http_pool_size == 0 {
            violations.push("http_pool_size must be greater than zero".into());
        }
        if self.rate_limit_per_minute == 0 {
            violations.push("rate_limit_per_minute must be greater than zero".into());
        }
        if self.rate_limit_per_hour == 0 {
            violations.push("rate_limit_per_hour must be greater than zero".into());
        }
        if !(self.rate_limit_buffer > 0.0 && self.rate_limit_buffer <= 1.0) {
            violations.push(format!(
                "rate_limit_buffer must be in (0, 1], got {}",
                self.rate_limit_buffer
            ));
        }
        if self.breaker_threshold == 0 {
            violations.push("breaker_threshold must be greater than zero".into());
        }
        if self.breaker_timeout.is_zero() {
            violations.push("breaker_timeout must be greater than zero".into());
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::new(violations))
        }
    }
}

/// Shape check shared by construction and credential refresh.
pub(crate) fn validate_api_key(api_key: &str) -> Result<(), String> {
    if api_key.is_empty() {
        return Err("api_key must not be empty".into());
    }
    if !api_key.starts_with(API_KEY_PREFIX) {
        return Err(format!("api_key must start with {API_KEY_PREFIX:?}"));
    }
    Ok(())
}
