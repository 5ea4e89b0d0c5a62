//! Client facade: lifecycle owner and the only producer-facing surface.
//!
//! `enqueue` is the hot path and does exactly two things: validate the
//! record and push it into the bounded queue, nudging the flusher when the
//! size trigger fires. No I/O, no sleeps, no network — a remote outage is
//! invisible here except as queue growth.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, TrySendError, bounded};
use parking_lot::Mutex;

use crate::config::{Config, validate_api_key};
use crate::error::{ConfigError, EnqueueError};
use crate::flusher::{Control, spawn_flusher};
use crate::health::{HealthReport, evaluate};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::queue::BoundedQueue;
use crate::record::LogRecord;
use crate::transport::CredentialStore;
use crate::validator::validate;

/// Shutdown budget applied when a client is dropped without an explicit
/// [`Client::shutdown`].
const DROP_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to a running ingestion pipeline.
///
/// Construct with [`Client::start`], share by reference (or `Arc`) across
/// producer threads, and end with [`Client::shutdown`]. Dropping the client
/// performs a bounded shutdown as a fallback.
pub struct Client {
    config: Config,
    queue: Arc<BoundedQueue>,
    metrics: Arc<Metrics>,
    credentials: Arc<CredentialStore>,
    ctrl_tx: Sender<Control>,
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Client {
    /// Validate the configuration and start the background flusher.
    pub fn start(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let queue = Arc::new(BoundedQueue::new(config.max_queue_size));
        let metrics = Arc::new(Metrics::default());
        let credentials = Arc::new(CredentialStore::new(config.api_key.clone()));
        let (ctrl_tx, handle) = spawn_flusher(
            config.clone(),
            queue.clone(),
            metrics.clone(),
            credentials.clone(),
        );
        Ok(Self {
            config,
            queue,
            metrics,
            credentials,
            ctrl_tx,
            worker: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
        })
    }

    /// Validate and queue one record.
    ///
    /// Returns immediately; delivery happens asynchronously. The only
    /// failure a producer ever sees is its own record failing validation
    /// (or the client already being shut down).
    pub fn enqueue(&self, record: LogRecord) -> Result<(), EnqueueError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EnqueueError::Closed);
        }
        // Counted whether or not validation passes, so the conservation
        // invariant (enqueued == sent + drops + queued) holds.
        self.metrics.record_enqueued();
        let record = validate(record).inspect_err(|_| {
            self.metrics.record_dropped_validation();
        })?;
        let len = self.queue.enqueue(record);
        if len >= self.config.flush_size {
            // Best-effort nudge; a full control channel means the flusher
            // already has wakes pending.
            match self.ctrl_tx.try_send(Control::Wake) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => return Err(EnqueueError::Closed),
            }
        }
        Ok(())
    }

    /// Snapshot of every pipeline counter.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(
            self.queue.len(),
            self.queue.capacity(),
            self.queue.dropped(),
            self.credentials.api_key_invalid(),
            self.credentials.project_not_found(),
        )
    }

    /// Aggregated health derived from the current metrics.
    pub fn health(&self) -> HealthReport {
        evaluate(&self.metrics())
    }

    /// Swap in a new API key (or keep the current one) and clear the
    /// 401/404 latches, resuming delivery of queued records.
    pub fn refresh_credentials(&self, new_key: Option<String>) -> Result<(), ConfigError> {
        if let Some(key) = &new_key {
            validate_api_key(key).map_err(|violation| ConfigError::new(vec![violation]))?;
        }
        self.credentials.refresh(new_key);
        if !self.closed.load(Ordering::Acquire) {
            let _ = self.ctrl_tx.try_send(Control::Wake);
        }
        Ok(())
    }

    /// Synchronously drain the queue through the normal pipeline.
    ///
    /// Returns `true` once the flusher has caught up (queue empty or
    /// delivery stalled on a failure) within the timeout.
    pub fn flush(&self, timeout: Duration) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        let deadline = Instant::now() + timeout;
        let (ack_tx, ack_rx) = bounded(1);
        if self
            .ctrl_tx
            .send_timeout(Control::Flush(ack_tx), timeout)
            .is_err()
        {
            return false;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        ack_rx.recv_timeout(remaining).is_ok()
    }

    /// Stop accepting records, drain for up to `timeout`, and stop the
    /// worker.
    ///
    /// Records still queued when the timeout expires are abandoned and
    /// counted as `dropped_on_shutdown`. Idempotent: concurrent and repeated
    /// calls are safe, and only the first initiates the drain. Returns
    /// `true` if the worker acknowledged within the timeout.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut acknowledged = false;
        if !self.closed.swap(true, Ordering::AcqRel) {
            let (ack_tx, ack_rx) = bounded(1);
            let request = Control::Shutdown {
                deadline,
                ack: ack_tx,
            };
            if self.ctrl_tx.send(request).is_ok() {
                let remaining = deadline.saturating_duration_since(Instant::now());
                acknowledged = ack_rx.recv_timeout(remaining).is_ok();
            }
        }
        if acknowledged {
            // The worker has exited its loop; joining is immediate.
            let handle = self.worker.lock().take();
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    crate::diagnostics::diag!("flusher thread panicked");
                }
            }
        }
        acknowledged
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            self.shutdown(DROP_SHUTDOWN_TIMEOUT);
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("queue_size", &self.queue.len())
            .field("queue_capacity", &self.queue.capacity())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}
