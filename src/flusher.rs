//! Background flusher: the single worker that drains the queue and ships
//! batches.
//!
//! Exactly one flusher thread runs per client. It owns the transport, the
//! rate limiter, the circuit breaker and all retry state, so none of that
//! needs synchronization; the queue and the counters are the only shared
//! structures. The loop wakes on the earliest of the flush interval, a
//! size-trigger nudge from `enqueue`, or a control message, and every sleep
//! inside an iteration remains receptive to shutdown.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvError, Sender, after, bounded, select};

use crate::breaker::{CircuitBreaker, CircuitState, Gate};
use crate::config::Config;
use crate::diagnostics::diag;
use crate::metrics::Metrics;
use crate::queue::BoundedQueue;
use crate::rate_limit::{Admission, DualWindowLimiter};
use crate::record::LogRecord;
use crate::retry::{RetryAction, RetryPolicy};
use crate::transport::{CredentialStore, HttpTransport, Outcome};

/// Ceiling on the adaptive flush interval under sustained backpressure.
const MAX_FLUSH_INTERVAL: Duration = Duration::from_secs(60);
/// Consecutive 503 outcomes before the flush interval starts doubling.
const BACKPRESSURE_SLOWDOWN_AFTER: u32 = 3;
/// Control channel depth; wake nudges are best-effort and coalesce.
const CONTROL_CAPACITY: usize = 4;

/// Messages from the client facade to the worker.
pub(crate) enum Control {
    /// The queue reached `flush_size`; flush soon.
    Wake,
    /// Drain until empty or stalled, then acknowledge.
    Flush(Sender<()>),
    /// Drain until `deadline`, abandon the rest, acknowledge, exit.
    Shutdown { deadline: Instant, ack: Sender<()> },
}

struct ShutdownRequest {
    deadline: Instant,
    ack: Sender<()>,
}

/// Result of one flush iteration.
enum FlushOutcome {
    QueueEmpty,
    Committed,
    Dropped,
    Requeued,
    Blocked { remaining: Duration },
    Latched,
    ShutdownRequested,
}

enum PauseResult {
    Completed,
    ShutdownRequested,
    DeadlineExpired,
}

/// Spawn the worker thread.
pub(crate) fn spawn_flusher(
    config: Config,
    queue: Arc<BoundedQueue>,
    metrics: Arc<Metrics>,
    credentials: Arc<CredentialStore>,
) -> (Sender<Control>, JoinHandle<()>) {
    let (tx, rx) = bounded(CONTROL_CAPACITY);
    let handle = thread::spawn(move || {
        Flusher::new(config, queue, metrics, credentials, rx).run();
    });
    (tx, handle)
}

struct Flusher {
    config: Config,
    queue: Arc<BoundedQueue>,
    metrics: Arc<Metrics>,
    credentials: Arc<CredentialStore>,
    transport: HttpTransport,
    limiter: DualWindowLimiter,
    breaker: CircuitBreaker,
    policy: RetryPolicy,
    rx: Receiver<Control>,
    current_interval: Duration,
    consecutive_backpressure: u32,
    pending_flush_acks: Vec<Sender<()>>,
    shutdown: Option<ShutdownRequest>,
}

impl Flusher {
    fn new(
        config: Config,
        queue: Arc<BoundedQueue>,
        metrics: Arc<Metrics>,
        credentials: Arc<CredentialStore>,
        rx: Receiver<Control>,
    ) -> Self {
        let transport = HttpTransport::new(&config);
        let limiter = DualWindowLimiter::new(
            config.rate_limit_per_minute,
            config.rate_limit_per_hour,
            config.rate_limit_buffer,
        );
        let breaker = CircuitBreaker::new(config.breaker_threshold, config.breaker_timeout);
        let policy = RetryPolicy {
            max_retries_server: config.max_retries_server,
            max_retries_network: config.max_retries_network,
        };
        let current_interval = config.flush_interval;
        Self {
            config,
            queue,
            metrics,
            credentials,
            transport,
            limiter,
            breaker,
            policy,
            rx,
            current_interval,
            consecutive_backpressure: 0,
            pending_flush_acks: Vec::new(),
            shutdown: None,
        }
    }

    fn run(mut self) {
        loop {
            if let Some(request) = self.shutdown.take() {
                self.drain_for_shutdown(&request);
                self.ack_pending_flushes();
                let _ = request.ack.send(());
                return;
            }
            // The select only binds the event; acting on it happens outside
            // so the arm bodies never hold a borrow of the control channel.
            let event: Option<Result<Control, RecvError>> = select! {
                recv(self.rx) -> message => Some(message),
                recv(after(self.current_interval)) -> _ => None,
            };
            match event {
                Some(Ok(Control::Wake)) | None => self.flush_while_pressed(),
                Some(Ok(Control::Flush(ack))) => {
                    self.pending_flush_acks.push(ack);
                    self.flush_until_idle();
                }
                Some(Ok(Control::Shutdown { deadline, ack })) => {
                    self.shutdown = Some(ShutdownRequest { deadline, ack });
                }
                Some(Err(_)) => {
                    // Facade dropped without shutdown; nothing more can
                    // arrive, so abandon whatever is queued and exit.
                    self.abandon_queue();
                    return;
                }
            }
            self.ack_pending_flushes();
        }
    }

    /// One flush, repeated while the queue still holds a flush-size worth.
    fn flush_while_pressed(&mut self) {
        loop {
            match self.flush_once(None) {
                FlushOutcome::Committed | FlushOutcome::Dropped => {
                    if self.shutdown.is_some() || self.queue.len() < self.config.flush_size {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    /// Flush repeatedly until the queue is empty or no progress is possible.
    fn flush_until_idle(&mut self) {
        loop {
            match self.flush_once(None) {
                FlushOutcome::Committed | FlushOutcome::Dropped => {
                    if self.shutdown.is_some() {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    /// One flush iteration: gate, drain, attempt until the retry policy
    /// settles the batch.
    ///
    /// `deadline` is set only during the shutdown drain, where sleeps are
    /// clamped to it instead of listening for further control messages.
    fn flush_once(&mut self, deadline: Option<Instant>) -> FlushOutcome {
        if self.credentials.any_latched() {
            return FlushOutcome::Latched;
        }

        let batch_limit = match self.breaker.gate(Instant::now()) {
            Gate::Allow => self.config.max_batch_size,
            Gate::AllowProbe => 1,
            Gate::Blocked { remaining } => {
                self.sync_breaker_metrics();
                return FlushOutcome::Blocked { remaining };
            }
        };
        self.sync_breaker_metrics();

        let batch = self.queue.drain_batch(batch_limit);
        if batch.is_empty() {
            return FlushOutcome::QueueEmpty;
        }

        let mut attempt = 0u32;
        loop {
            match self.acquire_rate_slot(deadline) {
                PauseResult::Completed => {}
                PauseResult::ShutdownRequested => {
                    self.queue.requeue_front(batch);
                    return FlushOutcome::ShutdownRequested;
                }
                PauseResult::DeadlineExpired => {
                    self.queue.requeue_front(batch);
                    return FlushOutcome::Requeued;
                }
            }

            attempt += 1;
            self.metrics.record_attempt();
            let records: Vec<&LogRecord> = batch.iter().map(|slot| &slot.record).collect();
            let outcome = self.transport.send(&records, &self.credentials);
            self.metrics.record_outcome(&outcome);

            if outcome.is_accepted() {
                self.breaker.record_success();
            } else {
                self.breaker.record_failure(Instant::now());
            }
            self.sync_breaker_metrics();
            self.note_backpressure(&outcome);

            match self.policy.plan(&outcome, attempt) {
                RetryAction::Commit => {
                    let rejected = match &outcome {
                        Outcome::Accepted { rejected, errors, .. } => {
                            if *rejected > 0 {
                                diag!(
                                    "server rejected {rejected} of {} records: {errors:?}",
                                    batch.len()
                                );
                            }
                            *rejected
                        }
                        _ => 0,
                    };
                    self.metrics.record_committed(batch.len() as u64, rejected);
                    return FlushOutcome::Committed;
                }
                RetryAction::DropBatch => {
                    self.apply_terminal(&outcome, batch.len());
                    return FlushOutcome::Dropped;
                }
                RetryAction::Requeue => {
                    self.queue.requeue_front(batch);
                    return FlushOutcome::Requeued;
                }
                RetryAction::Retry(delay) => {
                    if self.breaker.state() == CircuitState::Open {
                        // Tripped mid-iteration; let the gate decide when the
                        // batch gets another chance.
                        self.queue.requeue_front(batch);
                        return FlushOutcome::Requeued;
                    }
                    match self.pause(delay, deadline) {
                        PauseResult::Completed => {}
                        PauseResult::ShutdownRequested => {
                            self.queue.requeue_front(batch);
                            return FlushOutcome::ShutdownRequested;
                        }
                        PauseResult::DeadlineExpired => {
                            self.queue.requeue_front(batch);
                            return FlushOutcome::Requeued;
                        }
                    }
                }
            }
        }
    }

    /// Wait for the dual-window limiter to admit a send attempt.
    fn acquire_rate_slot(&mut self, deadline: Option<Instant>) -> PauseResult {
        loop {
            let now = Instant::now();
            match self.limiter.try_acquire(now) {
                Admission::Granted => {
                    let (minute, hour) = self.limiter.window_counts(now);
                    self.metrics.set_window_rates(minute as u64, hour as u64);
                    return PauseResult::Completed;
                }
                Admission::Wait(wait) => match self.pause(wait, deadline) {
                    PauseResult::Completed => {}
                    interrupted => return interrupted,
                },
            }
        }
    }

    /// Sleep for `duration`, staying receptive to control messages.
    ///
    /// During the shutdown drain (`deadline` set) the sleep is instead
    /// clamped to the deadline and uninterruptible; only one shutdown ever
    /// arrives.
    fn pause(&mut self, duration: Duration, deadline: Option<Instant>) -> PauseResult {
        if let Some(deadline) = deadline {
            let now = Instant::now();
            if now >= deadline {
                return PauseResult::DeadlineExpired;
            }
            let clamped = duration.min(deadline - now);
            thread::sleep(clamped);
            if clamped < duration {
                return PauseResult::DeadlineExpired;
            }
            return PauseResult::Completed;
        }

        let timer = after(duration);
        loop {
            let event: Option<Result<Control, RecvError>> = select! {
                recv(self.rx) -> message => Some(message),
                recv(timer) -> _ => None,
            };
            match event {
                None => return PauseResult::Completed,
                Some(Ok(Control::Wake)) => {}
                Some(Ok(Control::Flush(ack))) => self.pending_flush_acks.push(ack),
                Some(Ok(Control::Shutdown { deadline, ack })) => {
                    self.shutdown = Some(ShutdownRequest { deadline, ack });
                    return PauseResult::ShutdownRequested;
                }
                Some(Err(_)) => return PauseResult::ShutdownRequested,
            }
        }
    }

    /// Adaptive slowdown under sustained ingestion backpressure.
    fn note_backpressure(&mut self, outcome: &Outcome) {
        if matches!(outcome, Outcome::BackpressureFull { .. }) {
            self.consecutive_backpressure += 1;
            if self.consecutive_backpressure >= BACKPRESSURE_SLOWDOWN_AFTER {
                let doubled = self.current_interval.saturating_mul(2);
                self.current_interval = doubled.min(MAX_FLUSH_INTERVAL);
            }
        } else {
            self.consecutive_backpressure = 0;
            if outcome.is_accepted() {
                self.current_interval = self.config.flush_interval;
            }
        }
    }

    /// Latch and account for a terminal (non-retryable) outcome.
    fn apply_terminal(&mut self, outcome: &Outcome, records: usize) {
        match outcome {
            Outcome::ClientValidation => {
                diag!("server rejected batch as malformed; dropping {records} records");
            }
            Outcome::AuthInvalid => {
                self.credentials.latch_api_key_invalid();
                diag!("api key rejected (401); sends paused until credentials refresh");
            }
            Outcome::NotFound => {
                self.credentials.latch_project_not_found();
                diag!("project not found (404); sends paused until credentials refresh");
            }
            _ => {}
        }
        self.metrics.record_dropped_rejected(records as u64);
    }

    /// Drain through the normal pipeline until the deadline, then abandon.
    fn drain_for_shutdown(&mut self, request: &ShutdownRequest) {
        loop {
            let now = Instant::now();
            if now >= request.deadline {
                break;
            }
            match self.flush_once(Some(request.deadline)) {
                FlushOutcome::QueueEmpty => break,
                FlushOutcome::Committed | FlushOutcome::Dropped | FlushOutcome::Requeued => {}
                FlushOutcome::Blocked { remaining } => {
                    // Breaker open: wait out the shorter of recovery and the
                    // shutdown budget, then re-check.
                    let budget = request.deadline - now;
                    thread::sleep(remaining.min(budget));
                }
                FlushOutcome::Latched | FlushOutcome::ShutdownRequested => break,
            }
        }
        self.abandon_queue();
    }

    fn abandon_queue(&mut self) {
        let abandoned = self.queue.drain_batch(usize::MAX).len();
        if abandoned > 0 {
            self.metrics.record_dropped_on_shutdown(abandoned as u64);
            diag!("shutdown abandoned {abandoned} queued records");
        }
    }

    fn ack_pending_flushes(&mut self) {
        for ack in self.pending_flush_acks.drain(..) {
            let _ = ack.send(());
        }
    }

    fn sync_breaker_metrics(&self) {
        self.metrics
            .set_breaker(self.breaker.state(), self.breaker.consecutive_failures());
    }
}
