//! Dual sliding-window admission gate for outbound send attempts.
//!
//! The limiter keeps one timestamp deque per window (60 s and 3600 s) and
//! admits an attempt only when both windows sit under their effective cap,
//! which is the configured limit scaled by the buffer fraction. Staying a
//! margin below the stated quota means the remote endpoint should never have
//! to throttle us in the first place.
//!
//! The limiter itself never sleeps. [`DualWindowLimiter::try_acquire`] either
//! admits immediately or reports how long the caller must wait for the
//! binding window's oldest entry to age out; the flusher owns the actual
//! (cancellable) sleep. Pruning plus the occasional pop keeps the cost
//! amortized O(1) per call.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Result of an admission check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// The attempt was admitted and recorded in both windows.
    Granted,
    /// Both windows are consulted again after this wait.
    Wait(Duration),
}

struct Window {
    span: Duration,
    cap: usize,
    entries: VecDeque<Instant>,
}

impl Window {
    fn new(span: Duration, limit: u32, buffer: f64) -> Self {
        let cap = ((f64::from(limit) * buffer).floor() as usize).max(1);
        Self {
            span,
            cap,
            entries: VecDeque::new(),
        }
    }

    fn prune(&mut self, now: Instant) {
        while self
            .entries
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= self.span)
        {
            self.entries.pop_front();
        }
    }

    /// Time until the oldest entry ages out, or `None` when under cap.
    fn wait_for_slot(&self, now: Instant) -> Option<Duration> {
        if self.entries.len() < self.cap {
            return None;
        }
        let oldest = *self.entries.front()?;
        Some(self.span.saturating_sub(now.duration_since(oldest)))
    }
}

/// Admission gate enforcing per-minute and per-hour caps simultaneously.
pub struct DualWindowLimiter {
    minute: Window,
    hour: Window,
    rng: StdRng,
}

impl DualWindowLimiter {
    pub fn new(limit_per_minute: u32, limit_per_hour: u32, buffer: f64) -> Self {
        Self {
            minute: Window::new(Duration::from_secs(60), limit_per_minute, buffer),
            hour: Window::new(Duration::from_secs(3600), limit_per_hour, buffer),
            rng: StdRng::from_entropy(),
        }
    }

    /// Check admission at `now`.
    ///
    /// On [`Admission::Granted`] the attempt is pushed into both windows. A
    /// [`Admission::Wait`] carries the binding window's age-out delay plus
    /// about a millisecond of jitter so callers waking together do not stay
    /// in lockstep.
    pub fn try_acquire(&mut self, now: Instant) -> Admission {
        self.minute.prune(now);
        self.hour.prune(now);

        let wait = match (
            self.minute.wait_for_slot(now),
            self.hour.wait_for_slot(now),
        ) {
            (None, None) => {
                self.minute.entries.push_back(now);
                self.hour.entries.push_back(now);
                return Admission::Granted;
            }
            (minute, hour) => minute.max(hour).unwrap_or_default(),
        };

        let jitter = Duration::from_micros(self.rng.gen_range(1000..2000));
        Admission::Wait(wait + jitter)
    }

    /// Send counts currently inside the (minute, hour) windows.
    pub fn window_counts(&mut self, now: Instant) -> (usize, usize) {
        self.minute.prune(now);
        self.hour.prune(now);
        (self.minute.entries.len(), self.hour.entries.len())
    }
}
