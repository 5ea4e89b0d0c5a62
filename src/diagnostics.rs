//! Internal diagnostics, written straight to the process standard error
//! stream.
//!
//! This crate captures application logs, so its own complaints must never
//! travel through the `log`/`tracing` facades: a host that forwards those
//! facades into the client would feed the pipeline's errors back into its own
//! queue. Everything here bypasses that loop with `eprintln!`.

use std::sync::atomic::{AtomicU64, Ordering};

/// Emit one diagnostic line.
pub(crate) fn emit(message: std::fmt::Arguments<'_>) {
    eprintln!("logship: {message}");
}

macro_rules! diag {
    ($($arg:tt)*) => {
        $crate::diagnostics::emit(format_args!($($arg)*))
    };
}

pub(crate) use diag;

/// Count-gated warner for dropped records.
///
/// Emits one stderr line on the first drop and then once every `every`
/// further drops, keeping a sustained overflow from flooding the host's
/// error stream.
pub(crate) struct DropWarner {
    context: &'static str,
    every: u64,
    dropped: AtomicU64,
}

impl DropWarner {
    pub(crate) fn new(context: &'static str, every: u64) -> Self {
        Self {
            context,
            every,
            dropped: AtomicU64::new(0),
        }
    }

    /// Record one drop, emitting a diagnostic if this drop crosses the gate.
    pub(crate) fn note(&self) {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        if self.every <= 1 || total % self.every == 1 {
            diag!("{}: {total} records dropped so far", self.context);
        }
    }

    /// Total drops recorded through this warner.
    #[cfg_attr(not(test), allow(dead_code))]
    pub(crate) fn total(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
