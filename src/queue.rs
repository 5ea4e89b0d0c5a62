//! Bounded FIFO queue between producers and the flusher.
//!
//! This is the only structure in the pipeline touched from more than one
//! thread: any number of producers push via [`BoundedQueue::enqueue`] while
//! the single flusher drains head batches. Capacity is a hard ceiling
//! enforced by evicting the oldest record before each overflowing insert, so
//! an outage degrades into bounded memory plus a drop counter instead of
//! unbounded growth.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

use crate::diagnostics::DropWarner;
use crate::record::LogRecord;

/// One overflow diagnostic per this many dropped records.
const DROP_WARN_EVERY: u64 = 1000;

/// A record held in the queue, stamped with its enqueue instant.
///
/// The instant never travels on the wire; it exists for latency accounting
/// and tests.
#[derive(Clone, Debug)]
pub struct QueueSlot {
    pub record: LogRecord,
    pub enqueued_at: Instant,
}

impl QueueSlot {
    fn new(record: LogRecord) -> Self {
        Self {
            record,
            enqueued_at: Instant::now(),
        }
    }
}

/// Thread-safe bounded FIFO with head-drop overflow.
pub struct BoundedQueue {
    inner: Mutex<VecDeque<QueueSlot>>,
    capacity: usize,
    dropped: AtomicU64,
    warner: DropWarner,
}

impl BoundedQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            dropped: AtomicU64::new(0),
            warner: DropWarner::new("queue overflow", DROP_WARN_EVERY),
        }
    }

    /// Append a record, evicting the oldest first when at capacity.
    ///
    /// Always succeeds; overflow is reported through [`dropped`](Self::dropped)
    /// and a rate-limited stderr diagnostic. Returns the queue length after
    /// the insert so the caller can decide whether to nudge the flusher.
    pub fn enqueue(&self, record: LogRecord) -> usize {
        let (len, overflowed) = {
            let mut queue = self.inner.lock();
            let overflowed = if queue.len() >= self.capacity {
                queue.pop_front();
                true
            } else {
                false
            };
            queue.push_back(QueueSlot::new(record));
            (queue.len(), overflowed)
        };
        if overflowed {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            self.warner.note();
        }
        len
    }

    /// Remove and return up to `max` records from the head.
    pub fn drain_batch(&self, max: usize) -> Vec<QueueSlot> {
        let mut queue = self.inner.lock();
        let take = max.min(queue.len());
        queue.drain(..take).collect()
    }

    /// Put a drained batch back at the head, preserving its internal order.
    ///
    /// Used only by the flusher after a retryable failure so the next drain
    /// reproduces the same logical batch.
    pub fn requeue_front(&self, batch: Vec<QueueSlot>) {
        let mut queue = self.inner.lock();
        for slot in batch.into_iter().rev() {
            queue.push_front(slot);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records evicted by overflow since construction.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LogLevel;
    use rstest::{fixture, rstest};

    fn record(n: usize) -> LogRecord {
        LogRecord::new(LogLevel::Info, format!("record-{n}"))
    }

    fn messages(slots: &[QueueSlot]) -> Vec<String> {
        slots.iter().map(|s| s.record.message.clone()).collect()
    }

    #[fixture]
    fn queue() -> BoundedQueue {
        BoundedQueue::new(10)
    }

    #[rstest]
    fn enqueue_preserves_fifo_order(queue: BoundedQueue) {
        for n in 0..5 {
            queue.enqueue(record(n));
        }
        let batch = queue.drain_batch(10);
        assert_eq!(
            messages(&batch),
            vec!["record-0", "record-1", "record-2", "record-3", "record-4"]
        );
    }

    #[rstest]
    fn overflow_evicts_oldest_and_counts_drops(queue: BoundedQueue) {
        for n in 0..15 {
            queue.enqueue(record(n));
        }
        assert_eq!(queue.len(), 10);
        assert_eq!(queue.dropped(), 5);
        let batch = queue.drain_batch(10);
        // Records 0..=4 were evicted; 5..=14 survive in order.
        assert_eq!(batch[0].record.message, "record-5");
        assert_eq!(batch[9].record.message, "record-14");
    }

    #[rstest]
    fn drain_batch_caps_at_max(queue: BoundedQueue) {
        for n in 0..8 {
            queue.enqueue(record(n));
        }
        let batch = queue.drain_batch(3);
        assert_eq!(batch.len(), 3);
        assert_eq!(queue.len(), 5);
    }

    #[rstest]
    fn requeue_front_restores_drain_order(queue: BoundedQueue) {
        for n in 0..6 {
            queue.enqueue(record(n));
        }
        let batch = queue.drain_batch(3);
        queue.requeue_front(batch);
        let again = queue.drain_batch(6);
        assert_eq!(
            messages(&again),
            vec![
                "record-0", "record-1", "record-2", "record-3", "record-4", "record-5"
            ]
        );
    }

    #[rstest]
    fn requeue_then_overflow_still_evicts_from_head(queue: BoundedQueue) {
        for n in 0..10 {
            queue.enqueue(record(n));
        }
        let batch = queue.drain_batch(4);
        queue.requeue_front(batch);
        queue.enqueue(record(10));
        assert_eq!(queue.dropped(), 1);
        let drained = queue.drain_batch(10);
        assert_eq!(drained[0].record.message, "record-1");
        assert_eq!(drained[9].record.message, "record-10");
    }

    #[rstest]
    fn concurrent_producers_never_exceed_capacity() {
        let queue = std::sync::Arc::new(BoundedQueue::new(64));
        let mut handles = Vec::new();
        for producer in 0..4 {
            let queue = queue.clone();
            handles.push(std::thread::spawn(move || {
                for n in 0..500 {
                    queue.enqueue(record(producer * 1000 + n));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(queue.len() <= 64);
        assert_eq!(queue.len() as u64 + queue.dropped(), 2000);
    }
}
