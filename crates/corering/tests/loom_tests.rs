//! Loom-based concurrency tests for the ring handoff protocols.
//!
//! Run with: `cargo test --features loom --test loom_tests --release`
//!
//! Loom exhaustively explores thread interleavings. The models below mirror
//! the orderings used by `DescRing` (sequence counters) and `FlagRing`
//! (per-slot validity flags) with a tiny capacity so the state space stays
//! tractable. Payload cells are `loom::cell::UnsafeCell`, so any access that
//! the orderings fail to separate is reported as a data race.

#![cfg(feature = "loom")]

use loom::cell::UnsafeCell;
use loom::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use loom::sync::Arc;
use loom::thread;

const CAP: usize = 2;

// =============================================================================
// Descriptor ring: head/tail sequence counters, cached length
// =============================================================================

struct LoomDescRing {
    head: AtomicU64,
    tail: AtomicU64,
    payload: [UnsafeCell<u64>; CAP],
    len: [AtomicUsize; CAP],
}

unsafe impl Send for LoomDescRing {}
unsafe impl Sync for LoomDescRing {}

impl LoomDescRing {
    fn new() -> Self {
        Self {
            head: AtomicU64::new(0),
            tail: AtomicU64::new(0),
            payload: [UnsafeCell::new(0), UnsafeCell::new(0)],
            len: [AtomicUsize::new(0), AtomicUsize::new(0)],
        }
    }

    fn queue(&self, value: u64, len: usize) -> bool {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Relaxed);
        if (head - tail) as usize >= CAP {
            return false;
        }
        let idx = head as usize % CAP;
        self.len[idx].store(len, Ordering::Relaxed);
        self.payload[idx].with_mut(|p| unsafe { *p = value });
        self.head.store(head + 1, Ordering::Release);
        true
    }

    fn dequeue(&self) -> Option<u64> {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Relaxed);
        if head == tail {
            return None;
        }
        let idx = tail as usize % CAP;
        let value = self.payload[idx].with(|p| unsafe { *p });
        self.tail.store(tail + 1, Ordering::Release);
        Some(value)
    }

    fn peek_length(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Relaxed);
        if head <= tail {
            return 0;
        }
        self.len[tail as usize % CAP].load(Ordering::Relaxed)
    }
}

/// Queue/dequeue across wraparound: FIFO, no loss, no duplicates, no races.
#[test]
fn loom_desc_queue_dequeue() {
    loom::model(|| {
        let ring = Arc::new(LoomDescRing::new());
        let writer_ring = Arc::clone(&ring);

        let writer = thread::spawn(move || {
            let mut sent = 0;
            for v in 1..=3u64 {
                if writer_ring.queue(v, v as usize * 10) {
                    sent += 1;
                } else {
                    break;
                }
            }
            sent
        });

        let mut received = Vec::new();
        for _ in 0..3 {
            if let Some(v) = ring.dequeue() {
                received.push(v);
            }
            thread::yield_now();
        }

        let sent = writer.join().unwrap();
        while let Some(v) = ring.dequeue() {
            received.push(v);
        }
        let expected: Vec<u64> = (1..=sent).collect();
        assert_eq!(received, expected);
    });
}

/// A lock-free peek sees either nothing or a length that was fully written.
#[test]
fn loom_desc_peek_length_not_torn() {
    loom::model(|| {
        let ring = Arc::new(LoomDescRing::new());
        let writer_ring = Arc::clone(&ring);

        let writer = thread::spawn(move || {
            assert!(writer_ring.queue(7, 64));
        });

        let len = ring.peek_length();
        assert!(len == 0 || len == 64, "unexpected length {len}");

        writer.join().unwrap();
        assert_eq!(ring.peek_length(), 64);
    });
}

// =============================================================================
// Generic ring: per-slot validity flag
// =============================================================================

struct LoomFlagRing {
    full: [AtomicBool; CAP],
    value: [UnsafeCell<u64>; CAP],
    producer: UnsafeCell<usize>,
    consumer: UnsafeCell<usize>,
}

unsafe impl Send for LoomFlagRing {}
unsafe impl Sync for LoomFlagRing {}

impl LoomFlagRing {
    fn new() -> Self {
        Self {
            full: [AtomicBool::new(false), AtomicBool::new(false)],
            value: [UnsafeCell::new(0), UnsafeCell::new(0)],
            producer: UnsafeCell::new(0),
            consumer: UnsafeCell::new(0),
        }
    }

    /// Single producer, so the producer index needs no lock in the model.
    fn produce(&self, v: u64) -> bool {
        let idx = self.producer.with(|p| unsafe { *p });
        if self.full[idx].load(Ordering::Acquire) {
            return false;
        }
        self.value[idx].with_mut(|p| unsafe { *p = v });
        self.full[idx].store(true, Ordering::Release);
        self.producer.with_mut(|p| unsafe { *p = (idx + 1) % CAP });
        true
    }

    fn consume(&self) -> Option<u64> {
        let idx = self.consumer.with(|c| unsafe { *c });
        if !self.full[idx].load(Ordering::Acquire) {
            return None;
        }
        let v = self.value[idx].with(|p| unsafe { *p });
        self.full[idx].store(false, Ordering::Release);
        self.consumer.with_mut(|c| unsafe { *c = (idx + 1) % CAP });
        Some(v)
    }
}

/// The validity flag alone orders the handoff in both directions.
#[test]
fn loom_flag_slot_handoff() {
    loom::model(|| {
        let ring = Arc::new(LoomFlagRing::new());
        let producer_ring = Arc::clone(&ring);

        let producer = thread::spawn(move || {
            let mut sent = Vec::new();
            for v in 1..=3u64 {
                if producer_ring.produce(v) {
                    sent.push(v);
                }
            }
            sent
        });

        let mut received = Vec::new();
        for _ in 0..2 {
            if let Some(v) = ring.consume() {
                received.push(v);
            }
            thread::yield_now();
        }

        let sent = producer.join().unwrap();
        while let Some(v) = ring.consume() {
            received.push(v);
        }
        assert_eq!(received, sent);
    });
}
