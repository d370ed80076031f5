use crate::invariants::{
    debug_assert_bounded_count, debug_assert_monotonic, debug_assert_tail_not_past_head,
};
use crate::{Config, ExecContext, Metrics, MetricsSnapshot, NoSpace, Payload, RingError, SpinLock};
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

// =============================================================================
// MEMORY ORDERING & SYNCHRONIZATION STRATEGY
// =============================================================================
//
// `head` counts descriptors ever queued, `tail` counts descriptors ever
// dequeued. Both are unbounded u64 sequence numbers; the slot is
// `sequence & mask`, which is why capacity must be a power of two. Because the
// counters never wrap in practice, `head - tail` is the exact occupancy and all
// `capacity` slots are usable.
//
// **Writer (queue, under wlock):**
// 1. Load `tail` with Acquire (sees the reader's last release of a slot)
// 2. Load `head` with Relaxed (only writers store head, and they hold wlock)
// 3. Write payload and cached length into descs[head & mask]
// 4. Store `head + 1` with Release (publishes the descriptor)
//
// **Reader (dequeue, under rlock):**
// 1. Load `head` with Acquire (synchronizes with step 4 above)
// 2. Load `tail` with Relaxed (only readers store tail, and they hold rlock)
// 3. Move the payload out of descs[tail & mask]
// 4. Store `tail + 1` with Release (hands the slot back to writers)
//
// **Lock-free readers (peek_length, queue_len, is_empty):**
// Acquire-load `head`, then read `tail`. Nothing is dereferenced except the
// cached length, which is itself an atomic word, so a peek can be stale but
// never torn.
//
// =============================================================================

/// One ring entry: the owned payload plus its length cached at queue time.
struct Descriptor<P> {
    payload: UnsafeCell<MaybeUninit<P>>,
    len: AtomicUsize,
}

impl<P> Descriptor<P> {
    fn vacant() -> Self {
        Self {
            payload: UnsafeCell::new(MaybeUninit::uninit()),
            len: AtomicUsize::new(0),
        }
    }
}

/// A sequence counter together with the lock that serializes its writers.
struct Cursor {
    seq: AtomicU64,
    lock: SpinLock<()>,
}

impl Cursor {
    const fn new() -> Self {
        Self {
            seq: AtomicU64::new(0),
            lock: SpinLock::new(()),
        }
    }
}

/// Descriptor ring for packet payloads.
///
/// Writers serialize on the writer lock, readers on the reader lock, and the
/// two never wait on each other. `peek_length`, `queue_len` and `is_empty`
/// take no lock at all and can be called from any context.
///
/// The ring owns a payload from `queue` until `dequeue` hands it back; payloads
/// still queued when the ring is purged or dropped are released.
#[repr(C)]
pub struct DescRing<P> {
    // === READER HOT ===
    reader: CachePadded<Cursor>,

    // === SHARED, READ-ONLY ===
    descs: Box<[Descriptor<P>]>,
    mask: u64,

    // === WRITER HOT ===
    writer: CachePadded<Cursor>,

    // === COLD STATE ===
    metrics: Metrics,
    config: Config,
}

// Safety: a descriptor's payload is written only by the writer-lock holder
// before head is released, and read only by the reader-lock holder after head
// is acquired. Payloads cross threads, hence `P: Send`.
unsafe impl<P: Send> Send for DescRing<P> {}
unsafe impl<P: Send> Sync for DescRing<P> {}

impl<P: Payload> DescRing<P> {
    /// Creates an empty descriptor ring.
    ///
    /// Fails with `InvalidConfiguration` unless the capacity is a non-zero
    /// power of two, and with `AllocationFailure` if the descriptor array
    /// cannot be allocated.
    pub fn new(config: Config) -> Result<Self, RingError> {
        config.validate_power_of_two()?;
        let capacity = config.capacity();

        let mut descs = Vec::new();
        descs
            .try_reserve_exact(capacity)
            .map_err(|_| RingError::AllocationFailure { capacity })?;
        descs.extend((0..capacity).map(|_| Descriptor::vacant()));

        Ok(Self {
            reader: CachePadded::new(Cursor::new()),
            descs: descs.into_boxed_slice(),
            mask: config.mask() as u64,
            writer: CachePadded::new(Cursor::new()),
            metrics: Metrics::new(),
            config,
        })
    }

    // ---------------------------------------------------------------------
    // CONSTANTS & STATUS (lock-free)
    // ---------------------------------------------------------------------

    /// Returns the ring capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.descs.len()
    }

    #[inline]
    fn desc(&self, seq: u64) -> &Descriptor<P> {
        &self.descs[(seq & self.mask) as usize]
    }

    /// Returns `(head, tail)` as seen by a lock-free reader.
    #[inline]
    fn snapshot(&self) -> (u64, u64) {
        let head = self.writer.seq.load(Ordering::Acquire);
        let tail = self.reader.seq.load(Ordering::Relaxed);
        (head, tail)
    }

    /// Returns the number of queued descriptors (point-in-time snapshot).
    #[inline]
    pub fn queue_len(&self) -> usize {
        let (head, tail) = self.snapshot();
        // tail is read after head and may already have moved past it
        (head.saturating_sub(tail) as usize).min(self.capacity())
    }

    /// Returns true if nothing is queued (point-in-time snapshot).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue_len() == 0
    }

    /// Returns the cached length of the oldest descriptor, or 0 if empty.
    ///
    /// Takes no lock and never touches the payload itself.
    pub fn peek_length(&self) -> usize {
        let (head, tail) = self.snapshot();
        if head <= tail {
            return 0;
        }
        self.desc(tail).len.load(Ordering::Relaxed)
    }

    /// Total descriptors ever queued.
    #[inline]
    pub fn total_queued(&self) -> u64 {
        self.writer.seq.load(Ordering::Acquire)
    }

    /// Total descriptors ever dequeued or purged.
    #[inline]
    pub fn total_dequeued(&self) -> u64 {
        self.reader.seq.load(Ordering::Acquire)
    }

    // ---------------------------------------------------------------------
    // WRITER API
    // ---------------------------------------------------------------------

    /// Queues `payload`, caching its wire length in the descriptor.
    ///
    /// Hands the payload back in [`NoSpace`] when the ring is full. Callers
    /// should treat that as backpressure rather than retrying in a tight loop.
    pub fn queue_in(&self, ctx: ExecContext, payload: P) -> Result<(), NoSpace<P>> {
        // caller code stays outside the critical section
        let len = payload.wire_len();
        let _guard = self.writer.lock.lock(ctx);

        let tail = self.reader.seq.load(Ordering::Acquire);
        let head = self.writer.seq.load(Ordering::Relaxed);
        let count = head.wrapping_sub(tail) as usize;

        if count >= self.capacity() {
            if self.config.enable_metrics {
                self.metrics.add_rejected_full();
            }
            return Err(NoSpace(payload));
        }

        let desc = self.desc(head);
        desc.len.store(len, Ordering::Relaxed);
        // SAFETY: slot `head` is outside [tail, head), so no reader touches it,
        // and the writer lock makes us its only writer.
        unsafe { (*desc.payload.get()).write(payload) };

        let new_head = head.wrapping_add(1);
        debug_assert_bounded_count!(new_head.wrapping_sub(tail) as usize, self.capacity());
        debug_assert_monotonic!("head", head, new_head);

        // produce descriptor before publishing head
        self.writer.seq.store(new_head, Ordering::Release);

        if self.config.enable_metrics {
            self.metrics.add_produced(1);
        }
        Ok(())
    }

    /// [`queue_in`](Self::queue_in) from task context.
    #[inline]
    pub fn queue(&self, payload: P) -> Result<(), NoSpace<P>> {
        self.queue_in(ExecContext::Task, payload)
    }

    // ---------------------------------------------------------------------
    // READER API
    // ---------------------------------------------------------------------

    /// Removes the oldest payload and transfers its ownership to the caller.
    pub fn dequeue_in(&self, ctx: ExecContext) -> Result<P, RingError> {
        let _guard = self.reader.lock.lock(ctx);

        // read index before reading contents at that index
        let head = self.writer.seq.load(Ordering::Acquire);
        let tail = self.reader.seq.load(Ordering::Relaxed);

        if head == tail {
            if self.config.enable_metrics {
                self.metrics.add_empty_poll();
            }
            return Err(RingError::Empty);
        }

        // SAFETY: tail < head, so the descriptor was fully written before the
        // Release store of head we just acquired; the reader lock makes us the
        // only reader, and advancing tail below forgets the moved-out value.
        let payload = unsafe { (*self.desc(tail).payload.get()).assume_init_read() };

        let new_tail = tail.wrapping_add(1);
        debug_assert_tail_not_past_head!(new_tail, head);
        debug_assert_monotonic!("tail", tail, new_tail);

        // read descriptor before handing the slot back
        self.reader.seq.store(new_tail, Ordering::Release);

        if self.config.enable_metrics {
            self.metrics.add_consumed(1);
        }
        Ok(payload)
    }

    /// [`dequeue_in`](Self::dequeue_in) from task context.
    #[inline]
    pub fn dequeue(&self) -> Result<P, RingError> {
        self.dequeue_in(ExecContext::Task)
    }

    // ---------------------------------------------------------------------
    // LIFECYCLE
    // ---------------------------------------------------------------------

    /// Releases every queued payload through `release`.
    ///
    /// Holds the reader lock (taken in `ctx`) with the writer lock nested
    /// inside, so no payload can be queued or dequeued while purging. Tail is
    /// published after every release. Returns the number of payloads released.
    pub fn purge_with_in<F>(&self, ctx: ExecContext, mut release: F) -> usize
    where
        F: FnMut(P),
    {
        let _reader = self.reader.lock.lock(ctx);
        let _writer = self.writer.lock.lock(ExecContext::Task);

        let head = self.writer.seq.load(Ordering::Acquire);
        let mut tail = self.reader.seq.load(Ordering::Relaxed);
        let mut count = 0;

        while tail != head {
            // SAFETY: same argument as dequeue_in; both locks are held.
            let payload = unsafe { (*self.desc(tail).payload.get()).assume_init_read() };
            let new_tail = tail.wrapping_add(1);
            debug_assert_tail_not_past_head!(new_tail, head);
            self.reader.seq.store(new_tail, Ordering::Release);
            tail = new_tail;

            release(payload);
            count += 1;
        }

        if self.config.enable_metrics {
            self.metrics.add_purged(count as u64);
        }
        count
    }

    /// Drops every queued payload. Returns how many were dropped.
    #[inline]
    pub fn purge(&self) -> usize {
        self.purge_with_in(ExecContext::SoftIrq, drop)
    }

    /// Get a snapshot of metrics if enabled.
    pub fn metrics(&self) -> MetricsSnapshot {
        if self.config.enable_metrics {
            self.metrics.snapshot()
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl<P> Drop for DescRing<P> {
    fn drop(&mut self) {
        let head = *self.writer.seq.get_mut();
        let tail = *self.reader.seq.get_mut();
        let mask = self.mask;

        let mut seq = tail;
        while seq != head {
            let desc = &mut self.descs[(seq & mask) as usize];
            // SAFETY: every descriptor in [tail, head) holds an initialized payload.
            unsafe { desc.payload.get_mut().assume_init_drop() };
            seq = seq.wrapping_add(1);
        }
    }
}
