use crate::invariants::{debug_assert_index_in_range, debug_assert_lock_held};
use crate::slot::{FlagSlots, HandleSlots, PtrSlots, SlotOps, SlotStore};
use crate::{Config, ExecContext, Metrics, MetricsSnapshot, NoSpace, RingError, SpinLock};
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};

// =============================================================================
// LOCKING & SYNCHRONIZATION STRATEGY
// =============================================================================
//
// The ring has two independent lock domains:
//
// - producer lock: guards the producer index and every `store` into a slot
// - consumer lock: guards the consumer index and every `load`/`clear`
//
// Producers never take the consumer lock and consumers never take the producer
// lock, so the two sides run concurrently. Occupancy is not derived from the
// indices; each side asks `SlotOps::is_valid` about the slot at its own index.
// That check is the only point where the sides synchronize:
//
// **Producer:** is_valid(slot[p]) (Acquire, sees consumer's clear) -> store
//               (Release) -> advance p
// **Consumer:** is_valid(slot[c]) (Acquire, sees producer's store) -> load ->
//               clear (Release) -> advance c
//
// ## Resize
//
// `resize_in` is the only operation holding both locks. It always takes the
// consumer lock first and nests the producer lock inside it; no other call
// site needs both, so that single order cannot deadlock.
//
// ## Lock-free fast paths
//
// `is_full_unlocked`/`is_empty_unlocked` read the index and the validity flag
// without locking. They are only sound while no resize can run, because resize
// replaces the slot store, hence `unsafe`.
//
// =============================================================================

/// One side of the ring: its index and the lock that serializes it.
struct Side {
    /// Next slot to write (producer) or read (consumer).
    ///
    /// Only written under `lock`; atomic so the unlocked fast paths can read it.
    index: AtomicUsize,
    lock: SpinLock<()>,
}

impl Side {
    const fn new() -> Self {
        Self {
            index: AtomicUsize::new(0),
            lock: SpinLock::new(()),
        }
    }
}

/// Bounded FIFO over a [`SlotStore`], parameterized by [`SlotOps`].
///
/// - Separate producer and consumer spin locks, each cache-padded together with
///   the index it guards, so the two sides don't share a cache line
/// - Every operation takes an [`ExecContext`] naming the lock discipline
/// - Full/empty are signalled synchronously; the ring never retries
#[repr(C)]
pub struct CoreRing<S: SlotOps> {
    // === PRODUCER HOT ===
    producer: CachePadded<Side>,

    // === CONSUMER HOT ===
    consumer: CachePadded<Side>,

    // === SHARED, READ-MOSTLY ===
    /// Number of slots. Changes only under both locks (resize).
    size: CachePadded<AtomicUsize>,
    /// The backing slots. Replaced only under both locks (resize).
    store: UnsafeCell<SlotStore<S>>,
    ops: S,

    // === COLD STATE ===
    metrics: Metrics,
    config: Config,
}

// Safety: all mutation of shared state happens through atomics, through the
// slot protocol under the owning side's lock, or under both locks (resize).
unsafe impl<S: SlotOps> Send for CoreRing<S> where S::Item: Send {}
unsafe impl<S: SlotOps> Sync for CoreRing<S> where S::Item: Send {}

/// Ring of owned `Box<T>` pointers.
pub type PtrRing<T> = CoreRing<PtrSlots<T>>;

/// Ring of non-zero `u64` handles.
pub type HandleRing = CoreRing<HandleSlots>;

/// Ring of arbitrary `T` with a per-slot occupancy flag.
pub type FlagRing<T> = CoreRing<FlagSlots<T>>;

impl<S: SlotOps + Default> CoreRing<S> {
    /// Creates an empty ring using the default slot operations.
    pub fn new(config: Config) -> Result<Self, RingError> {
        Self::with_ops(config, S::default())
    }
}

impl<S: SlotOps> CoreRing<S> {
    /// Creates an empty ring with explicit slot operations.
    ///
    /// A capacity of zero is accepted and yields a disabled ring: every produce
    /// fails with `NoSpace` and every consume reports `Empty`.
    pub fn with_ops(config: Config, ops: S) -> Result<Self, RingError> {
        let store = SlotStore::allocate(&ops, config.capacity())?;

        Ok(Self {
            producer: CachePadded::new(Side::new()),
            consumer: CachePadded::new(Side::new()),
            size: CachePadded::new(AtomicUsize::new(config.capacity())),
            store: UnsafeCell::new(store),
            ops,
            metrics: Metrics::new(),
            config,
        })
    }

    // ---------------------------------------------------------------------
    // CONSTANTS & STATUS
    // ---------------------------------------------------------------------

    /// Returns the current number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Returns the slot operations this ring was built with.
    #[inline]
    pub fn ops(&self) -> &S {
        &self.ops
    }

    /// # Safety
    ///
    /// The caller must hold at least one of the two locks, or otherwise rule
    /// out a concurrent `resize_in`.
    #[inline]
    unsafe fn slots(&self) -> &SlotStore<S> {
        unsafe { &*self.store.get() }
    }

    fn full_locked(&self, store: &SlotStore<S>) -> bool {
        if store.is_empty() {
            return true;
        }
        let idx = self.producer.index.load(Ordering::Relaxed);
        self.ops.is_valid(store.seek(idx))
    }

    fn empty_locked(&self, store: &SlotStore<S>) -> bool {
        if store.is_empty() {
            return true;
        }
        let idx = self.consumer.index.load(Ordering::Relaxed);
        !self.ops.is_valid(store.seek(idx))
    }

    /// Returns true if the next produce would fail.
    pub fn is_full_in(&self, ctx: ExecContext) -> bool {
        let _guard = self.producer.lock.lock(ctx);
        // SAFETY: producer lock held.
        self.full_locked(unsafe { self.slots() })
    }

    /// Returns true if the next consume would fail.
    pub fn is_empty_in(&self, ctx: ExecContext) -> bool {
        let _guard = self.consumer.lock.lock(ctx);
        // SAFETY: consumer lock held.
        self.empty_locked(unsafe { self.slots() })
    }

    /// [`is_full_in`](Self::is_full_in) from task context.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.is_full_in(ExecContext::Task)
    }

    /// [`is_empty_in`](Self::is_empty_in) from task context.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.is_empty_in(ExecContext::Task)
    }

    /// Lock-free full check. The answer is a snapshot and may be stale.
    ///
    /// # Safety
    ///
    /// No `resize_in` may run concurrently with this call.
    #[inline]
    pub unsafe fn is_full_unlocked(&self) -> bool {
        self.full_locked(unsafe { self.slots() })
    }

    /// Lock-free empty check. The answer is a snapshot and may be stale.
    ///
    /// # Safety
    ///
    /// No `resize_in` may run concurrently with this call.
    #[inline]
    pub unsafe fn is_empty_unlocked(&self) -> bool {
        self.empty_locked(unsafe { self.slots() })
    }

    // ---------------------------------------------------------------------
    // PRODUCER API
    // ---------------------------------------------------------------------

    /// Stores `item` at the producer index.
    ///
    /// Fails with [`NoSpace`] (handing `item` back) when the slot at the
    /// producer index is still occupied or the ring has zero capacity. A
    /// failed produce does not mutate the ring.
    pub fn produce_in(&self, ctx: ExecContext, item: S::Item) -> Result<(), NoSpace<S::Item>> {
        let _guard = self.producer.lock.lock(ctx);
        // SAFETY: producer lock held.
        let store = unsafe { self.slots() };

        if self.full_locked(store) {
            if self.config.enable_metrics {
                self.metrics.add_rejected_full();
            }
            return Err(NoSpace(item));
        }

        let idx = self.producer.index.load(Ordering::Relaxed);
        // SAFETY: full_locked saw the slot vacant and we hold the producer lock.
        unsafe { self.ops.store(store.seek(idx), item) };

        let next = if idx + 1 >= store.len() { 0 } else { idx + 1 };
        debug_assert_index_in_range!("producer", next, store.len());
        self.producer.index.store(next, Ordering::Relaxed);

        if self.config.enable_metrics {
            self.metrics.add_produced(1);
        }
        Ok(())
    }

    /// [`produce_in`](Self::produce_in) from task context.
    #[inline]
    pub fn produce(&self, item: S::Item) -> Result<(), NoSpace<S::Item>> {
        self.produce_in(ExecContext::Task, item)
    }

    // ---------------------------------------------------------------------
    // CONSUMER API
    // ---------------------------------------------------------------------

    /// Removes the element at the consumer index. Caller holds the consumer lock.
    fn consume_locked(&self, store: &SlotStore<S>) -> Option<S::Item> {
        if self.empty_locked(store) {
            return None;
        }

        let idx = self.consumer.index.load(Ordering::Relaxed);
        let slot = store.seek(idx);
        // SAFETY: empty_locked saw the slot valid, we hold the consumer lock,
        // and `clear` follows immediately.
        let item = unsafe {
            let item = self.ops.load(slot);
            self.ops.clear(slot);
            item
        };

        let next = if idx + 1 >= store.len() { 0 } else { idx + 1 };
        debug_assert_index_in_range!("consumer", next, store.len());
        self.consumer.index.store(next, Ordering::Relaxed);
        Some(item)
    }

    /// Runs `f` on the element at the consumer index without removing it.
    ///
    /// `f` runs under the consumer lock, which makes it safe to dereference the
    /// element; keep it short, since consumers on other CPUs spin meanwhile.
    pub fn peek_with_in<R>(
        &self,
        ctx: ExecContext,
        f: impl FnOnce(&S::Item) -> R,
    ) -> Result<R, RingError> {
        let _guard = self.consumer.lock.lock(ctx);
        // SAFETY: consumer lock held.
        let store = unsafe { self.slots() };
        if self.empty_locked(store) {
            return Err(RingError::Empty);
        }
        let idx = self.consumer.index.load(Ordering::Relaxed);
        // SAFETY: slot observed valid under the consumer lock.
        Ok(unsafe { self.ops.peek(store.seek(idx), f) })
    }

    /// [`peek_with_in`](Self::peek_with_in) from task context.
    #[inline]
    pub fn peek_with<R>(&self, f: impl FnOnce(&S::Item) -> R) -> Result<R, RingError> {
        self.peek_with_in(ExecContext::Task, f)
    }

    /// Returns a copy of the element at the consumer index without removing it.
    pub fn peek_in(&self, ctx: ExecContext) -> Result<S::Item, RingError>
    where
        S::Item: Clone,
    {
        self.peek_with_in(ctx, Clone::clone)
    }

    /// Removes and returns the oldest element, or `RingError::Empty`.
    pub fn consume_in(&self, ctx: ExecContext) -> Result<S::Item, RingError> {
        let _guard = self.consumer.lock.lock(ctx);
        // SAFETY: consumer lock held.
        match self.consume_locked(unsafe { self.slots() }) {
            Some(item) => {
                if self.config.enable_metrics {
                    self.metrics.add_consumed(1);
                }
                Ok(item)
            }
            None => {
                if self.config.enable_metrics {
                    self.metrics.add_empty_poll();
                }
                Err(RingError::Empty)
            }
        }
    }

    /// [`consume_in`](Self::consume_in) from task context.
    #[inline]
    pub fn consume(&self) -> Result<S::Item, RingError> {
        self.consume_in(ExecContext::Task)
    }

    /// Consume up to `max_items` under a single consumer-lock acquisition.
    ///
    /// Stops early at the first empty slot, so fewer than `max_items` does not
    /// imply another consumer drained the ring. The handler runs under the
    /// consumer lock and must not consume from this ring itself.
    pub fn consume_up_to_in<F>(&self, ctx: ExecContext, max_items: usize, mut handler: F) -> usize
    where
        F: FnMut(S::Item),
    {
        if max_items == 0 {
            return 0;
        }

        let _guard = self.consumer.lock.lock(ctx);
        // SAFETY: consumer lock held.
        let store = unsafe { self.slots() };

        let mut count = 0;
        while count < max_items {
            match self.consume_locked(store) {
                Some(item) => {
                    handler(item);
                    count += 1;
                }
                None => break,
            }
        }

        if self.config.enable_metrics {
            self.metrics.add_consumed(count as u64);
            if count < max_items {
                self.metrics.add_empty_poll();
            }
        }
        count
    }

    /// Appends up to `n` consumed elements to `out`, returning how many.
    pub fn consume_batched_in(&self, ctx: ExecContext, out: &mut Vec<S::Item>, n: usize) -> usize {
        out.reserve(n.min(self.capacity()));
        self.consume_up_to_in(ctx, n, |item| out.push(item))
    }

    /// [`consume_batched_in`](Self::consume_batched_in) from task context.
    #[inline]
    pub fn consume_batched(&self, out: &mut Vec<S::Item>, n: usize) -> usize {
        self.consume_batched_in(ExecContext::Task, out, n)
    }

    // ---------------------------------------------------------------------
    // LIFECYCLE
    // ---------------------------------------------------------------------

    /// Consumes until empty, passing every removed element to `destructor`.
    ///
    /// The destructor is mandatory: pass `drop` to release elements, or a
    /// closure that forgets them for non-owning element types. Returns the
    /// number of elements handed to the destructor.
    pub fn cleanup_in<F>(&self, ctx: ExecContext, mut destructor: F) -> usize
    where
        F: FnMut(S::Item),
    {
        let mut count = 0;
        while let Ok(item) = self.consume_in(ctx) {
            destructor(item);
            count += 1;
        }
        if self.config.enable_metrics {
            self.metrics.add_purged(count as u64);
        }
        count
    }

    /// [`cleanup_in`](Self::cleanup_in) from task context.
    #[inline]
    pub fn cleanup<F>(&self, destructor: F) -> usize
    where
        F: FnMut(S::Item),
    {
        self.cleanup_in(ExecContext::Task, destructor)
    }

    /// Replaces the slot store with one of `new_size` slots.
    ///
    /// Takes the consumer lock (in `ctx`) and then the producer lock nested
    /// inside it. Live elements move to the new store in FIFO order; elements
    /// that no longer fit are passed to `destructor`. The new store is
    /// allocated before either lock is taken, so an allocation failure leaves
    /// the ring untouched.
    pub fn resize_in<F>(
        &self,
        ctx: ExecContext,
        new_size: usize,
        mut destructor: F,
    ) -> Result<(), RingError>
    where
        F: FnMut(S::Item),
    {
        let new_store = SlotStore::allocate(&self.ops, new_size)?;

        let consumer_guard = self.consumer.lock.lock(ctx);
        // Interrupt/softirq state is already covered by the outer acquisition.
        let producer_guard = self.producer.lock.lock(ExecContext::Task);
        debug_assert_lock_held!("consumer", self.consumer.lock);
        debug_assert_lock_held!("producer", self.producer.lock);

        // SAFETY: both locks are held, so no other reference into the store
        // exists and none can be created until we unlock.
        let store = unsafe { &mut *self.store.get() };

        let mut producer = 0;
        let mut dropped = 0u64;
        while let Some(item) = self.consume_locked(store) {
            if producer < new_size {
                // SAFETY: the new store is private to us and slot `producer`
                // has not been written yet.
                unsafe { self.ops.store(new_store.seek(producer), item) };
                producer += 1;
            } else {
                destructor(item);
                dropped += 1;
            }
        }
        if producer >= new_size {
            producer = 0;
        }

        let old_store = mem::replace(store, new_store);
        self.producer.index.store(producer, Ordering::Relaxed);
        self.consumer.index.store(0, Ordering::Relaxed);
        self.size.store(new_size, Ordering::Relaxed);

        drop(producer_guard);
        drop(consumer_guard);
        drop(old_store);

        if self.config.enable_metrics {
            self.metrics.add_purged(dropped);
        }
        Ok(())
    }

    /// [`resize_in`](Self::resize_in) from task context.
    #[inline]
    pub fn resize<F>(&self, new_size: usize, destructor: F) -> Result<(), RingError>
    where
        F: FnMut(S::Item),
    {
        self.resize_in(ExecContext::Task, new_size, destructor)
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
