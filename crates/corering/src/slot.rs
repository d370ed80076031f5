//! Slot storage and the slot capability interface.
//!
//! [`CoreRing`](crate::CoreRing) never decides on its own whether a slot is
//! occupied. It asks the [`SlotOps`] it was built with, so the same ring skeleton
//! can carry owning pointers, plain handles or arbitrary values without a
//! sentinel baked into the ring.
//!
//! # Protocol
//!
//! The ring drives every slot through the same cycle:
//!
//! ```text
//!   producer lock held              consumer lock held
//!   ------------------              ------------------
//!   is_valid(slot) == false         is_valid(slot) == true
//!   store(slot, item)  --Release--> (Acquire in is_valid)
//!                                   load(slot) -> item
//!   (Acquire in is_valid) <-Release-- clear(slot)
//! ```
//!
//! `is_valid` is the only synchronization point between the two sides: it must
//! load with `Acquire`, and both `store` and `clear` must publish with `Release`.

use crate::RingError;
use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::num::NonZeroU64;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, Ordering};

/// Per-slot operations a [`CoreRing`](crate::CoreRing) is parameterized with.
///
/// Locating a slot is the ring's job (see [`SlotStore::seek`]); everything about
/// what a slot contains is the implementor's.
pub trait SlotOps: Send + Sync {
    /// The element handed in by producers and out to consumers.
    type Item;
    /// One storage location. Dropping a slot must release a live element.
    type Slot: Send + Sync;

    /// Creates a slot that holds nothing.
    fn vacant(&self) -> Self::Slot;

    /// Returns true if the slot holds a live element. Must load with `Acquire`.
    fn is_valid(&self, slot: &Self::Slot) -> bool;

    /// Copies `item` into the slot and publishes it with `Release`.
    ///
    /// # Safety
    ///
    /// The caller must have observed `is_valid(slot) == false` and be the only
    /// thread allowed to produce into this slot (it holds the producer lock).
    unsafe fn store(&self, slot: &Self::Slot, item: Self::Item);

    /// Copies the element out of the slot. The slot still tests valid until
    /// [`clear`](Self::clear) is called.
    ///
    /// # Safety
    ///
    /// The caller must have observed `is_valid(slot) == true`, be the only thread
    /// allowed to consume from this slot, and call `clear` before anything else
    /// inspects the slot.
    unsafe fn load(&self, slot: &Self::Slot) -> Self::Item;

    /// Marks a slot whose element was moved out by `load` as vacant (`Release`).
    ///
    /// # Safety
    ///
    /// Must directly follow a `load` of the same slot by the same consumer.
    unsafe fn clear(&self, slot: &Self::Slot);

    /// Runs `f` on the live element without removing it.
    ///
    /// # Safety
    ///
    /// Same requirements as [`load`](Self::load), minus the `clear`.
    unsafe fn peek<R>(&self, slot: &Self::Slot, f: impl FnOnce(&Self::Item) -> R) -> R;
}

/// Fixed-length backing array of slots.
pub struct SlotStore<S: SlotOps> {
    slots: Box<[S::Slot]>,
}

impl<S: SlotOps> SlotStore<S> {
    /// Allocates `size` vacant slots.
    ///
    /// Uses `try_reserve_exact` so an impossible allocation surfaces as
    /// [`RingError::AllocationFailure`] instead of aborting the process.
    pub fn allocate(ops: &S, size: usize) -> Result<Self, RingError> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(size)
            .map_err(|_| RingError::AllocationFailure { capacity: size })?;
        slots.extend((0..size).map(|_| ops.vacant()));
        Ok(Self {
            slots: slots.into_boxed_slice(),
        })
    }

    /// Returns the slot at index `i`.
    #[inline]
    pub fn seek(&self, i: usize) -> &S::Slot {
        &self.slots[i]
    }

    /// Returns the number of slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true for a zero-length (disabled) store.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

// ---------------------------------------------------------------------
// Owning pointer slots: non-null means live
// ---------------------------------------------------------------------

/// Slots holding owned `Box<T>` elements as raw pointers; null is vacant.
///
/// This is the packet-pointer array shape: one machine word per slot and the
/// pointer itself doubles as the occupancy flag.
pub struct PtrSlots<T>(PhantomData<fn(Box<T>) -> Box<T>>);

impl<T> PtrSlots<T> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for PtrSlots<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One [`PtrSlots`] storage word.
pub struct PtrSlot<T> {
    ptr: AtomicPtr<T>,
}

// Safety: the slot owns the `T` behind the pointer exactly like a `Box<T>`.
unsafe impl<T: Send> Send for PtrSlot<T> {}
unsafe impl<T: Send> Sync for PtrSlot<T> {}

impl<T> Drop for PtrSlot<T> {
    fn drop(&mut self) {
        let ptr = *self.ptr.get_mut();
        if !ptr.is_null() {
            // SAFETY: a non-null pointer came from Box::into_raw in `store` and
            // was never handed out, since `load` is always followed by `clear`.
            drop(unsafe { Box::from_raw(ptr) });
        }
    }
}

impl<T: Send> SlotOps for PtrSlots<T> {
    type Item = Box<T>;
    type Slot = PtrSlot<T>;

    fn vacant(&self) -> PtrSlot<T> {
        PtrSlot {
            ptr: AtomicPtr::new(ptr::null_mut()),
        }
    }

    #[inline]
    fn is_valid(&self, slot: &PtrSlot<T>) -> bool {
        !slot.ptr.load(Ordering::Acquire).is_null()
    }

    #[inline]
    unsafe fn store(&self, slot: &PtrSlot<T>, item: Box<T>) {
        slot.ptr.store(Box::into_raw(item), Ordering::Release);
    }

    #[inline]
    unsafe fn load(&self, slot: &PtrSlot<T>) -> Box<T> {
        // SAFETY: the caller observed a non-null pointer published by `store`;
        // ownership moves to the returned box and `clear` forgets the pointer.
        unsafe { Box::from_raw(slot.ptr.load(Ordering::Relaxed)) }
    }

    #[inline]
    unsafe fn clear(&self, slot: &PtrSlot<T>) {
        slot.ptr.store(ptr::null_mut(), Ordering::Release);
    }

    #[inline]
    unsafe fn peek<R>(&self, slot: &PtrSlot<T>, f: impl FnOnce(&Box<T>) -> R) -> R {
        // Borrow the allocation as a Box without taking ownership of it.
        // SAFETY: the caller holds the consumer lock, so nothing frees the
        // element while `f` runs; ManuallyDrop keeps us from freeing it either.
        let item = std::mem::ManuallyDrop::new(unsafe {
            Box::from_raw(slot.ptr.load(Ordering::Relaxed))
        });
        f(&*item)
    }
}

// ---------------------------------------------------------------------
// Handle slots: zero means vacant
// ---------------------------------------------------------------------

/// Slots holding non-zero 64-bit handles (buffer ids, descriptor indices).
#[derive(Debug, Clone, Copy, Default)]
pub struct HandleSlots;

impl SlotOps for HandleSlots {
    type Item = NonZeroU64;
    type Slot = AtomicU64;

    fn vacant(&self) -> AtomicU64 {
        AtomicU64::new(0)
    }

    #[inline]
    fn is_valid(&self, slot: &AtomicU64) -> bool {
        slot.load(Ordering::Acquire) != 0
    }

    #[inline]
    unsafe fn store(&self, slot: &AtomicU64, item: NonZeroU64) {
        slot.store(item.get(), Ordering::Release);
    }

    #[inline]
    unsafe fn load(&self, slot: &AtomicU64) -> NonZeroU64 {
        // SAFETY: the caller observed the slot as valid, i.e. non-zero.
        unsafe { NonZeroU64::new_unchecked(slot.load(Ordering::Relaxed)) }
    }

    #[inline]
    unsafe fn clear(&self, slot: &AtomicU64) {
        slot.store(0, Ordering::Release);
    }

    #[inline]
    unsafe fn peek<R>(&self, slot: &AtomicU64, f: impl FnOnce(&NonZeroU64) -> R) -> R {
        // SAFETY: forwarded from the caller's contract.
        f(&unsafe { self.load(slot) })
    }
}

// ---------------------------------------------------------------------
// Flag slots: any T, occupancy in a side flag
// ---------------------------------------------------------------------

/// Slots for arbitrary `T`, with occupancy held in an atomic flag next to the
/// value instead of in the value itself.
pub struct FlagSlots<T>(PhantomData<fn(T) -> T>);

impl<T> FlagSlots<T> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for FlagSlots<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One [`FlagSlots`] storage location.
pub struct FlagSlot<T> {
    full: AtomicBool,
    value: UnsafeCell<MaybeUninit<T>>,
}

// Safety: `value` is only written by the producer while `full` is false and
// only read by the consumer while `full` is true; the flag orders the handoff.
unsafe impl<T: Send> Send for FlagSlot<T> {}
unsafe impl<T: Send> Sync for FlagSlot<T> {}

impl<T> Drop for FlagSlot<T> {
    fn drop(&mut self) {
        if *self.full.get_mut() {
            // SAFETY: `full` is only set after `value` was written.
            unsafe { self.value.get_mut().assume_init_drop() };
        }
    }
}

impl<T: Send> SlotOps for FlagSlots<T> {
    type Item = T;
    type Slot = FlagSlot<T>;

    fn vacant(&self) -> FlagSlot<T> {
        FlagSlot {
            full: AtomicBool::new(false),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    #[inline]
    fn is_valid(&self, slot: &FlagSlot<T>) -> bool {
        slot.full.load(Ordering::Acquire)
    }

    #[inline]
    unsafe fn store(&self, slot: &FlagSlot<T>, item: T) {
        // SAFETY: the slot is vacant and we are its only producer.
        unsafe { (*slot.value.get()).write(item) };
        slot.full.store(true, Ordering::Release);
    }

    #[inline]
    unsafe fn load(&self, slot: &FlagSlot<T>) -> T {
        // SAFETY: the slot is full (Acquire in is_valid saw the producer's
        // Release) and `clear` follows before anyone reads it again.
        unsafe { (*slot.value.get()).assume_init_read() }
    }

    #[inline]
    unsafe fn clear(&self, slot: &FlagSlot<T>) {
        slot.full.store(false, Ordering::Release);
    }

    #[inline]
    unsafe fn peek<R>(&self, slot: &FlagSlot<T>, f: impl FnOnce(&T) -> R) -> R {
        // SAFETY: the slot is full and only the consumer may vacate it.
        f(unsafe { (*slot.value.get()).assume_init_ref() })
    }
}
