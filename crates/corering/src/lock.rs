use crate::{Backoff, ContextState, ExecContext};
use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

/// Test-and-test-and-set spin lock whose acquisition is bracketed by an
/// [`ExecContext`].
///
/// Acquire order is: enter context, then spin for the lock. Release order is
/// the reverse: unlock, then leave the context. A waiter in `Task` context may
/// yield once spinning stops paying off; every other context only spins.
pub struct SpinLock<T: ?Sized> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

// Safety: the lock hands out at most one guard at a time, so `T` is only ever
// reachable from one thread at once.
unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Creates an unlocked spin lock.
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }
}

impl<T: ?Sized> SpinLock<T> {
    /// Acquires the lock from the given execution context.
    pub fn lock(&self, ctx: ExecContext) -> SpinGuard<'_, T> {
        let state = ctx.enter();
        let mut backoff = Backoff::new(ctx);
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            // Spin on a plain load so waiters don't bounce the cache line.
            while self.locked.load(Ordering::Relaxed) {
                backoff.wait();
            }
        }
        SpinGuard {
            lock: self,
            state,
            _not_send: PhantomData,
        }
    }

    /// Tries to acquire the lock once. The context is left again on failure.
    pub fn try_lock(&self, ctx: ExecContext) -> Option<SpinGuard<'_, T>> {
        let state = ctx.enter();
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(SpinGuard {
                lock: self,
                state,
                _not_send: PhantomData,
            })
        } else {
            ExecContext::exit(state);
            None
        }
    }

    /// Returns true if some thread currently holds the lock.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> std::fmt::Debug for SpinLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpinLock")
            .field("locked", &self.is_locked())
            .finish_non_exhaustive()
    }
}

/// RAII guard for [`SpinLock`]; unlocks and leaves the context on drop.
#[must_use = "if unused the SpinLock will immediately unlock"]
pub struct SpinGuard<'a, T: ?Sized> {
    lock: &'a SpinLock<T>,
    state: ContextState,
    // The context state belongs to the acquiring CPU, so the guard stays there.
    _not_send: PhantomData<*const ()>,
}

impl<T: ?Sized> Deref for SpinGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard proves we hold the lock.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for SpinGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard proves we hold the lock, and `&mut self` makes this
        // the only reference derived from it.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for SpinGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
        ExecContext::exit(self.state);
    }
}
