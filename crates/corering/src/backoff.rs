use crate::ExecContext;
use std::hint;
use std::thread;

/// Exponential backoff for a contended [`SpinLock`](crate::SpinLock).
///
/// Each [`wait`](Self::wait) doubles the number of PAUSE hints up to
/// `2^SPIN_LIMIT`. After that a waiter in task context gives its time slice
/// away; a waiter that entered an interrupt or deferred-work context keeps
/// spinning at the cap, since it must not leave the CPU.
#[derive(Debug)]
pub struct Backoff {
    step: u32,
    may_yield: bool,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6;
    const YIELD_LIMIT: u32 = 10;

    /// Creates a backoff for a waiter running in `ctx`.
    #[inline]
    pub fn new(ctx: ExecContext) -> Self {
        Self {
            step: 0,
            may_yield: ctx.may_yield(),
        }
    }

    /// Waits once, a little longer than last time.
    #[inline]
    pub fn wait(&mut self) {
        if self.step <= Self::SPIN_LIMIT || !self.may_yield {
            for _ in 0..1u32 << self.step.min(Self::SPIN_LIMIT) {
                hint::spin_loop();
            }
        } else {
            thread::yield_now();
        }

        let cap = if self.may_yield {
            Self::YIELD_LIMIT
        } else {
            Self::SPIN_LIMIT
        };
        if self.step <= cap {
            self.step += 1;
        }
    }

    /// Returns true once the waiter has moved past pure spinning.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.step > Self::SPIN_LIMIT
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(ExecContext::Task)
    }
}
