//! Small-integer id allocation for ring owners (one id per device/queue).

use crate::{ExecContext, RingError, SpinLock};

const WORD_BITS: u32 = u64::BITS;

/// Hands out the lowest free `u32` id.
///
/// Ids are tracked in a growable bitmap behind a [`SpinLock`] that is
/// independent of any ring lock.
#[derive(Debug, Default)]
pub struct IndexPool {
    words: SpinLock<Vec<u64>>,
}

static GLOBAL: IndexPool = IndexPool::new();

impl IndexPool {
    /// Creates an empty pool.
    pub const fn new() -> Self {
        Self {
            words: SpinLock::new(Vec::new()),
        }
    }

    /// The process-wide pool.
    pub fn global() -> &'static IndexPool {
        &GLOBAL
    }

    /// Allocates the lowest id not currently in use.
    pub fn acquire(&self) -> Result<u32, RingError> {
        let mut words = self.words.lock(ExecContext::Task);

        if let Some((w, word)) = words.iter_mut().enumerate().find(|(_, w)| **w != u64::MAX) {
            let bit = word.trailing_ones();
            let id = u32::try_from(w)
                .ok()
                .and_then(|w| w.checked_mul(WORD_BITS))
                .and_then(|base| base.checked_add(bit))
                .ok_or(RingError::NoSpace)?;
            *word |= 1u64 << bit;
            return Ok(id);
        }

        let id = u32::try_from(words.len())
            .ok()
            .and_then(|w| w.checked_mul(WORD_BITS))
            .ok_or(RingError::NoSpace)?;
        words.try_reserve(1).map_err(|_| RingError::AllocationFailure {
            capacity: words.len() + 1,
        })?;
        words.push(1);
        Ok(id)
    }

    /// Returns `id` to the pool. Releasing an id that is not in use is a no-op.
    pub fn release(&self, id: u32) {
        let mut words = self.words.lock(ExecContext::Task);
        let (w, bit) = ((id / WORD_BITS) as usize, id % WORD_BITS);
        if let Some(word) = words.get_mut(w) {
            *word &= !(1u64 << bit);
        }
    }

    /// Returns true if `id` is currently allocated.
    pub fn contains(&self, id: u32) -> bool {
        let words = self.words.lock(ExecContext::Task);
        let (w, bit) = ((id / WORD_BITS) as usize, id % WORD_BITS);
        words.get(w).is_some_and(|word| word & (1u64 << bit) != 0)
    }

    /// Number of ids currently allocated.
    pub fn in_use(&self) -> usize {
        let words = self.words.lock(ExecContext::Task);
        words.iter().map(|w| w.count_ones() as usize).sum()
    }
}
