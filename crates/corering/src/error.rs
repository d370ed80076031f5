//! Error types for ring operations.

use std::fmt;
use thiserror::Error;

/// Errors that can occur in ring operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    /// The ring is full (or disabled with zero capacity) and cannot accept more items.
    #[error("no space left in ring")]
    NoSpace,

    /// The ring holds nothing to consume or peek.
    #[error("ring is empty")]
    Empty,

    /// The backing store could not be allocated.
    #[error("failed to allocate backing store for {capacity} slots")]
    AllocationFailure {
        /// The number of slots that was requested.
        capacity: usize,
    },

    /// A construction parameter was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
}

impl RingError {
    /// Returns `true` if a later attempt may succeed (`NoSpace`, `Empty`).
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoSpace | Self::Empty)
    }

    /// Returns `true` if this error happened at construction and the ring is unusable.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::AllocationFailure { .. } | Self::InvalidConfiguration(_)
        )
    }
}

/// A rejected produce: the ring was full, so the element is handed back.
///
/// The ring never retries or drops on its own. The caller decides whether to
/// drop the element, spin, or push back on its own upstream.
#[derive(Clone, Copy, PartialEq, Eq, Error)]
#[error("no space left in ring")]
pub struct NoSpace<T>(pub T);

impl<T> NoSpace<T> {
    /// Recovers the rejected element.
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

// Manual impl so `T` does not need to be `Debug` (payloads often are not).
impl<T> fmt::Debug for NoSpace<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoSpace").finish_non_exhaustive()
    }
}

impl<T> From<NoSpace<T>> for RingError {
    fn from(_: NoSpace<T>) -> Self {
        RingError::NoSpace
    }
}
