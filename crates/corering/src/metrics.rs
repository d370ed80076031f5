use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe ring counters.
///
/// Both sides update their own counters while holding their own lock, so every
/// counter has a single writer at a time and `Relaxed` is sufficient.
#[derive(Debug, Default)]
pub struct Metrics {
    produced: AtomicU64,
    consumed: AtomicU64,
    rejected_full: AtomicU64,
    empty_polls: AtomicU64,
    purged: AtomicU64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Elements accepted by a produce/queue.
    pub produced: u64,
    /// Elements handed to a consumer.
    pub consumed: u64,
    /// Produce attempts refused with `NoSpace`.
    pub rejected_full: u64,
    /// Consume attempts that found the ring empty.
    pub empty_polls: u64,
    /// Elements released by cleanup, purge or a shrinking resize.
    pub purged: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn add_produced(&self, n: u64) {
        self.produced.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_consumed(&self, n: u64) {
        self.consumed.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_rejected_full(&self) {
        self.rejected_full.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_empty_poll(&self) {
        self.empty_polls.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_purged(&self, n: u64) {
        self.purged.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            produced: self.produced.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
            rejected_full: self.rejected_full.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            purged: self.purged.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let m = Metrics::new();
        m.add_produced(3);
        m.add_consumed(2);
        m.add_rejected_full();
        m.add_empty_poll();
        m.add_empty_poll();
        m.add_purged(1);

        assert_eq!(
            m.snapshot(),
            MetricsSnapshot {
                produced: 3,
                consumed: 2,
                rejected_full: 1,
                empty_polls: 2,
                purged: 1,
            }
        );
    }
}
