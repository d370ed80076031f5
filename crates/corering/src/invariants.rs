//! Debug assertion macros for ring invariants.
//!
//! They are only active in debug builds (`#[cfg(debug_assertions)]`), so there is
//! zero overhead in release builds.
//!
//! Used by `CoreRing<S>`, `DescRing<P>` and the context/lock layer.

// =============================================================================
// Bounded count
// =============================================================================

/// Assert that the number of queued items does not exceed capacity.
///
/// **Invariant**: `0 ≤ (head - tail) ≤ capacity`
///
/// Used in: `DescRing::queue_in()` before publishing head
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "bounded count violated: count {} exceeds capacity {}",
            $count,
            $capacity
        )
    };
}

/// Assert that the reader does not advance past the writer.
///
/// **Invariant**: `tail ≤ head` (after advance)
///
/// Used in: `DescRing::dequeue_in()` and `purge_with_in()`
macro_rules! debug_assert_tail_not_past_head {
    ($new_tail:expr, $head:expr) => {
        debug_assert!(
            $new_tail <= $head,
            "bounded count violated: advancing tail {} beyond head {}",
            $new_tail,
            $head
        )
    };
}

// =============================================================================
// Index range
// =============================================================================

/// Assert that a wrapped slot index lies inside the store.
///
/// **Invariant**: `0 ≤ producer, consumer < size` whenever `size > 0`
///
/// Used in: `CoreRing` after advancing either index
macro_rules! debug_assert_index_in_range {
    ($name:literal, $index:expr, $size:expr) => {
        debug_assert!(
            $index < $size,
            "index range violated: {} index {} not below size {}",
            $name,
            $index,
            $size
        )
    };
}

// =============================================================================
// Monotonic progress
// =============================================================================

/// Assert that a sequence counter only increases.
///
/// Used in: `DescRing` for head and tail
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "monotonic progress violated: {} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

// =============================================================================
// Lock discipline
// =============================================================================

/// Assert that a lock is held before touching state it guards.
///
/// Used in: `CoreRing::resize_in()` before swapping the store
macro_rules! debug_assert_lock_held {
    ($name:literal, $lock:expr) => {
        debug_assert!(
            $lock.is_locked(),
            "lock discipline violated: {} lock not held",
            $name
        )
    };
}

/// Assert that an `Irq` section is not entered with interrupts already off.
///
/// Unconditional re-enable on exit would turn interrupts back on underneath the
/// outer section; callers in that position must use `ExecContext::Any`.
///
/// Used in: `ExecContext::enter()`
macro_rules! debug_assert_irqs_enabled {
    ($disabled:expr) => {
        debug_assert!(
            !$disabled,
            "irq nesting violated: ExecContext::Irq entered with interrupts disabled, use ExecContext::Any"
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_index_in_range;
pub(crate) use debug_assert_irqs_enabled;
pub(crate) use debug_assert_lock_held;
pub(crate) use debug_assert_monotonic;
pub(crate) use debug_assert_tail_not_past_head;
