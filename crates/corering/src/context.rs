//! Execution-context tokens.
//!
//! A ring lock must be taken the same way on both sides of a ring that is shared
//! with an interrupt handler, otherwise the handler can preempt a lock holder on
//! the same CPU and spin on the lock forever. Instead of one entry point per
//! discipline, every ring operation takes an [`ExecContext`] that says how to
//! bracket the critical section:
//!
//! | Context   | on enter                         | on exit                        |
//! |-----------|----------------------------------|--------------------------------|
//! | `Task`    | nothing                          | nothing                        |
//! | `SoftIrq` | disable deferred work (nestable) | re-enable deferred work        |
//! | `Irq`     | disable interrupts               | enable interrupts              |
//! | `Any`     | save state, disable interrupts   | restore saved state            |
//!
//! The interrupt state lives in a per-thread "CPU" so the disciplines can be
//! exercised and observed by ordinary threads.

use crate::invariants::debug_assert_irqs_enabled;
use std::cell::Cell;

thread_local! {
    static CPU: CpuState = const {
        CpuState {
            irqs_disabled: Cell::new(false),
            softirq_depth: Cell::new(0),
        }
    };
}

struct CpuState {
    irqs_disabled: Cell<bool>,
    softirq_depth: Cell<u32>,
}

/// How a lock acquisition brackets its critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecContext {
    /// Ordinary task context. The other side never runs from an interrupt.
    #[default]
    Task,
    /// The other side may run from deferred work (softirq/bottom half).
    SoftIrq,
    /// The other side may run from a hardware interrupt, and the caller knows
    /// interrupts are currently enabled.
    Irq,
    /// Safe from anywhere: the previous interrupt state is saved and restored.
    Any,
}

/// What [`ExecContext::exit`] needs to undo an [`ExecContext::enter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "the context must be exited with the state returned by enter"]
pub struct ContextState {
    ctx: ExecContext,
    saved_irqs_disabled: bool,
}

impl ExecContext {
    /// Enters the context on the current CPU.
    pub fn enter(self) -> ContextState {
        let saved_irqs_disabled = irqs_disabled();
        match self {
            ExecContext::Task => {}
            ExecContext::SoftIrq => local_bh_disable(),
            ExecContext::Irq => {
                debug_assert_irqs_enabled!(saved_irqs_disabled);
                local_irq_disable();
            }
            ExecContext::Any => local_irq_disable(),
        }
        ContextState {
            ctx: self,
            saved_irqs_disabled,
        }
    }

    /// Leaves a context previously entered with [`enter`](Self::enter).
    pub fn exit(state: ContextState) {
        match state.ctx {
            ExecContext::Task => {}
            ExecContext::SoftIrq => local_bh_enable(),
            ExecContext::Irq => local_irq_enable(),
            ExecContext::Any => local_irq_restore(state.saved_irqs_disabled),
        }
    }

    /// Returns true if lock waiters in this context may yield the CPU.
    #[inline]
    pub fn may_yield(self) -> bool {
        matches!(self, ExecContext::Task)
    }
}

/// Returns true if interrupts are disabled on the current CPU.
pub fn irqs_disabled() -> bool {
    CPU.with(|cpu| cpu.irqs_disabled.get())
}

/// Returns true if deferred work is disabled on the current CPU.
pub fn softirqs_disabled() -> bool {
    CPU.with(|cpu| cpu.softirq_depth.get() > 0)
}

/// Disables interrupts and returns the previous state.
pub fn local_irq_save() -> bool {
    CPU.with(|cpu| cpu.irqs_disabled.replace(true))
}

/// Restores an interrupt state returned by [`local_irq_save`].
pub fn local_irq_restore(disabled: bool) {
    CPU.with(|cpu| cpu.irqs_disabled.set(disabled));
}

/// Runs `f` with interrupts disabled, restoring the previous state afterwards.
pub fn without_interrupts<R>(f: impl FnOnce() -> R) -> R {
    let saved = local_irq_save();
    let ret = f();
    local_irq_restore(saved);
    ret
}

fn local_irq_disable() {
    CPU.with(|cpu| cpu.irqs_disabled.set(true));
}

fn local_irq_enable() {
    CPU.with(|cpu| cpu.irqs_disabled.set(false));
}

fn local_bh_disable() {
    CPU.with(|cpu| cpu.softirq_depth.set(cpu.softirq_depth.get() + 1));
}

fn local_bh_enable() {
    CPU.with(|cpu| {
        let depth = cpu.softirq_depth.get();
        debug_assert!(depth > 0, "deferred work enabled more often than disabled");
        cpu.softirq_depth.set(depth.saturating_sub(1));
    });
}
