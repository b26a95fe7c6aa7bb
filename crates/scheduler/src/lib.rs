//! Scheduler / yield core (C4): the periodic VM hook, yield-decision
//! timing, the supervisor tick, and soft-reset lifecycle. See `spec.md`
//! §4.4 and §5.

pub mod clock_source;
pub mod hook;
pub mod interrupt;
pub mod soft_reset;
pub mod supervisor;
pub mod yield_strategy;

pub use clock_source::{FakeClock, MonotonicClock, WallClock};
pub use hook::VmHook;
pub use interrupt::InterruptFlag;
pub use soft_reset::{post_reset_action, PostResetAction, SoftResetCause};
pub use supervisor::{QueuedCallback, Supervisor, TickOutcome};
pub use yield_strategy::{active_strategy, YieldStrategy};

/// Bundles the pieces a kernel needs to drive steady-state execution: the
/// bytecode hook, the interrupt flag, and the supervisor's callback queue.
/// Deliberately thin — it owns no proxy or hardware state itself, only the
/// scheduling metadata, so `cpyhost-scheduler` stays a leaf with respect to
/// `cpyhost-proxy` (§2 dependency order).
pub struct Scheduler {
    pub hook: VmHook,
    pub interrupt: InterruptFlag,
    pub supervisor: Supervisor,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            hook: VmHook::new(),
            interrupt: InterruptFlag::new(),
            supervisor: Supervisor::new(),
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
