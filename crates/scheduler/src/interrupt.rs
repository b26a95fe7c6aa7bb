//! Cooperative cancellation (§4.4 "Cancellation & timeout", §5
//! "Cancellation"). There is no preemptive timeout: the host raises an
//! interrupt flag, and the VM hook observes it at the next safe point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Host-exported `raise_interrupt()`-equivalent: requests that the
    /// guest see a `KeyboardInterrupt` at the next safe point.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Observed by the VM hook; clears the flag once consumed so a single
    /// raise injects exactly one interrupt.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    pub fn is_pending(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_fires_once() {
        let flag = InterruptFlag::new();
        assert!(!flag.is_pending());
        flag.raise();
        assert!(flag.is_pending());
        assert!(flag.take());
        assert!(!flag.is_pending());
        assert!(!flag.take());
    }
}
