//! Supervisor tick (§4.4 "Supervisor tick"): a ~1ms host timer callback
//! that advances the virtual clock and, when safe, lets queued background
//! callbacks run.

use cpyhost_hwplane::clock::ClockMode;
use cpyhost_hwplane::HardwarePlane;
use std::collections::VecDeque;

/// Outcome of a single `supervisor_tick_from_js()` call, told to the kernel
/// so it knows whether it may dispatch queued callbacks this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Depth was 0: the clock advanced and callbacks may run.
    Dispatched,
    /// Depth > 0: only the clock was touched; callback dispatch deferred
    /// (§4.4: "to avoid reentering the VM").
    Deferred,
}

/// A background callback registered by peripheral code, identified only by
/// an opaque proxy id the kernel resolves and invokes (§4.4 "Background
/// callbacks ... run at yield points, never in the middle of a bytecode").
#[derive(Debug, Clone, Copy)]
pub struct QueuedCallback {
    pub proxy_id: u32,
}

/// Drives the 1ms host timer tick. Owns the FIFO of deferred callbacks so
/// registration order is preserved (§5 "Background callbacks execute in
/// registration order at the next yield point").
#[derive(Default)]
pub struct Supervisor {
    queue: VecDeque<QueuedCallback>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, callback: QueuedCallback) {
        self.queue.push_back(callback);
    }

    /// §4.4: "Tick execution is gated: if external-call-depth > 0, the tick
    /// only updates the clock and defers any callback dispatch."
    pub fn tick(&mut self, external_call_depth: u32, hw: &mut HardwarePlane) -> TickOutcome {
        if hw.mode() == ClockMode::Realtime {
            hw.host_advance_realtime(1);
        }
        if external_call_depth > 0 {
            return TickOutcome::Deferred;
        }
        TickOutcome::Dispatched
    }

    /// Drains callbacks in FIFO order. The kernel only calls this after a
    /// `TickOutcome::Dispatched` tick, or at an explicit yield point.
    pub fn drain_due_callbacks(&mut self) -> Vec<QueuedCallback> {
        self.queue.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_defers_dispatch_while_nested() {
        let mut sup = Supervisor::new();
        let mut hw = HardwarePlane::new(48_000_000);
        sup.schedule(QueuedCallback { proxy_id: 1 });

        let outcome = sup.tick(1, &mut hw);
        assert_eq!(outcome, TickOutcome::Deferred);
        assert_eq!(sup.pending_count(), 1, "callback must still be queued");

        let outcome = sup.tick(0, &mut hw);
        assert_eq!(outcome, TickOutcome::Dispatched);
    }

    #[test]
    fn callbacks_drain_in_registration_order() {
        let mut sup = Supervisor::new();
        sup.schedule(QueuedCallback { proxy_id: 1 });
        sup.schedule(QueuedCallback { proxy_id: 2 });
        sup.schedule(QueuedCallback { proxy_id: 3 });
        let drained: Vec<u32> = sup.drain_due_callbacks().iter().map(|c| c.proxy_id).collect();
        assert_eq!(drained, vec![1, 2, 3]);
    }

    #[test]
    fn tick_advances_clock_even_when_deferred() {
        let mut sup = Supervisor::new();
        let mut hw = HardwarePlane::new(48_000_000);
        let before = hw.ticks();
        sup.tick(3, &mut hw);
        assert!(hw.ticks() > before);
    }
}
