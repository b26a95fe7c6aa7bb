//! The external-call-depth counter (§3, §4.1 "External-call-depth
//! contract"): single-threaded bookkeeping of how many host→guest calls
//! are currently nested, and whether a collection is owed at the next
//! top-level return.

use std::cell::Cell;

/// 0 means the guest is idle at top level (§3). Not `Sync`/`Send`-shared
/// across threads by design — §5 "Scheduling model" guarantees exactly
/// one execution context, so a plain `Cell` is enough, the same
/// single-thread assumption `cpyhost-scheduler::InterruptFlag` relies on
/// for its `Arc<AtomicBool>` (shared with host timer callbacks, not with
/// another guest thread).
#[derive(Default)]
pub struct CallDepth {
    depth: Cell<u32>,
    pending_collect: Cell<bool>,
}

/// RAII guard returned by [`CallDepth::enter`]; decrements on drop so an
/// early return (including via `?`) can never leave the counter stuck
/// above zero.
pub struct CallDepthGuard<'a> {
    owner: &'a CallDepth,
    /// Set by `finish` once the guard has reported its transition so
    /// `Drop` doesn't double-decrement.
    finished: bool,
}

impl CallDepth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> u32 {
        self.depth.get()
    }

    /// Entry to any exposed op (§4.1: "every exposed op increments the
    /// counter on entry, decrements on exit").
    pub fn enter(&self) -> CallDepthGuard<'_> {
        self.depth.set(self.depth.get() + 1);
        CallDepthGuard {
            owner: self,
            finished: false,
        }
    }

    /// §4.1 "Heap growth": called before an import while at depth 1, so a
    /// collection happens at the very next top-level return rather than
    /// mid-call.
    pub fn request_collection(&self) {
        self.pending_collect.set(true);
    }

    fn leave(&self) -> bool {
        let new_depth = self.depth.get().saturating_sub(1);
        self.depth.set(new_depth);
        if new_depth == 0 && self.pending_collect.get() {
            self.pending_collect.set(false);
            return true;
        }
        false
    }
}

impl<'a> CallDepthGuard<'a> {
    /// Ends the call. Returns `true` exactly when this was the 1→0
    /// transition and a collection was pending (§4.1: "runs a full
    /// collection at that top-level boundary, never during a nested
    /// call"). The caller (the kernel) is responsible for actually
    /// invoking the guest GC; this type only tracks the bookkeeping.
    pub fn finish(mut self) -> bool {
        self.finished = true;
        self.owner.leave()
    }
}

impl<'a> Drop for CallDepthGuard<'a> {
    fn drop(&mut self) {
        if !self.finished {
            self.owner.leave();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_discipline_returns_to_zero_p6() {
        let depth = CallDepth::new();
        {
            let guard = depth.enter();
            assert_eq!(depth.depth(), 1);
            {
                let nested = depth.enter();
                assert_eq!(depth.depth(), 2);
                nested.finish();
            }
            assert_eq!(depth.depth(), 1);
            guard.finish();
        }
        assert_eq!(depth.depth(), 0);
    }

    #[test]
    fn collection_only_fires_on_one_to_zero_transition() {
        let depth = CallDepth::new();
        let outer = depth.enter();
        let inner = depth.enter();
        depth.request_collection();
        assert!(!inner.finish(), "must not collect while depth > 0");
        assert!(outer.finish(), "must collect exactly at the 1->0 edge");
    }

    #[test]
    fn early_return_via_drop_still_decrements() {
        let depth = CallDepth::new();
        {
            let _guard = depth.enter();
            assert_eq!(depth.depth(), 1);
        }
        assert_eq!(depth.depth(), 0);
    }

    #[test]
    fn no_pending_collection_reports_false() {
        let depth = CallDepth::new();
        let guard = depth.enter();
        assert!(!guard.finish());
    }
}
