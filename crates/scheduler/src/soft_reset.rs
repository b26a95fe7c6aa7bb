//! Soft-reset lifecycle (§4.3 "Reset semantics", §4.4 "Soft reset").
//!
//! The reset routine itself lives on `HardwarePlane::soft_reset`; this
//! module only tracks *why* a reset happened and what should run next, so
//! the kernel can decide whether to re-enter the REPL or re-run an autorun
//! script without re-deriving that decision itself.

/// What triggered the soft reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftResetCause {
    /// A guest exception type the interpreter maps to a reset request.
    GuestRequested,
    /// An explicit host-initiated API call.
    HostRequested,
}

/// What the kernel should do once the hardware plane has been reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostResetAction {
    ReenterRepl,
    RerunAutorun,
}

pub fn post_reset_action(autorun_configured: bool) -> PostResetAction {
    if autorun_configured {
        PostResetAction::RerunAutorun
    } else {
        PostResetAction::ReenterRepl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autorun_takes_priority_over_repl() {
        assert_eq!(post_reset_action(true), PostResetAction::RerunAutorun);
        assert_eq!(post_reset_action(false), PostResetAction::ReenterRepl);
    }
}
