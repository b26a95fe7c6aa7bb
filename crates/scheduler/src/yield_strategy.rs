//! Which of the three cooperative-yield mechanisms (§4.4) this build uses.
//!
//! Exactly one is meant to be compiled in; the host-facing API is identical
//! regardless of which (§4.4: "the host API does not change"). The source
//! repository's own history shows measured instability on the stack-unwind
//! path (§9 Open Questions), but it also preserves full interpreter state
//! (loop iterators, generators, nested loops) where the exception-based
//! strategy loses it. We pick stack-unwind as the default because losing
//! generator state on every yield would make `time.sleep()` inside a
//! generator silently corrupt guest programs — a worse failure mode than
//! the occasional instability on deep call chains. This is the Open
//! Question decision recorded in `DESIGN.md`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldStrategy {
    /// The VM hook never asks for a yield; long guest loops block the host.
    None,
    /// A pre-pass instruments loop bodies to raise a sentinel exception;
    /// the host catches it, yields, and re-enters. Loses loop/generator
    /// state across the yield.
    Exception,
    /// The hook calls a host-provided `sleep(0)` that unwinds the call
    /// stack and later rewinds it, preserving full interpreter state.
    StackUnwind,
}

/// Returns the strategy this build was compiled with. A plain runtime
/// query — no ABI change — so host tooling and tests can assert which
/// variant shipped (`SPEC_FULL.md`, supplemented feature #6).
pub const fn active_strategy() -> YieldStrategy {
    #[cfg(feature = "yield-none")]
    {
        YieldStrategy::None
    }
    #[cfg(all(feature = "yield-exception", not(feature = "yield-none")))]
    {
        YieldStrategy::Exception
    }
    #[cfg(all(
        feature = "yield-stack-unwind",
        not(feature = "yield-none"),
        not(feature = "yield-exception")
    ))]
    {
        YieldStrategy::StackUnwind
    }
    #[cfg(not(any(
        feature = "yield-none",
        feature = "yield-exception",
        feature = "yield-stack-unwind"
    )))]
    {
        YieldStrategy::StackUnwind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_build_documents_its_strategy() {
        // Whatever it resolves to, it must be a concrete choice, not an
        // unconfigured state — the host API is the same either way, but a
        // build must be able to say which one it is.
        let strategy = active_strategy();
        assert!(matches!(
            strategy,
            YieldStrategy::None | YieldStrategy::Exception | YieldStrategy::StackUnwind
        ));
    }
}
