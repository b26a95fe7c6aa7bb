//! Exception marshaling (§4.5 "On any raised exception, marshal the
//! exception object, not a message"; §9 "Exceptions as values").
//!
//! Modeled on `neo-vm`'s `catchable_exception.rs` / `exception_handling.rs`
//! split between "this can be caught by guest code" and "this aborts the
//! host call", generalized to the embedding boundary: every guest-raised
//! exception becomes a proxy id with the output triplet's exception flag
//! set; nothing here ever becomes a host-language exception or panic.

use cpyhost_proxy::ProxyKind;

/// A guest exception, already registered in the guest-held proxy table.
/// Carries just enough to answer `lookup_attr(id, "type_name")`-style
/// queries without a second cross-boundary round trip for the common case
/// (§8 S6: "the proxied object's type name ... is ZeroDivisionError").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub proxy_id: u32,
    pub type_name: String,
    pub message: String,
}

impl ExceptionInfo {
    pub fn new(proxy_id: u32, type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            proxy_id,
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ProxyKind {
        ProxyKind::GuestHeld
    }
}

/// The well-known exception types the scheduler and kernel need to
/// recognize by name rather than by proxy lookup (cooperative cancellation,
/// out-of-memory, soft reset triggers).
pub mod well_known {
    pub const KEYBOARD_INTERRUPT: &str = "KeyboardInterrupt";
    pub const MEMORY_ERROR: &str = "MemoryError";
    pub const IMPORT_ERROR: &str = "ImportError";
    pub const ZERO_DIVISION_ERROR: &str = "ZeroDivisionError";
    pub const SYSTEM_EXIT: &str = "SystemExit";
}

/// §7 "Propagation policy": a handful of conditions are host-process
/// aborts, never guest exceptions. Kept as a predicate over the type name
/// so the kernel can assert it hasn't been asked to wrap one of these in a
/// catchable proxy by mistake.
pub fn is_host_fatal(type_name: &str) -> bool {
    matches!(
        type_name,
        "HeapCorruption" | "VmInvariantFailure" | "UnrecoverableSafeMode"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_division_round_trips_type_name() {
        // S6
        let info = ExceptionInfo::new(7, well_known::ZERO_DIVISION_ERROR, "division by zero");
        assert_eq!(info.type_name, "ZeroDivisionError");
    }

    #[test]
    fn host_fatal_conditions_are_not_guest_exceptions() {
        assert!(is_host_fatal("HeapCorruption"));
        assert!(!is_host_fatal(well_known::ZERO_DIVISION_ERROR));
    }
}
