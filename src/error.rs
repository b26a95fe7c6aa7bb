//! Top-level error type for the embedding kernel (§7 "Error handling
//! design"). Aggregates every sub-crate's error via `#[from]`, the way
//! `neo-vm`'s `VmError` absorbs `neo_io`/`neo_core` errors at its own
//! boundary, but kept intentionally small: most of §7's error kinds never
//! reach Rust `Result` at all — they are marshaled into exception proxies
//! or triplet tags instead (§9 "Exceptions as values"). `KernelError` is
//! reserved for the handful of failures that happen *before* there is a
//! guest exception to marshal.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KernelError {
    /// §7 "Fatal init failure": allocation failed before the VM came up.
    /// Unlike every other variant, this one means the kernel instance is
    /// unusable; there is no running interpreter left to hand a catchable
    /// exception to.
    #[error("fatal init failure: {reason}")]
    FatalInit { reason: String },

    /// §9 "Global mutable state ... forbids partial re-init": a second
    /// `init()` without an intervening teardown.
    #[error("kernel already initialized")]
    AlreadyInitialized,

    /// Any op other than `init()` called before `init()` has run.
    #[error("kernel not initialized")]
    NotInitialized,

    /// §4.1 "post_init() ... fails if proxy not ready": the host side of
    /// the proxy bridge hasn't been wired up yet.
    #[error("proxy bridge not ready for post_init")]
    ProxyBridgeNotReady,

    /// §4.1 "Heap growth ... If allocation fails, the kernel returns a
    /// catchable out-of-memory exception proxy". This variant is what the
    /// allocator reports internally; the kernel converts it to that
    /// exception proxy rather than letting it escape as a `KernelError`.
    #[error("allocation of {requested_bytes} bytes failed after a collection")]
    OutOfMemory { requested_bytes: usize },

    #[error(transparent)]
    Hardware(#[from] cpyhost_hwplane::error::HwError),

    #[error(transparent)]
    Proxy(#[from] cpyhost_proxy::ProxyError),

    #[error(transparent)]
    Repl(#[from] cpyhost_repl::ReplError),
}

pub type KernelResult<T> = Result<T, KernelError>;
