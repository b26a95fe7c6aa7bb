//! Structured logging install, modeled on `neo-node`'s `init_tracing`
//! (`crates/node/src/main.rs`) but trimmed to what an embedded library —
//! rather than a long-running node process — needs: an `EnvFilter` and a
//! single writer, installed at most once per process.
//!
//! On `wasm32` there is no environment to read `RUST_LOG` from and no
//! stderr to write to; tracing events still flow through the library's
//! `tracing` calls, but installing a subscriber there is the host's job
//! (e.g. via its own `tracing-wasm` layer), so [`install`] is a no-op on
//! that target.

use once_cell::sync::OnceCell;

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Installs a global `tracing` subscriber exactly once. Safe to call from
/// every `init()` — including a second `init()` after a failed first one
/// — without double-installing or panicking (`neo-node` guards the same
/// way with a `LoggingHandles` it only builds once per process).
pub fn install(verbose: bool) {
    INSTALLED.get_or_init(|| {
        install_platform(verbose);
    });
}

#[cfg(not(target_arch = "wasm32"))]
fn install_platform(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{default_level},cpyhost=trace")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(target_arch = "wasm32")]
fn install_platform(_verbose: bool) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_is_idempotent() {
        install(false);
        install(true); // must not panic on a second call
    }
}
