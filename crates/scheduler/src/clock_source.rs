//! Abstraction over "what time is it", so the VM hook's yield-timing logic
//! doesn't need to know whether it's running under `wasm32` (where the
//! kernel supplies `js_sys::Date::now()`) or a native test harness.

/// A monotonic-enough wall clock, in milliseconds.
pub trait WallClock: Send {
    fn now_ms(&self) -> u64;
}

/// Host-agnostic clock backed by `std::time::Instant`, used by native unit
/// tests and any non-wasm host embedding.
pub struct MonotonicClock {
    origin: std::time::Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// A clock a test can drive by hand, for deterministic yield-timing tests
/// (§8 P7).
#[derive(Default)]
pub struct FakeClock {
    now: std::cell::Cell<u64>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            now: std::cell::Cell::new(0),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl WallClock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}
