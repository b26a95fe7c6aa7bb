//! The wall clock the kernel hands to `VmHook::on_hook_fired` (§4.4). Same
//! `cfg(target_arch)` split as `logging.rs`: native builds and tests get
//! `cpyhost_scheduler::MonotonicClock`, `wasm32` gets one backed by
//! `js_sys::Date::now()` since `std::time::Instant` has no source there.

use cpyhost_scheduler::clock_source::WallClock;

#[cfg(target_arch = "wasm32")]
struct JsDateClock;

#[cfg(target_arch = "wasm32")]
impl WallClock for JsDateClock {
    fn now_ms(&self) -> u64 {
        js_sys::Date::now() as u64
    }
}

#[cfg(target_arch = "wasm32")]
pub fn platform_clock() -> Box<dyn WallClock> {
    Box::new(JsDateClock)
}

#[cfg(not(target_arch = "wasm32"))]
pub fn platform_clock() -> Box<dyn WallClock> {
    Box::new(cpyhost_scheduler::MonotonicClock::new())
}
