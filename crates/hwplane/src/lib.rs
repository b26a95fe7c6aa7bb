//! Virtual hardware plane (C3): a contiguous, fixed-layout byte region
//! describing pins, buses and the virtual clock, written by guest peripheral
//! bindings and read/written by host code without crossing the call
//! boundary. See `spec.md` §3 and §4.3.

pub mod bus;
pub mod clock;
pub mod error;
pub mod layout;
pub mod pin;

use bus::{BusBank, BusKind, BusRecord, LastTransaction, I2cDeviceTable};
use clock::{ClockAccess, ClockMode};
use error::{HwError, HwResult};
use pin::{Direction, Drive, PinAccess, PinSnapshot, Pull};

/// The virtual hardware plane: pin array + bus banks + clock register.
///
/// The pin array and clock register live in `raw`, a single contiguous
/// buffer laid out per `layout.rs`, so a host embedder can take a pointer
/// into it (`gpio_state_ptr`, `clock_hw_ptr`) and read it without a call.
/// Bus state lives alongside in ordinary Rust collections (see `bus.rs`).
pub struct HardwarePlane {
    raw: Vec<u8>,
    i2c: BusBank,
    spi: BusBank,
    uart: BusBank,
}

impl PinAccess for HardwarePlane {
    fn buf(&self) -> &[u8] {
        &self.raw
    }
    fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.raw
    }
}

impl ClockAccess for HardwarePlane {
    fn buf(&self) -> &[u8] {
        &self.raw
    }
    fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.raw
    }
}

impl HardwarePlane {
    /// Allocates and zeroes the plane (§4.1 init order: "hardware plane
    /// zeroed → virtual clock published").
    pub fn new(cpu_freq_hz: u32) -> Self {
        let mut raw = vec![0u8; layout::TOTAL_SIZE];
        raw[0..4].copy_from_slice(&layout::MAGIC);
        let mut plane = Self {
            raw,
            i2c: BusBank::new(),
            spi: BusBank::new(),
            uart: BusBank::new(),
        };
        plane.set_cpu_freq(cpu_freq_hz);
        plane.set_mode(ClockMode::Realtime);
        plane
    }

    /// Pointer to the start of the pin array, for `get_gpio_state_ptr()`.
    /// Stable for the lifetime of this `HardwarePlane` (§ "Supplemented
    /// features" #3: never reallocated after `init()`).
    pub fn gpio_state_ptr(&self) -> *const u8 {
        self.raw[layout::PIN_ARRAY_OFFSET..].as_ptr()
    }

    /// Pointer to the clock record, for `get_virtual_clock_hw_ptr()`.
    pub fn clock_hw_ptr(&self) -> *const u8 {
        self.raw[layout::CLOCK_OFFSET..].as_ptr()
    }

    // ---- Pins --------------------------------------------------------

    pub fn pin(&self, index: usize) -> Option<PinSnapshot> {
        self.pin_snapshot(index)
    }

    /// Host write to an input-only field: simulates external stimulus
    /// (§4.3 "Host writes to input-only fields ... are allowed without
    /// synchronization"). No-op if the pin isn't actually configured input,
    /// matching "interpreted as that fixed level until the host overrides".
    pub fn host_set_input_value(&mut self, pin: usize, value: bool) {
        if !Self::pin_in_range(pin) {
            return;
        }
        self.set_pin_byte(pin, layout::pin_field::VALUE, value as u8);
    }

    pub fn host_set_analog_input(&mut self, pin: usize, value: u16) {
        if !Self::pin_in_range(pin) {
            return;
        }
        self.set_analog_value(pin, value);
    }

    /// Guest-side: configure direction. Guest-owned field.
    pub fn guest_set_direction(&mut self, pin: usize, direction: Direction) {
        self.set_pin_byte(pin, layout::pin_field::DIRECTION, direction as u8);
    }

    pub fn guest_direction(&self, pin: usize) -> Direction {
        Direction::from_byte(self.pin_byte(pin, layout::pin_field::DIRECTION))
    }

    /// §3: "a pin with direction=input and pull≠none is interpreted as
    /// that fixed level until the host overrides." Applying a pull to an
    /// input pin therefore seeds the VALUE byte from the pull direction
    /// right away, rather than leaving it at whatever it defaulted or was
    /// last left at — otherwise a guest read before any host stimulus
    /// would see the pin's reset-default level instead of its pull.
    pub fn guest_set_pull(&mut self, pin: usize, pull: Pull) {
        self.set_pin_byte(pin, layout::pin_field::PULL, pull as u8);
        if self.guest_direction(pin) == Direction::Input {
            match pull {
                Pull::Up => self.set_pin_byte(pin, layout::pin_field::VALUE, 1),
                Pull::Down => self.set_pin_byte(pin, layout::pin_field::VALUE, 0),
                Pull::None => {}
            }
        }
    }

    pub fn guest_pull(&self, pin: usize) -> Pull {
        Pull::from_byte(self.pin_byte(pin, layout::pin_field::PULL))
    }

    pub fn guest_set_drive(&mut self, pin: usize, drive: Drive) {
        self.set_pin_byte(pin, layout::pin_field::DRIVE, drive as u8);
    }

    /// Guest-owned field: the logical output level.
    pub fn guest_set_output_value(&mut self, pin: usize, value: bool) {
        self.set_pin_byte(pin, layout::pin_field::VALUE, value as u8);
    }

    pub fn output_value(&self, pin: usize) -> bool {
        self.pin_byte(pin, layout::pin_field::VALUE) != 0
    }

    pub fn input_value(&self, pin: usize) -> bool {
        self.pin_byte(pin, layout::pin_field::VALUE) != 0
    }

    pub fn analog_output_value(&self, pin: usize) -> u16 {
        self.analog_value(pin)
    }

    pub fn analog_is_enabled(&self, pin: usize) -> bool {
        self.pin_flag_get(pin, layout::pin_flag::ENABLED)
    }

    pub fn analog_is_output(&self, pin: usize) -> bool {
        self.pin_flag_get(pin, layout::pin_flag::ANALOG_IS_OUTPUT)
    }

    pub fn guest_set_analog_is_output(&mut self, pin: usize, is_output: bool) {
        self.pin_flag_set(pin, layout::pin_flag::ANALOG_IS_OUTPUT, is_output);
    }

    /// Guest-owned write: the DAC output level for a pin configured as
    /// `analog_is_output` (§3 "analog_value ... output = DAC").
    pub fn guest_set_analog_output_value(&mut self, pin: usize, value: u16) {
        if !Self::pin_in_range(pin) {
            return;
        }
        self.set_analog_value(pin, value);
    }

    pub fn guest_set_enabled(&mut self, pin: usize, enabled: bool) {
        self.pin_flag_set(pin, layout::pin_flag::ENABLED, enabled);
    }

    /// §3 invariant: `claimed ⇒ enabled`.
    pub fn guest_claim(&mut self, pin: usize) {
        self.pin_flag_set(pin, layout::pin_flag::ENABLED, true);
        self.pin_flag_set(pin, layout::pin_flag::CLAIMED, true);
    }

    pub fn guest_release(&mut self, pin: usize) {
        self.pin_flag_set(pin, layout::pin_flag::CLAIMED, false);
        self.pin_flag_set(pin, layout::pin_flag::ENABLED, false);
    }

    pub fn is_claimed(&self, pin: usize) -> bool {
        self.pin_flag_get(pin, layout::pin_flag::CLAIMED)
    }

    pub fn guest_set_never_reset(&mut self, pin: usize, never_reset: bool) {
        self.pin_flag_set(pin, layout::pin_flag::NEVER_RESET, never_reset);
    }

    pub fn guest_set_capabilities(&mut self, pin: usize, caps: u8) {
        self.set_pin_byte(pin, layout::pin_field::CAPABILITIES, caps);
    }

    // ---- Clock ---------------------------------------------------------

    pub fn ticks(&self) -> u64 {
        self.ticks_32khz()
    }

    pub fn monotonic_ms(&self) -> u64 {
        ClockAccess::monotonic_ms(self)
    }

    pub fn mode(&self) -> ClockMode {
        ClockAccess::mode(self)
    }

    pub fn set_mode(&mut self, mode: ClockMode) {
        ClockAccess::set_mode(self, mode);
    }

    /// Host realtime driver tick: advances by `TICKS_PER_MS * elapsed_ms`.
    /// A no-op outside [`ClockMode::Realtime`] (§4.3).
    pub fn host_advance_realtime(&mut self, elapsed_ms: u64) {
        if self.mode() == ClockMode::Realtime {
            self.advance_ticks(elapsed_ms * clock::TICKS_PER_MS);
        }
        self.bump_host_ticks();
    }

    /// Explicit manual-mode advance, guest-initiated (§3).
    pub fn manual_advance(&mut self, ticks: u64) {
        if self.mode() == ClockMode::Manual {
            self.advance_ticks(ticks);
        }
    }

    /// Fast-forward `time.sleep()`: completes instantly by advancing by the
    /// requested duration regardless of wall clock (§4.3).
    pub fn fast_forward_sleep(&mut self, ms: u64) {
        if self.mode() == ClockMode::FastForward {
            self.advance_ticks(ms * clock::TICKS_PER_MS);
        }
    }

    pub fn yields_count(&self) -> u64 {
        ClockAccess::yields_count(self)
    }

    pub fn record_yield(&mut self) {
        self.bump_yields();
    }

    // ---- Buses -----------------------------------------------------------

    fn bank_mut(&mut self, kind: BusKind) -> &mut BusBank {
        match kind {
            BusKind::I2c => &mut self.i2c,
            BusKind::Spi => &mut self.spi,
            BusKind::Uart => &mut self.uart,
        }
    }

    fn bank(&self, kind: BusKind) -> &BusBank {
        match kind {
            BusKind::I2c => &self.i2c,
            BusKind::Spi => &self.spi,
            BusKind::Uart => &self.uart,
        }
    }

    /// Finds the bus for this endpoint tuple, constructing a fresh slot on
    /// first use (§3 invariant: "a bus is found by its endpoint tuple").
    pub fn bus_find_or_create(&mut self, kind: BusKind, endpoints: &[u8]) -> HwResult<usize> {
        self.bank_mut(kind).find_or_create(kind, endpoints)
    }

    pub fn bus(&self, kind: BusKind, index: usize) -> Option<&BusRecord> {
        self.bank(kind).get(index)
    }

    pub fn bus_mut(&mut self, kind: BusKind, index: usize) -> Option<&mut BusRecord> {
        self.bank_mut(kind).get_mut(index)
    }

    /// Advisory lock (§5 "Bus locking"): never blocks, the guest decides
    /// what to do on failure.
    pub fn bus_try_lock(&mut self, kind: BusKind, index: usize) -> HwResult<bool> {
        let capacity = bus::BUS_SLOTS_PER_KIND;
        let record = self
            .bank_mut(kind)
            .get_mut(index)
            .ok_or(HwError::BusIndexOutOfRange {
                kind: kind.label(),
                index,
                capacity,
            })?;
        if record.locked {
            return Ok(false);
        }
        record.locked = true;
        Ok(true)
    }

    pub fn bus_unlock(&mut self, kind: BusKind, index: usize) {
        if let Some(record) = self.bank_mut(kind).get_mut(index) {
            record.locked = false;
        }
    }

    /// Records a transaction and stamps it with the current clock reading
    /// (§3 invariant: "last-transaction is monotonically timestamped").
    pub fn bus_record_transaction(
        &mut self,
        kind: BusKind,
        index: usize,
        address: u8,
        write: bool,
        len: u16,
    ) {
        let timestamp = self.ticks();
        if let Some(record) = self.bank_mut(kind).get_mut(index) {
            record.last_transaction = Some(LastTransaction {
                address,
                write,
                len,
                timestamp,
            });
        }
    }

    pub fn i2c_device_get(&self, index: usize, addr: u8, register: usize) -> HwResult<u8> {
        if register >= 128 {
            return Err(HwError::RegisterOutOfRange { register });
        }
        let record = self.bank(BusKind::I2c).get(index).ok_or(HwError::BusIndexOutOfRange {
            kind: "i2c",
            index,
            capacity: bus::BUS_SLOTS_PER_KIND,
        })?;
        let table = record.device_table.as_deref();
        Ok(table
            .and_then(|t| t.get(&addr))
            .map(|regs: &I2cDeviceTable| regs[register])
            .unwrap_or(0))
    }

    pub fn i2c_device_set(
        &mut self,
        index: usize,
        addr: u8,
        register: usize,
        value: u8,
    ) -> HwResult<()> {
        if register >= 128 {
            return Err(HwError::RegisterOutOfRange { register });
        }
        let capacity = bus::BUS_SLOTS_PER_KIND;
        let record = self
            .bank_mut(BusKind::I2c)
            .get_mut(index)
            .ok_or(HwError::BusIndexOutOfRange {
                kind: "i2c",
                index,
                capacity,
            })?;
        let table = record.device_table.get_or_insert_with(|| Box::new(Default::default()));
        let regs = table.entry(addr).or_insert([0u8; 128]);
        regs[register] = value;
        Ok(())
    }

    /// Soft-reset: pins and buses with `never_reset` set are skipped; the
    /// virtual clock is never reset (§4.3, §3, invariant P5/R2).
    pub fn soft_reset(&mut self) {
        for pin in 0..layout::PIN_COUNT {
            if !self.pin_flag_get(pin, layout::pin_flag::NEVER_RESET) {
                self.reset_pin(pin);
            }
        }
        self.i2c.reset_all();
        self.spi.reset_all();
        self.uart.reset_all();
        tracing::debug!("hardware plane soft reset complete (clock preserved)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_identity_is_independent() {
        // P1: setting pin 13's direction must not affect pin 2.
        let mut hw = HardwarePlane::new(48_000_000);
        hw.guest_set_direction(13, Direction::Output);
        assert_eq!(hw.guest_direction(13), Direction::Output);
        assert_eq!(hw.guest_direction(2), Direction::Input);
    }

    #[test]
    fn pull_on_an_input_pin_seeds_its_value() {
        // §3: "a pin with direction=input and pull≠none is interpreted as
        // that fixed level until the host overrides" — the guest must see
        // this immediately, without any host write in between.
        let mut hw = HardwarePlane::new(48_000_000);
        hw.guest_set_direction(7, Direction::Input);
        hw.guest_set_pull(7, Pull::Up);
        assert!(hw.input_value(7));

        hw.guest_set_pull(7, Pull::Down);
        assert!(!hw.input_value(7));
    }

    #[test]
    fn pull_on_an_output_pin_does_not_touch_value() {
        let mut hw = HardwarePlane::new(48_000_000);
        hw.guest_set_direction(7, Direction::Output);
        hw.guest_set_output_value(7, true);
        hw.guest_set_pull(7, Pull::Down);
        assert!(hw.output_value(7), "pull must not clobber an output pin's driven value");
    }

    #[test]
    fn pin_out_of_range_is_noop() {
        // B2: pin 64 (out of range) must not corrupt pin 63 or panic.
        let mut hw = HardwarePlane::new(48_000_000);
        hw.guest_set_output_value(63, true);
        hw.host_set_input_value(64, true);
        assert!(hw.output_value(63));
        assert!(hw.pin(64).is_none());
    }

    #[test]
    fn clock_is_monotonic() {
        // P4
        let mut hw = HardwarePlane::new(48_000_000);
        let t1 = hw.ticks();
        hw.host_advance_realtime(5);
        let t2 = hw.ticks();
        assert!(t1 <= t2);
    }

    #[test]
    fn never_reset_bus_survives_soft_reset() {
        // P5
        let mut hw = HardwarePlane::new(48_000_000);
        let idx = hw.bus_find_or_create(BusKind::I2c, &[3, 4]).unwrap();
        {
            let bus = hw.bus_mut(BusKind::I2c, idx).unwrap();
            bus.never_reset = true;
            bus.enabled = true;
            bus.frequency = 400_000;
        }
        hw.bus_record_transaction(BusKind::I2c, idx, 0x42, true, 1);
        hw.soft_reset();
        let bus = hw.bus(BusKind::I2c, idx).unwrap();
        assert!(bus.enabled);
        assert_eq!(bus.frequency, 400_000);
        assert_eq!(bus.endpoints, vec![3, 4]);
    }

    #[test]
    fn soft_reset_does_not_touch_clock() {
        let mut hw = HardwarePlane::new(48_000_000);
        hw.host_advance_realtime(100);
        let before = hw.ticks();
        hw.soft_reset();
        assert_eq!(hw.ticks(), before);
    }

    #[test]
    fn reset_idempotence() {
        // R2: applying soft-reset twice == applying it once.
        let mut hw = HardwarePlane::new(48_000_000);
        hw.guest_set_direction(5, Direction::Output);
        hw.guest_set_output_value(5, true);
        hw.soft_reset();
        let snap1 = hw.pin(5).unwrap();
        hw.soft_reset();
        let snap2 = hw.pin(5).unwrap();
        assert_eq!(snap1, snap2);
    }

    #[test]
    fn bus_slot_exhaustion_is_reported() {
        let mut hw = HardwarePlane::new(48_000_000);
        for i in 0..bus::BUS_SLOTS_PER_KIND {
            hw.bus_find_or_create(BusKind::Spi, &[i as u8, i as u8 + 1])
                .unwrap();
        }
        let err = hw.bus_find_or_create(BusKind::Spi, &[200, 201]).unwrap_err();
        assert_eq!(
            err,
            HwError::BusSlotExhausted {
                kind: "spi",
                capacity: bus::BUS_SLOTS_PER_KIND
            }
        );
    }

    #[test]
    fn bus_lock_is_advisory_and_non_blocking() {
        let mut hw = HardwarePlane::new(48_000_000);
        let idx = hw.bus_find_or_create(BusKind::I2c, &[0, 1]).unwrap();
        assert!(hw.bus_try_lock(BusKind::I2c, idx).unwrap());
        assert!(!hw.bus_try_lock(BusKind::I2c, idx).unwrap());
        hw.bus_unlock(BusKind::I2c, idx);
        assert!(hw.bus_try_lock(BusKind::I2c, idx).unwrap());
    }

    #[test]
    fn i2c_device_register_round_trip() {
        let mut hw = HardwarePlane::new(48_000_000);
        let idx = hw.bus_find_or_create(BusKind::I2c, &[0, 1]).unwrap();
        hw.i2c_device_set(idx, 0x68, 10, 200).unwrap();
        assert_eq!(hw.i2c_device_get(idx, 0x68, 10).unwrap(), 200);
        assert_eq!(hw.i2c_device_get(idx, 0x68, 11).unwrap(), 0);
        assert!(matches!(
            hw.i2c_device_set(idx, 0x68, 128, 1),
            Err(HwError::RegisterOutOfRange { register: 128 })
        ));
    }
}
