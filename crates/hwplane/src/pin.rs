//! Pin record accessors over the raw hardware-plane buffer (§3 "Pin record").

use crate::layout::{pin_field, pin_flag, pin_offset, PIN_COUNT, PIN_RECORD_SIZE};

/// Logical direction of a GPIO pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input = 0,
    Output = 1,
}

impl Direction {
    pub(crate) fn from_byte(b: u8) -> Self {
        if b == 1 {
            Direction::Output
        } else {
            Direction::Input
        }
    }
}

/// Pull configuration of an input pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    None = 0,
    Up = 1,
    Down = 2,
}

impl Pull {
    pub(crate) fn from_byte(b: u8) -> Self {
        match b {
            1 => Pull::Up,
            2 => Pull::Down,
            _ => Pull::None,
        }
    }
}

/// Output drive mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    PushPull = 0,
    OpenDrain = 1,
}

impl Drive {
    fn from_byte(b: u8) -> Self {
        if b == 1 {
            Drive::OpenDrain
        } else {
            Drive::PushPull
        }
    }
}

/// A read-only snapshot of one pin record, for host-side inspection and
/// test assertions. The live state lives in the raw buffer; this is a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinSnapshot {
    pub index: usize,
    pub value: bool,
    pub direction: Direction,
    pub pull: Pull,
    pub drive: Drive,
    pub enabled: bool,
    pub claimed: bool,
    pub never_reset: bool,
    pub capabilities: u8,
    pub analog_value: u16,
    pub analog_is_output: bool,
}

/// Accessors mixed into [`crate::HardwarePlane`]. Kept in a trait so the
/// pin-specific logic reads as one unit, the way `neo-vm`'s `slot.rs`
/// isolates per-kind accessors from the surrounding engine.
pub(crate) trait PinAccess {
    fn buf(&self) -> &[u8];
    fn buf_mut(&mut self) -> &mut [u8];

    fn pin_in_range(pin: usize) -> bool {
        pin < PIN_COUNT
    }

    fn pin_snapshot(&self, pin: usize) -> Option<PinSnapshot> {
        if !Self::pin_in_range(pin) {
            return None;
        }
        let rec = &self.buf()[pin_offset(pin)..pin_offset(pin) + PIN_RECORD_SIZE];
        let flags = rec[pin_field::FLAGS];
        Some(PinSnapshot {
            index: pin,
            value: rec[pin_field::VALUE] != 0,
            direction: Direction::from_byte(rec[pin_field::DIRECTION]),
            pull: Pull::from_byte(rec[pin_field::PULL]),
            drive: Drive::from_byte(rec[pin_field::DRIVE]),
            enabled: flags & pin_flag::ENABLED != 0,
            claimed: flags & pin_flag::CLAIMED != 0,
            never_reset: flags & pin_flag::NEVER_RESET != 0,
            capabilities: rec[pin_field::CAPABILITIES],
            analog_value: u16::from_le_bytes([
                rec[pin_field::ANALOG_VALUE],
                rec[pin_field::ANALOG_VALUE + 1],
            ]),
            analog_is_output: flags & pin_flag::ANALOG_IS_OUTPUT != 0,
        })
    }

    fn set_pin_byte(&mut self, pin: usize, field: usize, value: u8) {
        if !Self::pin_in_range(pin) {
            return;
        }
        let off = pin_offset(pin) + field;
        self.buf_mut()[off] = value;
    }

    fn pin_byte(&self, pin: usize, field: usize) -> u8 {
        if !Self::pin_in_range(pin) {
            return 0;
        }
        self.buf()[pin_offset(pin) + field]
    }

    fn pin_flag_set(&mut self, pin: usize, flag: u8, on: bool) {
        if !Self::pin_in_range(pin) {
            return;
        }
        let off = pin_offset(pin) + pin_field::FLAGS;
        let cur = self.buf()[off];
        self.buf_mut()[off] = if on { cur | flag } else { cur & !flag };
    }

    fn pin_flag_get(&self, pin: usize, flag: u8) -> bool {
        self.pin_byte(pin, pin_field::FLAGS) & flag != 0
    }

    fn set_analog_value(&mut self, pin: usize, value: u16) {
        if !Self::pin_in_range(pin) {
            return;
        }
        let off = pin_offset(pin) + pin_field::ANALOG_VALUE;
        let bytes = value.to_le_bytes();
        self.buf_mut()[off] = bytes[0];
        self.buf_mut()[off + 1] = bytes[1];
    }

    fn analog_value(&self, pin: usize) -> u16 {
        if !Self::pin_in_range(pin) {
            return 0;
        }
        let off = pin_offset(pin) + pin_field::ANALOG_VALUE;
        u16::from_le_bytes([self.buf()[off], self.buf()[off + 1]])
    }

    /// Resets a single pin record to its power-on defaults (§4.3 "Reset
    /// semantics"): input, pull=none, not claimed, not locked, not enabled.
    /// `never_reset` and `enabled`/`claimed` bookkeeping is handled by the
    /// caller, which decides whether to skip this pin entirely.
    fn reset_pin(&mut self, pin: usize) {
        if !Self::pin_in_range(pin) {
            return;
        }
        let base = pin_offset(pin);
        let buf = self.buf_mut();
        buf[base + pin_field::VALUE] = 0;
        buf[base + pin_field::DIRECTION] = Direction::Input as u8;
        buf[base + pin_field::PULL] = Pull::None as u8;
        buf[base + pin_field::DRIVE] = Drive::PushPull as u8;
        buf[base + pin_field::FLAGS] = 0;
        buf[base + pin_field::ANALOG_VALUE] = 0;
        buf[base + pin_field::ANALOG_VALUE + 1] = 0;
        // capabilities is a fixed property of the board wiring, not reset.
    }
}
