//! Fixed byte-offsets for the parts of the hardware plane that a host maps
//! directly without crossing the call boundary (§6 "Memory layout of the
//! virtual-hardware plane").
//!
//! Bus state is *not* laid out here: the external interface table in
//! `spec.md` §6 only exposes raw pointers for the pin array and the clock
//! register, so buses are kept as ordinary (safe) Rust structs behind
//! accessor functions instead of a byte-exact region.

/// Four-byte magic identifying the layout version, at offset 0.
pub const MAGIC: [u8; 4] = *b"CPH1";

/// Number of addressable pins (§3 "up to 64").
pub const PIN_COUNT: usize = 64;

/// Size in bytes of a single pin record (§6: "each >= 8 bytes").
pub const PIN_RECORD_SIZE: usize = 8;

/// Offset of the pin array, directly after the magic.
pub const PIN_ARRAY_OFFSET: usize = MAGIC.len();

/// Offset of a given pin's record within the pin array.
pub const fn pin_offset(pin: usize) -> usize {
    PIN_ARRAY_OFFSET + pin * PIN_RECORD_SIZE
}

/// Byte offsets within a single pin record.
pub mod pin_field {
    pub const VALUE: usize = 0;
    pub const DIRECTION: usize = 1;
    pub const PULL: usize = 2;
    pub const DRIVE: usize = 3;
    pub const FLAGS: usize = 4;
    pub const CAPABILITIES: usize = 5;
    pub const ANALOG_VALUE: usize = 6; // u16 LE, 2 bytes
}

/// Bit positions within [`pin_field::FLAGS`].
pub mod pin_flag {
    pub const ENABLED: u8 = 1 << 0;
    pub const CLAIMED: u8 = 1 << 1;
    pub const NEVER_RESET: u8 = 1 << 2;
    pub const ANALOG_IS_OUTPUT: u8 = 1 << 3;
}

/// End of the pin array / start of the clock record.
pub const CLOCK_OFFSET: usize = pin_offset(PIN_COUNT);

/// Size in bytes of the virtual clock record (§6: "32 bytes total").
pub const CLOCK_SIZE: usize = 32;

/// Byte offsets within the clock record.
pub mod clock_field {
    pub const TICKS_32KHZ: usize = 0; // u64 LE
    pub const CPU_FREQ: usize = 8; // u32 LE
    pub const MODE: usize = 12; // u8
    // 13..16 reserved
    pub const YIELDS: usize = 16; // u64 LE
    pub const HOST_TICKS: usize = 24; // u64 LE
}

/// Total size of the raw hardware-plane buffer.
pub const TOTAL_SIZE: usize = CLOCK_OFFSET + CLOCK_SIZE;
