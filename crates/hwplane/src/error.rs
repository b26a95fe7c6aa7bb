//! Error types for the virtual hardware plane.

use thiserror::Error;

/// Errors surfaced by [`crate::HardwarePlane`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HwError {
    /// A bus kind has no free slot left to host a new endpoint combination.
    #[error("no free {kind} bus slot (all {capacity} slots in use)")]
    BusSlotExhausted {
        /// The bus kind (`"i2c"`, `"spi"`, `"uart"`).
        kind: &'static str,
        /// The fixed number of slots configured for that kind.
        capacity: usize,
    },

    /// A bus index was out of range for its kind.
    #[error("bus index {index} out of range for {kind} (capacity {capacity})")]
    BusIndexOutOfRange {
        kind: &'static str,
        index: usize,
        capacity: usize,
    },

    /// An I2C device register index was out of range (table is 128 slots).
    #[error("i2c device register {register} out of range (0..128)")]
    RegisterOutOfRange { register: usize },

    /// A bus is already locked by another writer.
    #[error("bus already locked")]
    AlreadyLocked,
}

pub type HwResult<T> = Result<T, HwError>;
