//! Bus records (I2C/SPI/UART) — §3 "Bus record".
//!
//! Unlike the pin array and clock register, bus state is not part of the
//! byte-exact region the host maps directly (§6 only publishes pointers for
//! pins and the clock). Buses are plain Rust structs behind accessor
//! functions, the way `neo-vm`'s `slot.rs` models per-kind VM state as typed
//! structs rather than raw bytes.

use crate::error::{HwError, HwResult};
use std::collections::HashMap;

/// Which kind of bus a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusKind {
    I2c,
    Spi,
    Uart,
}

impl BusKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            BusKind::I2c => "i2c",
            BusKind::Spi => "spi",
            BusKind::Uart => "uart",
        }
    }
}

/// Number of bus slots per kind. Not specified exactly in the source spec
/// ("a small fixed number"); six mirrors common CircuitPython board bring-up
/// (boards rarely wire more than a couple of each bus, but tests want
/// headroom for exhaustion behavior).
pub const BUS_SLOTS_PER_KIND: usize = 6;

/// 128-slot device register table for an I2C bus (§3).
pub type I2cDeviceTable = [u8; 128];

/// A single logged bus transaction (§3 "last transaction").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastTransaction {
    pub address: u8,
    pub write: bool,
    pub len: u16,
    /// Monotonic timestamp, in virtual clock ticks, of this transaction.
    pub timestamp: u64,
}

/// One bus slot.
#[derive(Debug, Clone)]
pub struct BusRecord {
    pub kind: BusKind,
    /// Endpoint pin numbers (SCL/SDA for I2C; CLK/MOSI/MISO for SPI;
    /// TX/RX for UART), in a fixed but kind-dependent order.
    pub endpoints: Vec<u8>,
    pub frequency: u32,
    pub locked: bool,
    pub enabled: bool,
    pub never_reset: bool,
    pub last_transaction: Option<LastTransaction>,
    /// Only populated for I2C buses.
    pub device_table: Option<Box<HashMap<u8, I2cDeviceTable>>>,
}

impl BusRecord {
    fn new(kind: BusKind, endpoints: Vec<u8>) -> Self {
        Self {
            device_table: matches!(kind, BusKind::I2c).then(|| Box::new(HashMap::new())),
            kind,
            endpoints,
            frequency: 0,
            locked: false,
            enabled: false,
            never_reset: false,
            last_transaction: None,
        }
    }

    fn reset(&mut self) {
        self.frequency = 0;
        self.locked = false;
        self.enabled = false;
        self.last_transaction = None;
        if let Some(table) = &mut self.device_table {
            table.clear();
        }
    }
}

/// Fixed-capacity bus arrays for one kind, found by endpoint tuple
/// (§3 invariant: "a bus is found by its endpoint tuple").
#[derive(Debug, Default)]
pub(crate) struct BusBank {
    slots: Vec<Option<BusRecord>>,
}

impl BusBank {
    pub(crate) fn new() -> Self {
        Self {
            slots: (0..BUS_SLOTS_PER_KIND).map(|_| None).collect(),
        }
    }

    /// Finds the slot with matching endpoints, or allocates a fresh one.
    pub(crate) fn find_or_create(
        &mut self,
        kind: BusKind,
        endpoints: &[u8],
    ) -> HwResult<usize> {
        if let Some(idx) = self
            .slots
            .iter()
            .position(|s| matches!(s, Some(r) if r.endpoints == endpoints))
        {
            return Ok(idx);
        }
        if let Some(idx) = self.slots.iter().position(|s| s.is_none()) {
            self.slots[idx] = Some(BusRecord::new(kind, endpoints.to_vec()));
            return Ok(idx);
        }
        Err(HwError::BusSlotExhausted {
            kind: kind.label(),
            capacity: BUS_SLOTS_PER_KIND,
        })
    }

    pub(crate) fn get(&self, index: usize) -> Option<&BusRecord> {
        self.slots.get(index).and_then(|s| s.as_ref())
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut BusRecord> {
        self.slots.get_mut(index).and_then(|s| s.as_mut())
    }

    /// Resets every slot that isn't `never_reset` (§4.3 "Reset semantics"),
    /// leaving slots with no live bus untouched.
    pub(crate) fn reset_all(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            if !slot.never_reset {
                slot.reset();
            }
        }
    }
}
