//! The logical bus contract shared by the hardware SPI driver and the
//! remote passthrough client.

use crate::Result;

/// Register addresses are 7 bits wide on every layer of the stack.
pub(crate) const ADDRESS_MASK: u8 = 0x7F;

/// Set on the address byte to request a register read.
pub(crate) const READ_FLAG: u8 = 0x80;

/// One category's share of the transfer statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OpCounters {
    /// Completed commands.
    pub commands: u64,
    /// SPI payload bytes moved, address byte included.
    pub bytes: u64,
    /// Failed calls, contract violations included.
    pub errors: u64,
}

impl OpCounters {
    pub(crate) fn record(&mut self, bytes: usize) {
        self.commands += 1;
        self.bytes += bytes as u64;
    }

    pub(crate) fn record_error(&mut self) {
        self.errors += 1;
    }
}

/// Monotone transfer statistics kept by every bus implementation.
///
/// A successful call increments `commands` and `bytes` of its category;
/// any failed call increments `errors` instead. Totals only grow, in
/// whatever order the calls happen, and reset only when the bus is
/// recreated.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BusCounters {
    /// Single register writes.
    pub write: OpCounters,
    /// Burst writes.
    pub burst_write: OpCounters,
    /// Register reads.
    pub read: OpCounters,
}

/// Register-level bus to one or more YMF825 chips.
///
/// Implemented by the hardware SPI driver ([`SpiBus`]) and by the remote
/// passthrough client ([`StreamBus`]). Register-level consumers such as
/// [`Ymf825Driver`] are written against this trait only, so they run
/// unchanged over local hardware or a remote bridge.
///
/// [`SpiBus`]: crate::SpiBus
/// [`StreamBus`]: crate::StreamBus
/// [`Ymf825Driver`]: crate::Ymf825Driver
pub trait Ymf825Bus {
    /// Write one register on every selected chip.
    ///
    /// The top address bit is reserved for the read flag and is cleared.
    fn write(&mut self, address: u8, data: u8) -> Result<()>;

    /// Write a run of bytes to one register address.
    ///
    /// The bytes are clocked out back to back within a single chip-select
    /// assertion. Empty runs are rejected.
    fn burst_write(&mut self, address: u8, data: &[u8]) -> Result<()>;

    /// Read one register from the single selected chip.
    ///
    /// Requires exactly one chip-select line to be targeted; a read with
    /// several chips driving the data line would be meaningless.
    fn read(&mut self, address: u8) -> Result<u8>;

    /// Choose which chip-select lines subsequent transfers assert.
    ///
    /// `0` deselects everything; transfers fail until a target is chosen
    /// again. Bits outside the configured chip-select pin set are rejected.
    fn set_target(&mut self, mask: u8) -> Result<()>;

    /// Pulse the hardware reset line shared by all attached chips.
    ///
    /// Independent of the current chip-select state.
    fn reset_hardware(&mut self) -> Result<()>;

    /// Snapshot of the transfer statistics.
    fn counters(&self) -> BusCounters;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_totals_are_order_independent() {
        let mut a = BusCounters::default();
        a.write.record(2);
        a.read.record_error();
        a.write.record(2);
        a.burst_write.record(4);

        let mut b = BusCounters::default();
        b.burst_write.record(4);
        b.write.record(2);
        b.write.record(2);
        b.read.record_error();

        assert_eq!(a, b);
        assert_eq!(a.write.commands, 2);
        assert_eq!(a.write.bytes, 4);
        assert_eq!(a.read.errors, 1);
    }
}
