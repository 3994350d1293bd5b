//! MPSSE SPI bus driver for the YMF825's serial interface.

use std::{
    marker::PhantomData,
    time::{Duration, Instant},
};

use crate::{
    buffer::TransferBuffers,
    bus::{BusCounters, Ymf825Bus, ADDRESS_MASK, READ_FLAG},
    device::{BitMode, Device, MpssePort, Purge},
    mpsse,
    util::PhantomUnsync,
    Result, Ymf825Error,
};

/// Largest burst payload a single MPSSE data phase can carry, in bytes.
///
/// The phase length is a 16-bit count-minus-one field covering the address
/// byte plus the payload, so the payload itself tops out one short of the
/// field's range. The serial passthrough protocol has its own, much
/// smaller bound ([`wire::MAX_BURST_LEN`]).
///
/// [`wire::MAX_BURST_LEN`]: crate::wire::MAX_BURST_LEN
pub const MAX_BURST_LEN: usize = 65_535;

const SETTLE: Duration = Duration::from_millis(10);
const STABILIZE: Duration = Duration::from_millis(50);
const RESET_PULSE: Duration = Duration::from_millis(2);

const SETUP_FRAME_LEN: usize = 12;
const WRITE_FRAME_LEN: usize = 12;
const READ_FRAME_LEN: usize = 12;
const RESET_FRAME_LEN: usize = 4;
/// Select, opcode + length, address, deselect, and the flush marker.
const BURST_OVERHEAD: usize = 11;

/// Construction-time settings for [`SpiBus`].
#[derive(Debug, Clone)]
pub struct SpiConfig {
    /// ADBUS bits wired to chip-select lines. Must be non-zero.
    pub cs_pins: u8,
    /// Select polarity: `true` if a selected chip sees its line driven high.
    pub cs_active_high: bool,
    /// Raw TCK divisor value; SPI clock = 60 MHz / ((1 + divisor) * 2).
    pub divisor: u16,
    /// Driver-side read timeout, in milliseconds.
    pub read_timeout_ms: u32,
    /// Driver-side write timeout, in milliseconds.
    pub write_timeout_ms: u32,
    /// USB latency timer, in milliseconds.
    pub latency_timer_ms: u8,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            cs_pins: 0x08,
            cs_active_high: false,
            divisor: mpsse::DEFAULT_DIVISOR,
            read_timeout_ms: 1000,
            write_timeout_ms: 1000,
            latency_timer_ms: 2,
        }
    }
}

/// SPI bus driver over one MPSSE-capable bridge.
///
/// Owns the port and the staging buffers; all transfers are built as MPSSE
/// command frames around the configured chip-select lines and pushed
/// through the port synchronously. The driver is strictly single-threaded:
/// the type is `!Sync`, every call blocks for the full USB round trip, and
/// a failed call makes no attempt to roll back pin state (the next
/// transfer re-establishes it).
///
/// Transfers require a target selected via [`set_target`]; construction
/// leaves everything deselected.
///
/// # Example
///
/// ```no_run
/// use ymf825::{SpiBus, SpiConfig, Ymf825Bus};
///
/// let config = SpiConfig {
///     cs_pins: 0x08,
///     ..SpiConfig::default()
/// };
/// let mut bus = SpiBus::open(0, &config).unwrap();
/// bus.set_target(0x08).unwrap();
/// bus.write(0x00, 0x01).unwrap();
/// ```
///
/// [`set_target`]: Ymf825Bus::set_target
#[derive(Debug)]
pub struct SpiBus<P: MpssePort = Device> {
    // Declaration order is drop order: the device handle goes before the
    // staging buffers.
    port: P,
    buffers: TransferBuffers,
    cs_pins: u8,
    cs_active_high: bool,
    target: u8,
    counters: BusCounters,
    _unsync: PhantomUnsync,
}

impl SpiBus<Device> {
    /// Open the device at `index` and bring its MPSSE engine up, ready for
    /// transfers.
    pub fn open(index: u32, config: &SpiConfig) -> Result<Self> {
        Self::with_port(Device::open(index)?, config)
    }
}

impl<P: MpssePort> SpiBus<P> {
    /// Initialize a bus over an already-open port.
    ///
    /// Initialization runs exactly once, here. If any step fails the port
    /// is dropped and no bus is handed out; there is no re-init path.
    pub fn with_port(port: P, config: &SpiConfig) -> Result<Self> {
        if config.cs_pins == 0 {
            return Err(Ymf825Error::InvalidParameter);
        }
        let mut bus = Self {
            port,
            buffers: TransferBuffers::new(),
            cs_pins: config.cs_pins,
            cs_active_high: config.cs_active_high,
            target: 0,
            counters: BusCounters::default(),
            _unsync: PhantomData,
        };
        bus.init(config)?;
        Ok(bus)
    }

    /// The underlying port.
    #[must_use]
    pub fn port(&self) -> &P {
        &self.port
    }

    /// The configured chip-select pin mask.
    #[must_use]
    pub fn cs_pins(&self) -> u8 {
        self.cs_pins
    }

    /// The currently targeted chip-select lines.
    #[must_use]
    pub fn target(&self) -> u8 {
        self.target
    }

    /// Read one register, giving up after `timeout` if the response bytes
    /// never arrive.
    ///
    /// [`read`] is this with no deadline: it polls the receive queue
    /// indefinitely, which matches the bridge's usual sub-millisecond
    /// turnaround but knowingly trades liveness for it. Pass a deadline
    /// when the hardware is not trusted to answer.
    ///
    /// [`read`]: Ymf825Bus::read
    pub fn read_with_timeout(&mut self, address: u8, timeout: Option<Duration>) -> Result<u8> {
        match self.transfer_read(address, timeout) {
            Ok(value) => {
                self.counters.read.record(2);
                Ok(value)
            }
            Err(e) => {
                self.counters.read.record_error();
                Err(e)
            }
        }
    }

    fn init(&mut self, config: &SpiConfig) -> Result<()> {
        log::debug!(
            "bringing up MPSSE: divisor {}, cs_pins {:#04x}, active_high {}",
            config.divisor,
            config.cs_pins,
            config.cs_active_high
        );
        self.port.purge(Purge::All)?;
        self.port.delay(SETTLE);
        self.port
            .set_timeouts(config.read_timeout_ms, config.write_timeout_ms)?;
        self.port.set_latency_timer(config.latency_timer_ms)?;
        self.port.set_bit_mode(0x00, BitMode::Reset)?;
        self.port.set_bit_mode(0x00, BitMode::Mpsse)?;
        self.port.purge(Purge::Rx)?;
        self.port.delay(SETTLE);

        let [div_lo, div_hi] = config.divisor.to_le_bytes();
        let frame = self.buffers.begin_frame(SETUP_FRAME_LEN);
        frame.extend_from_slice(&[
            mpsse::TCK_DIVISOR,
            div_lo,
            div_hi,
            mpsse::SET_BITS_LOW,
            0x00,
            mpsse::CS_DIRECTION,
            mpsse::SET_BITS_HIGH,
            0xFF,
            mpsse::AUX_DIRECTION,
            mpsse::SEND_IMMEDIATE,
            mpsse::LOOPBACK_END,
            mpsse::DIS_DIV_5,
        ]);
        // The setup frame carries its flush marker mid-frame and goes out
        // in one transfer; the split write is for transaction frames.
        let frame = self.buffers.frame();
        if self.port.raw_write(frame)? != frame.len() {
            return Err(Ymf825Error::WriteFault);
        }
        self.port.delay(STABILIZE);
        Ok(())
    }

    fn require_target(&self) -> Result<()> {
        if self.target == 0 {
            return Err(Ymf825Error::InvalidOperation("no target selected"));
        }
        Ok(())
    }

    fn cs_assert_value(&self) -> u8 {
        if self.cs_active_high {
            self.cs_pins & self.target
        } else {
            self.cs_pins ^ self.target
        }
    }

    fn cs_deassert_value(&self) -> u8 {
        if self.cs_active_high {
            0x00
        } else {
            self.cs_pins
        }
    }

    /// Send the assembled frame: everything except the trailing marker
    /// first, then the marker byte as its own transfer, which makes the
    /// bridge flush its command queue immediately.
    fn send_frame(&mut self) -> Result<()> {
        let frame = self.buffers.frame();
        let (body, marker) = frame.split_at(frame.len() - 1);
        if self.port.raw_write(body)? != body.len() {
            return Err(Ymf825Error::WriteFault);
        }
        if self.port.raw_write(marker)? != marker.len() {
            return Err(Ymf825Error::WriteFault);
        }
        log::trace!("sent {}-byte frame", frame.len());
        Ok(())
    }

    fn transfer_write(&mut self, address: u8, data: u8) -> Result<()> {
        self.require_target()?;
        let assert = self.cs_assert_value();
        let deassert = self.cs_deassert_value();

        let frame = self.buffers.begin_frame(WRITE_FRAME_LEN);
        push_gpio_low(frame, assert);
        frame.extend_from_slice(&[
            mpsse::SPI_BYTE_OUT,
            0x01,
            0x00,
            address & ADDRESS_MASK,
            data,
        ]);
        push_gpio_low(frame, deassert);
        frame.push(mpsse::SEND_IMMEDIATE);
        self.send_frame()
    }

    fn transfer_burst_write(&mut self, address: u8, data: &[u8]) -> Result<()> {
        self.require_target()?;
        if data.is_empty() {
            return Err(Ymf825Error::InvalidParameter);
        }
        // Count-minus-one over address plus payload is exactly the payload
        // length; the conversion doubles as the upper bound check.
        let len = u16::try_from(data.len()).map_err(|_| Ymf825Error::InvalidParameter)?;
        let assert = self.cs_assert_value();
        let deassert = self.cs_deassert_value();

        let [len_lo, len_hi] = len.to_le_bytes();
        let frame = self.buffers.begin_frame(data.len() + BURST_OVERHEAD);
        push_gpio_low(frame, assert);
        frame.extend_from_slice(&[mpsse::SPI_BYTE_OUT, len_lo, len_hi, address & ADDRESS_MASK]);
        frame.extend_from_slice(data);
        push_gpio_low(frame, deassert);
        frame.push(mpsse::SEND_IMMEDIATE);
        self.send_frame()
    }

    fn transfer_read(&mut self, address: u8, timeout: Option<Duration>) -> Result<u8> {
        self.require_target()?;
        if self.target.count_ones() != 1 {
            return Err(Ymf825Error::InvalidOperation(
                "multiple targets selected for read",
            ));
        }
        let assert = self.cs_assert_value();
        let deassert = self.cs_deassert_value();

        let frame = self.buffers.begin_frame(READ_FRAME_LEN);
        push_gpio_low(frame, assert);
        frame.extend_from_slice(&[
            mpsse::SPI_BYTE_IO,
            0x01,
            0x00,
            address | READ_FLAG,
            0x00,
        ]);
        push_gpio_low(frame, deassert);
        frame.push(mpsse::SEND_IMMEDIATE);
        self.send_frame()?;

        self.wait_for_response(2, timeout)?;
        let window = self.buffers.read_slice(2);
        if self.port.raw_read(window)? != 2 {
            return Err(Ymf825Error::IoError);
        }
        // The first byte is the full-duplex filler clocked in alongside
        // the address; the register value follows it.
        Ok(window[1])
    }

    fn wait_for_response(&mut self, wanted: usize, timeout: Option<Duration>) -> Result<()> {
        let deadline = timeout.map(|t| Instant::now() + t);
        // Busy-poll; the queue fills within a few latency-timer periods.
        loop {
            if self.port.queued_bytes()? >= wanted {
                return Ok(());
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(Ymf825Error::Timeout);
                }
            }
        }
    }

    fn pulse_reset(&mut self) -> Result<()> {
        // RST is wired to the upper GPIO byte, so the chip-select lines on
        // the lower byte are untouched no matter what is selected.
        for (i, level) in [0x00, 0xFF, 0x00, 0xFF].into_iter().enumerate() {
            if i != 0 {
                self.port.delay(RESET_PULSE);
            }
            let frame = self.buffers.begin_frame(RESET_FRAME_LEN);
            frame.extend_from_slice(&[mpsse::SET_BITS_HIGH, level, mpsse::AUX_DIRECTION]);
            frame.push(mpsse::SEND_IMMEDIATE);
            self.send_frame()?;
        }
        Ok(())
    }
}

impl<P: MpssePort> Ymf825Bus for SpiBus<P> {
    fn write(&mut self, address: u8, data: u8) -> Result<()> {
        match self.transfer_write(address, data) {
            Ok(()) => {
                self.counters.write.record(2);
                Ok(())
            }
            Err(e) => {
                self.counters.write.record_error();
                Err(e)
            }
        }
    }

    fn burst_write(&mut self, address: u8, data: &[u8]) -> Result<()> {
        match self.transfer_burst_write(address, data) {
            Ok(()) => {
                self.counters.burst_write.record(1 + data.len());
                Ok(())
            }
            Err(e) => {
                self.counters.burst_write.record_error();
                Err(e)
            }
        }
    }

    fn read(&mut self, address: u8) -> Result<u8> {
        self.read_with_timeout(address, None)
    }

    fn set_target(&mut self, mask: u8) -> Result<()> {
        if mask & !self.cs_pins != 0 {
            return Err(Ymf825Error::InvalidParameter);
        }
        self.target = mask;
        Ok(())
    }

    fn reset_hardware(&mut self) -> Result<()> {
        self.pulse_reset()
    }

    fn counters(&self) -> BusCounters {
        self.counters
    }
}

fn push_gpio_low(frame: &mut Vec<u8>, value: u8) {
    frame.extend_from_slice(&[mpsse::SET_BITS_LOW, value, mpsse::CS_DIRECTION]);
}
