//! Future Technology Devices International (FTDI) produces multi-protocol USB bridge
//! chips (e.g. FT232H and FT2232H) whose MPSSE engine can emulate SPI and drive GPIO
//! lines from byte commands. FTDI provides a proprietary driver for these chips, called
//! D2XX, which exposes a low-level API for talking to the devices through its DLL/shared
//! library.
//!
//! This crate uses that engine for one job: driving a Yamaha YMF825 (SD-1) FM
//! synthesizer over the bridge's SPI pins, from register pokes up to key-on.
//!
//! # Disclaimer
//!
//! This crate is unofficial and is not affiliated with FTDI or Yamaha in any way.
//!
//! # What This Crate Does
//!
//! - Device enumeration
//! - An MPSSE SPI bus with chip-select selection, hardware reset and per-operation
//!   transfer counters
//! - Single, burst and read register transactions in the YMF825's serial format
//! - A register-level driver: power-up sequence, tone data loading, note key-on/key-off
//! - A small stream protocol (TCP or serial) so several processes can share one bus
//!
//! The crate does not wrap the rest of the D2XX API (EEPROM programming, bit-bang modes,
//! baud rate control). If those are needed, the unsafe FFI bindings are available through
//! the [`ffi`] module.
//!
//! # Requirements
//!
//! The [D2XX driver](https://ftdichip.com/drivers/d2xx-drivers/) must be installed for
//! the target platform in order to communicate with devices. With the default `static`
//! feature the vendored D2XX library is linked in at build time; the FTDI kernel
//! driver (or on Linux, unbinding `ftdi_sio`) is still required at run time.
//!
//! # Background
//!
//! The YMF825 exposes its synthesizer through numbered interface registers behind an
//! SPI slave port. Every transaction starts with an address byte whose top bit selects
//! the direction: cleared for writes, set for reads. A burst write sends one address
//! byte followed by a block of data bytes, which is how tone definitions are loaded.
//!
//! On the bridge side this crate assembles MPSSE command frames: the clock and data
//! lines live on the low (ADBUS) pins with chip-select on a configurable ADBUS GPIO
//! (ADBUS3 by default), and the chip's reset line is wired to the high (ACBUS) bank,
//! which the bus driver toggles for a hardware reset. Each logical operation becomes
//! one frame of GPIO and clocking commands ending in a flush, so the select line
//! brackets the clocked bytes no matter how the USB traffic is scheduled.
//!
//! # D2XX Constraints
//!
//! The D2XX API provides few guarantees about the behavior of the driver, and little
//! of it is explicitly documented. This crate therefore puts additional restrictions
//! in place so that it is safe to use. The two assumptions with the greatest
//! consequence on the design are:
//!
//! 1. The driver is not thread-safe nor reentrant.
//! 2. Any error can occur at any time for any reason.
//!
//! A bus instance is consequently `!Sync` and every operation takes `&mut self`;
//! callers needing multi-threaded access must serialize it externally, or run the
//! bundled [`BusServer`] and let clients queue up on the stream protocol.
//!
//! ## Error Handling
//!
//! Functions returning a [`Result`] do not document their individual error conditions,
//! because for most D2XX calls those conditions are not specified anywhere. Treat
//! errors with a catch-all approach rather than matching specific variants, except for
//! the contract errors ([`Ymf825Error::InvalidParameter`] and
//! [`Ymf825Error::InvalidOperation`]) which are raised by this crate itself before any
//! native call is made.
//!
//! ## Global Lock
//!
//! Listing devices consists of a write followed by a read of the driver's process-wide
//! device table, which another thread may invalidate in between. Operations on the
//! table therefore run while holding a global lock, acquired transparently through
//! [`with_global_lock`](crate::ffi::with_global_lock). The function is public for use
//! alongside the raw bindings; care should be taken to avoid deadlocks.
//!
//! # Further Reading
//!
//! - [D2XX Programmer's Guide](https://ftdichip.com/document/programming-guides/) for
//!   the native API this crate wraps.
//! - [AN_108: Command Processor for MPSSE](https://ftdichip.com/wp-content/uploads/2020/08/AN_108_Command_Processor_for_MPSSE_and_MCU_Host_Bus_Emulation_Modes.pdf)
//!   for the command bytes the bus driver assembles.
//! - The [YMF825 board documentation](https://github.com/yamaha-webmusic/ymf825board)
//!   for the register map and tone data format.
//!
//! # Simple Example
//!
//! ```no_run
//! use ymf825::{list_devices, pitch, SpiBus, SpiConfig, Ymf825Bus, Ymf825Driver};
//!
//! // Scan for connected bridges.
//! let all_devices = list_devices().expect("failed to list devices");
//! for info in &all_devices {
//!     println!("{}: {}", info.index(), info.description());
//! }
//!
//! // Open the first one as an SPI bus and select the chip on ADBUS3.
//! let mut bus = SpiBus::open(0, &SpiConfig::default()).expect("failed to open device");
//! bus.set_target(0x08).expect("failed to select target");
//! bus.reset_hardware().expect("failed to reset");
//!
//! // Bring the synthesizer up and play concert A.
//! let mut synth = Ymf825Driver::new(bus);
//! synth.check_available().expect("no synthesizer answering");
//! synth.reset_software().expect("failed to run the power-up sequence");
//! let (block, fnum) = pitch(69);
//! synth.note_on(0, block, fnum).expect("failed to key on");
//! ```
#![warn(clippy::all, clippy::pedantic, clippy::cargo, missing_docs)]
// Allow missing error documentation since D2XX rarely specifies error conditions.
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod buffer;
mod bus;
mod device;
mod driver;
mod error;
pub mod ffi;
mod mpsse;
pub mod prelude;
mod remote;
mod scan;
pub mod spi;
pub(crate) mod util;
pub mod wire;

pub use bus::{BusCounters, OpCounters, Ymf825Bus};
pub use device::{BitMode, Device, MpssePort, Purge};
pub use driver::{pitch, reg, Ymf825Driver, MAX_TONE_DATA_LEN};
pub use error::{Result, Ymf825Error};
pub use remote::{BusServer, StreamBus};
pub use scan::{device_count, list_devices, DeviceInfo};
pub use spi::{SpiBus, SpiConfig};

pub(crate) use error::try_ft;

/// Get the version of the D2XX library.
///
/// This is *not* the driver version; see [`Device::driver_version`] for that.
#[allow(clippy::cast_possible_truncation)]
pub fn library_version() -> Result<Version> {
    let mut version: ffi::DWORD = 0;
    try_ft!(unsafe { ffi::FT_GetLibraryVersion(std::ptr::addr_of_mut!(version)) })?;
    Ok(Version(version as u32))
}

/// D2XX library or driver version.
///
/// The value is binary-coded decimal, `0x00XX_YYZZ`, with major version `XX`,
/// minor version `YY` and build `ZZ`.
pub struct Version(pub(crate) u32);

impl Version {
    /// Major version number.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn major(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// Minor version number.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn minor(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Build version number.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn build(&self) -> u8 {
        self.0 as u8
    }
}
