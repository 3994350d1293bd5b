use std::{marker::PhantomData, ptr::addr_of_mut, time::Duration};

use num_enum::IntoPrimitive;

use crate::{ffi, try_ft, util::PhantomUnsync, Result, Version, Ymf825Error};

/// Bridge chip operating mode, selected through `FT_SetBitMode`.
///
/// Only the modes this driver uses are represented. The MPSSE engine is
/// available on the FT232H and FT2232H parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive)]
#[repr(u8)]
pub enum BitMode {
    /// Leave any special mode and return to the chip's default behavior.
    Reset = 0x00,
    /// Multi-Protocol Synchronous Serial Engine.
    Mpsse = 0x02,
}

/// Selects which of the bridge's internal buffers to discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purge {
    /// Receive buffer only.
    Rx,
    /// Transmit buffer only.
    Tx,
    /// Both buffers.
    All,
}

impl Purge {
    fn mask(self) -> ffi::ULONG {
        match self {
            Purge::Rx => ffi::ULONG::from(ffi::FT_PURGE_RX),
            Purge::Tx => ffi::ULONG::from(ffi::FT_PURGE_TX),
            Purge::All => ffi::ULONG::from(ffi::FT_PURGE_RX | ffi::FT_PURGE_TX),
        }
    }
}

/// The bridge-device surface the SPI driver is written against.
///
/// [`Device`] is the production implementation. Tests implement this trait
/// with a scripted port so frame assembly and contract checks can run
/// without hardware.
pub trait MpssePort {
    /// Hand the driver a buffer to transmit in a single call.
    ///
    /// Returns the number of bytes the driver accepted; the caller decides
    /// what a short count means. No retry is performed.
    fn raw_write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Read up to `buf.len()` bytes, returning the count actually read.
    fn raw_read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Number of response bytes waiting in the receive queue.
    fn queued_bytes(&mut self) -> Result<usize>;

    /// Discard buffered data on the selected side(s).
    fn purge(&mut self, which: Purge) -> Result<()>;

    /// Set the read and write timeouts, in milliseconds.
    fn set_timeouts(&mut self, read_ms: u32, write_ms: u32) -> Result<()>;

    /// Set the USB latency timer, in milliseconds.
    fn set_latency_timer(&mut self, ms: u8) -> Result<()>;

    /// Select an operating mode with the given pin direction mask.
    fn set_bit_mode(&mut self, mask: u8, mode: BitMode) -> Result<()>;

    /// Pause for a settle period. Mock ports may make this a no-op.
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Handle to a D2XX device.
///
/// The handle owns the underlying driver handle exclusively and closes it
/// when dropped. All I/O is synchronous; each call blocks until the driver
/// completes the USB round trip.
///
/// # Example
///
/// ```no_run
/// use ymf825::Device;
///
/// let device = Device::open(0).unwrap();
/// ```
#[derive(Debug)]
pub struct Device {
    /// Handle returned by the D2XX driver when the device is opened.
    handle: ffi::FT_HANDLE,
    // Cannot share the handle across threads since the driver is not
    // thread-safe, and so we need to prevent race conditions on device
    // operations.
    _unsync: PhantomUnsync,
}

impl Device {
    /// Open a device by its index in the driver's device table.
    ///
    /// The index matches the position reported by [`list_devices`].
    ///
    /// # Example
    ///
    /// ```no_run
    /// use ymf825::Device;
    ///
    /// let device = Device::open(0).unwrap();
    /// ```
    ///
    /// [`list_devices`]: crate::list_devices
    pub fn open(index: u32) -> Result<Self> {
        let index = i32::try_from(index).map_err(|_| Ymf825Error::InvalidParameter)?;
        let mut handle: ffi::FT_HANDLE = std::ptr::null_mut();
        try_ft!(unsafe { ffi::FT_Open(index, &mut handle) })?;
        if handle.is_null() {
            Err(Ymf825Error::DeviceNotFound)
        } else {
            log::debug!("opened device at index {index}");
            Ok(Self {
                handle,
                _unsync: PhantomData,
            })
        }
    }

    /// Wrap an already-open device handle.
    ///
    /// # Safety
    /// The handle must be valid, open, and not used elsewhere; the returned
    /// device assumes exclusive ownership and will close it on drop.
    #[must_use]
    pub unsafe fn with_handle(handle: ffi::FT_HANDLE) -> Self {
        Self {
            handle,
            _unsync: PhantomData,
        }
    }

    /// Get the device's handle.
    ///
    /// This handle is fairly useless on its own. Although not recommended
    /// for typical users, it may be used with the raw D2XX bindings in the
    /// [ffi] module.
    #[must_use]
    pub fn handle(&self) -> ffi::FT_HANDLE {
        self.handle
    }

    /// Discard buffered data on the selected side(s).
    pub fn purge(&self, which: Purge) -> Result<()> {
        try_ft!(unsafe { ffi::FT_Purge(self.handle, which.mask()) })
    }

    /// Set the read and write timeouts, in milliseconds.
    ///
    /// A timed-out read returns however many bytes had arrived; it is not
    /// reported as an error by the driver.
    pub fn set_timeouts(&self, read_ms: u32, write_ms: u32) -> Result<()> {
        try_ft!(unsafe {
            ffi::FT_SetTimeouts(self.handle, ffi::DWORD::from(read_ms), ffi::DWORD::from(write_ms))
        })
    }

    /// Set the USB latency timer, in milliseconds.
    ///
    /// Lower values reduce the time short responses sit in the bridge's
    /// buffer before being forwarded to the host. The driver accepts
    /// 2 through 255.
    pub fn set_latency_timer(&self, ms: u8) -> Result<()> {
        try_ft!(unsafe { ffi::FT_SetLatencyTimer(self.handle, ms) })
    }

    /// Select an operating mode with the given pin direction mask.
    pub fn set_bit_mode(&self, mask: u8, mode: BitMode) -> Result<()> {
        try_ft!(unsafe { ffi::FT_SetBitMode(self.handle, mask, mode.into()) })
    }

    /// Number of response bytes waiting in the receive queue.
    pub fn queued_bytes(&self) -> Result<usize> {
        ffi::util::queue_status(self.handle)
    }

    /// Get the D2XX driver version.
    ///
    /// This is *not* the library version.
    #[allow(clippy::cast_possible_truncation)]
    pub fn driver_version(&self) -> Result<Version> {
        let mut version: ffi::DWORD = 0;
        try_ft!(unsafe { ffi::FT_GetDriverVersion(self.handle, addr_of_mut!(version)) })?;
        Ok(Version(version as u32))
    }
}

impl MpssePort for Device {
    fn raw_write(&mut self, buf: &[u8]) -> Result<usize> {
        ffi::util::write_port(self.handle, buf)
    }

    fn raw_read(&mut self, buf: &mut [u8]) -> Result<usize> {
        ffi::util::read_port(self.handle, buf)
    }

    fn queued_bytes(&mut self) -> Result<usize> {
        Device::queued_bytes(self)
    }

    fn purge(&mut self, which: Purge) -> Result<()> {
        Device::purge(self, which)
    }

    fn set_timeouts(&mut self, read_ms: u32, write_ms: u32) -> Result<()> {
        Device::set_timeouts(self, read_ms, write_ms)
    }

    fn set_latency_timer(&mut self, ms: u8) -> Result<()> {
        Device::set_latency_timer(self, ms)
    }

    fn set_bit_mode(&mut self, mask: u8, mode: BitMode) -> Result<()> {
        Device::set_bit_mode(self, mask, mode)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            ffi::FT_Close(self.handle);
        }
    }
}
