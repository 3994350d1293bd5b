use crate::ffi;

/// Result type returned by operations throughout the crate.
pub type Result<T, E = Ymf825Error> = std::result::Result<T, E>;

/// Represents an error returned by the driver stack.
///
/// Most variants correspond to statuses reported by the D2XX library.
/// Statuses with no dedicated variant are collapsed into a coarser one
/// (for example the EEPROM family), except for codes the library does not
/// define at all, which are preserved verbatim in [`Unknown`].
///
/// If necessary, a [`Ymf825Error`] may be constructed from a status code:
///
/// ```
/// use ymf825::Ymf825Error;
///
/// let err = Ymf825Error::from(1);
/// assert_eq!(err, Ymf825Error::InvalidHandle);
/// ```
///
/// Note that the `from` method will panic if given the success status.
///
/// [`Unknown`]: Ymf825Error::Unknown
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ymf825Error {
    /// The device handle is invalid.
    #[error("invalid device handle")]
    InvalidHandle,
    /// No device matched the given index.
    #[error("device not found")]
    DeviceNotFound,
    /// The device exists but has not been opened.
    #[error("device not opened")]
    DeviceNotOpened,
    /// A USB transfer failed.
    #[error("input/output error")]
    IoError,
    /// The driver could not allocate internal resources.
    #[error("insufficient resources")]
    InsufficientResources,
    /// A parameter was rejected, either by the driver or by this crate's
    /// own argument validation.
    #[error("invalid parameter")]
    InvalidParameter,
    /// The requested baud rate is not achievable.
    #[error("invalid baud rate")]
    InvalidBaudRate,
    /// An EEPROM access failed (read, write, erase, or missing EEPROM).
    #[error("EEPROM access fault")]
    EepromFault,
    /// The device rejected written data, or accepted fewer bytes than
    /// requested.
    #[error("failed to write to device")]
    WriteFault,
    /// The operation is not supported by this device.
    #[error("operation not supported")]
    NotSupported,
    /// The driver's device list has not been built yet.
    #[error("device list not ready")]
    DeviceListNotReady,
    /// A status code this crate does not recognize. The raw code is kept
    /// for diagnostics.
    #[error("unknown driver status {0}")]
    Unknown(u32),
    /// The call violated the bus programming contract and was rejected
    /// before any native call was made.
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
    /// A bounded read wait expired before response data arrived.
    #[error("timed out waiting for response data")]
    Timeout,
    /// The remote interface reported an incompatible protocol version.
    #[error("remote interface version mismatch")]
    VersionMismatch,
}

impl From<ffi::FT_STATUS> for Ymf825Error {
    #[allow(clippy::cast_possible_truncation)]
    fn from(value: ffi::FT_STATUS) -> Self {
        match value {
            0 => panic!("success is not an error"),
            1 => Ymf825Error::InvalidHandle,
            2 => Ymf825Error::DeviceNotFound,
            3 => Ymf825Error::DeviceNotOpened,
            4 => Ymf825Error::IoError,
            5 => Ymf825Error::InsufficientResources,
            6 | 16 => Ymf825Error::InvalidParameter,
            7 => Ymf825Error::InvalidBaudRate,
            8 | 9 | 11..=15 => Ymf825Error::EepromFault,
            10 => Ymf825Error::WriteFault,
            17 => Ymf825Error::NotSupported,
            19 => Ymf825Error::DeviceListNotReady,
            code => Ymf825Error::Unknown(code as u32),
        }
    }
}

impl From<std::io::Error> for Ymf825Error {
    fn from(_: std::io::Error) -> Self {
        Ymf825Error::IoError
    }
}

impl From<serialport::Error> for Ymf825Error {
    fn from(value: serialport::Error) -> Self {
        match value.kind() {
            serialport::ErrorKind::NoDevice => Ymf825Error::DeviceNotFound,
            serialport::ErrorKind::InvalidInput => Ymf825Error::InvalidParameter,
            serialport::ErrorKind::Io(_) | serialport::ErrorKind::Unknown => Ymf825Error::IoError,
        }
    }
}

macro_rules! try_ft {
    ($expr:expr) => {
        match $expr {
            0 => Ok(()),
            code => Err(crate::error::Ymf825Error::from(code)),
        }
    };
}

pub(crate) use try_ft;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_collapses_families() {
        assert_eq!(Ymf825Error::from(8), Ymf825Error::EepromFault);
        assert_eq!(Ymf825Error::from(14), Ymf825Error::EepromFault);
        assert_eq!(Ymf825Error::from(10), Ymf825Error::WriteFault);
        assert_eq!(Ymf825Error::from(16), Ymf825Error::InvalidParameter);
    }

    #[test]
    fn unmapped_status_preserves_code() {
        assert_eq!(Ymf825Error::from(18), Ymf825Error::Unknown(18));
        assert_eq!(Ymf825Error::from(42), Ymf825Error::Unknown(42));
    }

    #[test]
    #[should_panic(expected = "success is not an error")]
    fn success_is_not_an_error() {
        let _ = Ymf825Error::from(0);
    }
}
