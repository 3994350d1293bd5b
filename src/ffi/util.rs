//! Thin wrappers over the D2XX transfer calls.
//!
//! Internal only: these take raw handles and do no validation beyond what
//! the driver itself reports.

use super::*;
use crate::{try_ft, Result};

/// Write to the device synchronously.
///
/// The driver is handed the whole buffer in a single call. On success the
/// number of bytes the driver accepted is returned; the caller decides what
/// a short count means.
///
/// # Panics
///
/// Panics if `buf.len()` exceeds `DWORD::MAX`.
pub(crate) fn write_port(handle: FT_HANDLE, buf: &[u8]) -> Result<usize> {
    let mut bytes_written: DWORD = 0;
    try_ft!(unsafe {
        FT_Write(
            handle,
            buf.as_ptr().cast_mut().cast(),
            DWORD::try_from(buf.len()).expect("buffer length exceeds DWORD::MAX"),
            std::ptr::addr_of_mut!(bytes_written),
        )
    })?;
    Ok(bytes_written as usize)
}

/// Read from the device synchronously.
///
/// Blocks until `buf.len()` bytes arrive or the read timeout configured via
/// `FT_SetTimeouts` expires. On success the number of bytes actually read
/// is returned.
///
/// # Panics
///
/// Panics if `buf.len()` exceeds `DWORD::MAX`.
pub(crate) fn read_port(handle: FT_HANDLE, buf: &mut [u8]) -> Result<usize> {
    let mut bytes_read: DWORD = 0;
    try_ft!(unsafe {
        FT_Read(
            handle,
            buf.as_mut_ptr().cast(),
            DWORD::try_from(buf.len()).expect("buffer length exceeds DWORD::MAX"),
            std::ptr::addr_of_mut!(bytes_read),
        )
    })?;
    Ok(bytes_read as usize)
}

/// Number of bytes waiting in the device's receive queue.
pub(crate) fn queue_status(handle: FT_HANDLE) -> Result<usize> {
    let mut in_queue: DWORD = 0;
    try_ft!(unsafe { FT_GetQueueStatus(handle, std::ptr::addr_of_mut!(in_queue)) })?;
    Ok(in_queue as usize)
}
