//! Staging buffers for MPSSE command frames and response data.

/// Reusable write/read staging buffers for the SPI driver.
///
/// Both buffers grow on demand to exactly the size requested and never
/// shrink, so repeated transfers of similar size reuse one allocation.
/// Frames are always assembled from an empty buffer; stale bytes cannot
/// leak between transactions. Both allocations are freed exactly once,
/// when the owning bus is dropped.
#[derive(Debug, Default)]
pub(crate) struct TransferBuffers {
    write: Vec<u8>,
    read: Vec<u8>,
    write_capacity: usize,
    read_capacity: usize,
}

impl TransferBuffers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Begin assembling a frame of at most `len` bytes.
    ///
    /// If the write buffer is smaller than `len` it is replaced by an
    /// allocation of exactly `len` bytes; otherwise the existing one is
    /// reused. The returned buffer is empty.
    pub(crate) fn begin_frame(&mut self, len: usize) -> &mut Vec<u8> {
        if self.write_capacity < len {
            self.write = Vec::with_capacity(len);
            self.write_capacity = len;
        }
        self.write.clear();
        &mut self.write
    }

    /// The most recently assembled frame.
    pub(crate) fn frame(&self) -> &[u8] {
        &self.write
    }

    /// A zeroed response window of exactly `len` bytes.
    ///
    /// The read buffer follows the same exact-growth rule as the write
    /// buffer.
    pub(crate) fn read_slice(&mut self, len: usize) -> &mut [u8] {
        if self.read_capacity < len {
            self.read = vec![0; len];
            self.read_capacity = len;
        }
        let window = &mut self.read[..len];
        window.fill(0);
        window
    }

    #[cfg(test)]
    pub(crate) fn write_capacity(&self) -> usize {
        self.write_capacity
    }

    #[cfg(test)]
    pub(crate) fn read_capacity(&self) -> usize {
        self.read_capacity
    }
}
