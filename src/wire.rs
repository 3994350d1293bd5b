//! Remote interface protocol: the opcode framing shared by the serial
//! bridge firmware and the local passthrough service.
//!
//! Every command is one opcode byte followed by a fixed-shape payload.
//! Only [`Opcode::Read`] and [`Opcode::VersionQuery`] produce a reply;
//! everything else is fire-and-forget.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::bus::ADDRESS_MASK;

/// Version reply: 8 ASCII bytes.
pub const PROTOCOL_VERSION: [u8; 8] = *b"YMF825V1";

/// Largest burst payload a single protocol frame may carry, in bytes.
///
/// This is the register-layer bound. The hardware SPI core accepts far
/// larger runs ([`MAX_BURST_LEN`](crate::spi::MAX_BURST_LEN)); anything a
/// remote client sends above this bound is rejected on both ends.
pub const MAX_BURST_LEN: usize = 512;

/// Command opcodes of the remote interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    /// Single register write: address byte, data byte.
    Write = 0x00,
    /// Burst write: little-endian payload length, address byte, payload.
    BurstWrite = 0x01,
    /// Register read: target mask byte, address byte. One reply byte.
    Read = 0x20,
    /// Select chip-select targets: mask byte.
    SetTarget = 0x40,
    /// Pulse the hardware reset line. No payload, no reply.
    HardwareReset = 0xFE,
    /// Version query: no payload; the reply is [`PROTOCOL_VERSION`].
    VersionQuery = 0xFF,
}

pub(crate) fn encode_write(frame: &mut Vec<u8>, address: u8, data: u8) {
    frame.extend_from_slice(&[Opcode::Write.into(), address & ADDRESS_MASK, data]);
}

/// # Panics
///
/// Panics if `data` is empty or longer than [`MAX_BURST_LEN`]; callers
/// validate before encoding.
pub(crate) fn encode_burst_write(frame: &mut Vec<u8>, address: u8, data: &[u8]) {
    assert!(!data.is_empty() && data.len() <= MAX_BURST_LEN);
    let [len_lo, len_hi] = u16::try_from(data.len())
        .expect("burst length exceeds protocol bound")
        .to_le_bytes();
    frame.extend_from_slice(&[
        Opcode::BurstWrite.into(),
        len_lo,
        len_hi,
        address & ADDRESS_MASK,
    ]);
    frame.extend_from_slice(data);
}

pub(crate) fn encode_read(frame: &mut Vec<u8>, target: u8, address: u8) {
    frame.extend_from_slice(&[Opcode::Read.into(), target, address & ADDRESS_MASK]);
}

pub(crate) fn encode_set_target(frame: &mut Vec<u8>, mask: u8) {
    frame.extend_from_slice(&[Opcode::SetTarget.into(), mask]);
}
