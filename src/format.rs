//! On-Stream Framing Constants
//!
//! The log is a sequence of fixed-size blocks, each holding one or more
//! physical records. A physical record never straddles a block boundary:
//! when fewer than [`HEADER_LEN`] bytes remain in a block, the tail is
//! zero-padded and the next record starts at the following block.
//!
//! ```text
//! Block (32 KiB, aligned to multiples of BLOCK_SIZE from offset 0):
//! ┌──────────────────┬──────────────────┬─────┬─────────┐
//! │ Physical Record  │ Physical Record  │ ... │ Padding │
//! └──────────────────┴──────────────────┴─────┴─────────┘
//!
//! Physical Record:
//! ┌──────────────┬──────────┬──────┬───────────┐
//! │ Masked CRC32C│ Length   │ Type │ Payload   │
//! │ (4 bytes, LE)│(2 B, LE) │(1 B) │ (N bytes) │
//! └──────────────┴──────────┴──────┴───────────┘
//! ```
//!
//! The CRC32C covers the type byte followed by the payload. The stored
//! value is masked ([`mask_crc`]) so that runs of zero bytes from an
//! uninitialized or partially flushed block never decode as a record
//! with a valid checksum.
//!
//! All values here are interoperability constants. Changing any of them
//! produces a stream that other implementations of this format cannot
//! read.

/// Size of one log block. Records are padded and fragmented so that no
/// physical record crosses a multiple of this offset.
pub const BLOCK_SIZE: usize = 32 * 1024;

/// Physical record header: masked CRC32C (4) + payload length (2) + type (1).
pub const HEADER_LEN: usize = 4 + 2 + 1;

/// Delta added to the rotated CRC when masking. Fixed by the format.
pub const CRC_MASK_DELTA: u32 = 0xa282_ead8;

/// Tag byte of a physical record.
///
/// `Full` carries an entire logical record. A logical record too large
/// for the current block is written as `First`, zero or more `Middle`,
/// and one `Last` fragment. `None` marks block-tail padding; it is
/// synthesized by the reader and never written as an addressable record.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    None = 0,
    Full = 1,
    First = 2,
    Middle = 3,
    Last = 4,
}

impl RecordType {
    /// Decode a tag byte. Unknown values are corruption, not a panic.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Full),
            2 => Some(Self::First),
            3 => Some(Self::Middle),
            4 => Some(Self::Last),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Mask a raw CRC32C for storage: rotate right by 15 bits, then add the
/// format's fixed delta.
pub fn mask_crc(raw: u32) -> u32 {
    raw.rotate_right(15).wrapping_add(CRC_MASK_DELTA)
}

/// Invert [`mask_crc`].
pub fn unmask_crc(masked: u32) -> u32 {
    masked.wrapping_sub(CRC_MASK_DELTA).rotate_left(15)
}

/// CRC32C (Castagnoli) of the type byte followed by the payload.
pub fn record_crc(kind: RecordType, payload: &[u8]) -> u32 {
    let crc = crc32c::crc32c(&[kind.as_u8()]);
    crc32c::crc32c_append(crc, payload)
}
