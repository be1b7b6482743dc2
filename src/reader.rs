//! Record Reader - Reassembly and Corruption Recovery
//!
//! `LogReader` consumes physical records from a seekable byte source and
//! reassembles the logical records a [`LogWriter`](crate::LogWriter)
//! produced, in stream order.
//!
//! ## Recovery model
//!
//! Corruption is local, never fatal. Any of
//!
//! - a length field that overruns the current block,
//! - a checksum mismatch,
//! - an unknown type byte,
//! - a fragment arriving out of sequence (e.g. `Middle` with no `First`)
//!
//! discards the in-progress reassembly, reports the event to the
//! configured [`CorruptionReporter`], and resynchronizes by seeking to
//! the next block boundary. At most the logical records touching the
//! damaged block are lost; iteration then continues with the next valid
//! record. Callers never see an error for corruption, only a clean next
//! record or end of stream.
//!
//! A stream that ends mid-header or mid-payload (a crash during write)
//! is ordinary end of stream: `read_record` returns `Ok(None)`.
//!
//! ## Usage
//!
//! ```ignore
//! use recordlog::LogReader;
//!
//! let file = tokio::fs::File::open("records.log").await?;
//! let mut reader = LogReader::new(file);
//!
//! while let Some(record) = reader.read_record().await? {
//!     handle(record);
//! }
//! // reader.position() can be persisted and passed to seek() later to
//! // resume the scan.
//! ```

use std::io::SeekFrom;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};
use tracing::warn;

use crate::error::Result;
use crate::format::{record_crc, unmask_crc, RecordType, BLOCK_SIZE, HEADER_LEN};

/// Observer for corruption events the reader recovers from.
///
/// Injected rather than global so the reader carries no ambient state;
/// `bytes` is the size of the region being discarded (the bad physical
/// record plus any reassembly in progress).
pub trait CorruptionReporter {
    fn corruption(&mut self, bytes: u64, reason: &str);
}

/// Default reporter: structured `warn` events.
#[derive(Debug, Default)]
pub struct TracingReporter;

impl CorruptionReporter for TracingReporter {
    fn corruption(&mut self, bytes: u64, reason: &str) {
        warn!(bytes, reason, "skipping corrupt log region");
    }
}

/// Outcome of one physical-record read. Corruption is a value the
/// reassembly loop inspects, not an error that unwinds.
enum Physical {
    /// No further complete record is available.
    Eof,
    /// Fewer than `HEADER_LEN` bytes remain in the current block; the
    /// tail is writer padding. Synthesized without touching the stream.
    Padding,
    /// A damaged region of `bytes` on-stream bytes.
    Corrupt { bytes: u64, reason: &'static str },
    /// A decoded record; its payload is in `LogReader::frame`.
    Record { kind: RecordType },
}

/// Reads logical records back from a seekable byte source.
pub struct LogReader<R> {
    input: R,

    /// Stream position, kept in lockstep with `input`.
    pos: u64,

    /// Payload of the most recently decoded physical record.
    frame: Vec<u8>,

    /// Reassembly buffer for fragmented records. Starts at one block and
    /// doubles when an append would overflow.
    scratch: BytesMut,

    reporter: Box<dyn CorruptionReporter + Send>,
}

impl<R: AsyncRead + AsyncSeek + Unpin> LogReader<R> {
    /// Create a reader over a source positioned at offset zero. Use
    /// [`seek`](Self::seek) to resume a scan from a saved position.
    pub fn new(input: R) -> Self {
        Self {
            input,
            pos: 0,
            frame: Vec::with_capacity(BLOCK_SIZE),
            scratch: BytesMut::with_capacity(BLOCK_SIZE),
            reporter: Box::new(TracingReporter),
        }
    }

    /// Replace the corruption observer.
    pub fn with_reporter(mut self, reporter: Box<dyn CorruptionReporter + Send>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Next logical record in stream order, or `None` once no further
    /// complete record is available.
    pub async fn read_record(&mut self) -> Result<Option<Bytes>> {
        self.scratch.clear();
        let mut last = RecordType::None;

        loop {
            match self.read_physical_record().await? {
                Physical::Eof => return Ok(None),

                Physical::Padding => {
                    if last != RecordType::None {
                        // The writer never pads inside a fragment run.
                        self.recover(self.scratch.len() as u64, "padding inside fragmented record")
                            .await?;
                        last = RecordType::None;
                    } else {
                        self.skip_to_next_block().await?;
                    }
                }

                Physical::Corrupt { bytes, reason } => {
                    self.recover(bytes + self.scratch.len() as u64, reason).await?;
                    last = RecordType::None;
                }

                Physical::Record { kind } => match (last, kind) {
                    (RecordType::None, RecordType::Full) => {
                        return Ok(Some(Bytes::copy_from_slice(&self.frame)));
                    }
                    (RecordType::None, RecordType::First) => {
                        self.accumulate();
                        last = RecordType::First;
                    }
                    (RecordType::First | RecordType::Middle, RecordType::Middle) => {
                        self.accumulate();
                        last = RecordType::Middle;
                    }
                    (RecordType::First | RecordType::Middle, RecordType::Last) => {
                        self.accumulate();
                        return Ok(Some(self.scratch.split().freeze()));
                    }
                    (RecordType::None, RecordType::None) => {
                        // A zero region that happened to checksum; treat
                        // as padding and move on.
                        self.skip_to_next_block().await?;
                    }
                    (_, _) => {
                        let bytes = (self.frame.len() + self.scratch.len()) as u64;
                        self.recover(bytes, "invalid record type sequence").await?;
                        last = RecordType::None;
                    }
                },
            }
        }
    }

    /// Current stream position. Valid to persist and later pass to
    /// [`seek`](Self::seek).
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Reposition the scan. The next `read_record` call resumes from
    /// `offset`, which should be a position previously returned by
    /// [`position`](Self::position).
    pub async fn seek(&mut self, offset: u64) -> Result<()> {
        self.input.seek(SeekFrom::Start(offset)).await?;
        self.pos = offset;
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.input
    }

    /// Decode one physical record at the current position.
    async fn read_physical_record(&mut self) -> Result<Physical> {
        let block_remaining = BLOCK_SIZE - (self.pos % BLOCK_SIZE as u64) as usize;
        if block_remaining < HEADER_LEN {
            return Ok(Physical::Padding);
        }

        let mut header = [0u8; HEADER_LEN];
        let filled = fill_from(&mut self.input, &mut header).await?;
        self.pos += filled as u64;
        if filled < HEADER_LEN {
            return Ok(Physical::Eof);
        }

        let masked = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let length = u16::from_le_bytes([header[4], header[5]]) as usize;
        let tag = header[6];

        if length > block_remaining - HEADER_LEN {
            return Ok(Physical::Corrupt {
                bytes: HEADER_LEN as u64,
                reason: "record length overruns block",
            });
        }
        let Some(kind) = RecordType::from_u8(tag) else {
            return Ok(Physical::Corrupt {
                bytes: HEADER_LEN as u64,
                reason: "unknown record type",
            });
        };

        self.frame.resize(length, 0);
        let filled = fill_from(&mut self.input, &mut self.frame).await?;
        self.pos += filled as u64;
        if filled < length {
            return Ok(Physical::Eof);
        }

        if unmask_crc(masked) != record_crc(kind, &self.frame) {
            return Ok(Physical::Corrupt {
                bytes: (HEADER_LEN + length) as u64,
                reason: "checksum mismatch",
            });
        }

        Ok(Physical::Record { kind })
    }

    /// Discard in-progress reassembly, report, and resynchronize.
    async fn recover(&mut self, bytes: u64, reason: &'static str) -> Result<()> {
        self.reporter.corruption(bytes, reason);
        self.scratch.clear();
        self.skip_to_next_block().await
    }

    /// Seek to the next block boundary. A position already on a boundary
    /// stays put: the block starting here has not been implicated.
    async fn skip_to_next_block(&mut self) -> Result<()> {
        let offset_in_block = self.pos % BLOCK_SIZE as u64;
        if offset_in_block != 0 {
            let next = self.pos + (BLOCK_SIZE as u64 - offset_in_block);
            self.seek(next).await?;
        }
        Ok(())
    }

    /// Append the current frame to the reassembly buffer, doubling its
    /// capacity as needed so accumulated bytes are preserved.
    fn accumulate(&mut self) {
        let needed = self.scratch.len() + self.frame.len();
        if needed > self.scratch.capacity() {
            let mut capacity = self.scratch.capacity().max(BLOCK_SIZE);
            while capacity < needed {
                capacity *= 2;
            }
            self.scratch.reserve(capacity - self.scratch.len());
        }
        self.scratch.extend_from_slice(&self.frame);
    }
}

/// Fill `buf` from `input`, stopping early only at end of stream.
/// Returns the number of bytes read; a short count means the stream was
/// truncated mid-record, which callers treat as end of stream.
async fn fill_from<R: AsyncRead + Unpin>(input: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = input.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
