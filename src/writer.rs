//! Record Writer - Fragmenting Logical Records onto an Append-Only Stream
//!
//! `LogWriter` turns caller-supplied byte sequences into the block-aligned
//! physical records described in [`format`](crate::format). Each logical
//! record becomes:
//!
//! - one `Full` physical record when it fits in the current block, or
//! - a `First` fragment, zero or more `Middle` fragments, and a `Last`
//!   fragment, one per block, when it does not.
//!
//! When fewer than [`HEADER_LEN`] bytes remain in the current block the
//! writer zero-fills the tail and starts the record at the next block
//! boundary, so a reader can always locate the next header without
//! scanning.
//!
//! ## Usage
//!
//! ```ignore
//! use recordlog::LogWriter;
//!
//! let file = tokio::fs::File::create("records.log").await?;
//! let mut writer = LogWriter::new(file);
//!
//! writer.append(b"first record").await?;
//! writer.append(&large_payload).await?; // fragmented transparently
//! writer.finish().await?;               // flush + close for writes
//! ```
//!
//! The writer tracks its block offset internally, so the sink only needs
//! to be an append-only `AsyncWrite`. To resume an existing stream, pass
//! its current length to [`LogWriter::with_offset`].
//!
//! ## Failure model
//!
//! A sink error leaves the stream indeterminate; there is no write-side
//! recovery. After [`LogWriter::finish`] every append fails with
//! [`Error::WriterFinalized`].

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{Error, Result};
use crate::format::{mask_crc, record_crc, RecordType, BLOCK_SIZE, HEADER_LEN};

/// Zero fill for block tails shorter than a header. A tail is at most
/// `HEADER_LEN - 1` bytes.
const BLOCK_TAIL_PAD: [u8; HEADER_LEN - 1] = [0; HEADER_LEN - 1];

/// Writes logical records onto an append-only byte sink.
pub struct LogWriter<W> {
    /// Underlying sink. Writes advance monotonically.
    dest: W,

    /// Offset into the current block, always `< BLOCK_SIZE` between
    /// appends.
    block_offset: usize,

    /// Set by `finish`; all later appends fail with a state error.
    finalized: bool,

    /// Sequence key of the most recent append, kept for upstream
    /// bookkeeping. Not part of the wire format.
    last_sequence_key: Option<String>,
}

impl<W: AsyncWrite + Unpin> LogWriter<W> {
    /// Create a writer for a fresh stream positioned at offset zero.
    pub fn new(dest: W) -> Self {
        Self::with_offset(dest, 0)
    }

    /// Create a writer that appends to an existing stream of length
    /// `stream_len`. Only the length modulo [`BLOCK_SIZE`] matters.
    pub fn with_offset(dest: W, stream_len: u64) -> Self {
        Self {
            dest,
            block_offset: (stream_len % BLOCK_SIZE as u64) as usize,
            finalized: false,
            last_sequence_key: None,
        }
    }

    /// Append one logical record, fragmenting across blocks as needed.
    ///
    /// Returns the number of logical-record bytes consumed (always
    /// `record.len()`). The sink is flushed once per call, so a
    /// completed record is visible to readers when this returns.
    pub async fn append(&mut self, record: &[u8]) -> Result<usize> {
        if self.finalized {
            return Err(Error::WriterFinalized);
        }

        let mut remaining = record;
        let mut first_fragment = true;
        loop {
            let leftover = BLOCK_SIZE - self.block_offset;
            if leftover < HEADER_LEN {
                // Not enough room for a header: pad out the block and
                // start the record on the next boundary.
                if leftover > 0 {
                    self.dest.write_all(&BLOCK_TAIL_PAD[..leftover]).await?;
                }
                self.block_offset = 0;
            }

            let avail = BLOCK_SIZE - self.block_offset - HEADER_LEN;
            let take = remaining.len().min(avail);
            let end = take == remaining.len();

            let kind = match (first_fragment, end) {
                (true, true) => RecordType::Full,
                (true, false) => RecordType::First,
                (false, false) => RecordType::Middle,
                (false, true) => RecordType::Last,
            };

            self.emit_physical_record(kind, &remaining[..take]).await?;
            remaining = &remaining[take..];
            first_fragment = false;

            if remaining.is_empty() {
                break;
            }
        }
        self.dest.flush().await?;

        Ok(record.len())
    }

    /// Append one logical record tagged with an opaque sequence key.
    ///
    /// The key is retained for upstream bookkeeping only; nothing about
    /// it reaches the stream.
    pub async fn append_with_sequence_key(
        &mut self,
        record: &[u8],
        sequence_key: &str,
    ) -> Result<usize> {
        let written = self.append(record).await?;
        self.last_sequence_key = Some(sequence_key.to_string());
        Ok(written)
    }

    /// Sequence key of the most recent keyed append, if any.
    pub fn last_sequence_key(&self) -> Option<&str> {
        self.last_sequence_key.as_deref()
    }

    /// Flush buffered bytes to the sink without finalizing.
    pub async fn flush(&mut self) -> Result<()> {
        self.dest.flush().await?;
        Ok(())
    }

    /// Flush and shut down the sink. Idempotent; every append after the
    /// first call fails with [`Error::WriterFinalized`].
    pub async fn finish(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.dest.flush().await?;
        self.dest.shutdown().await?;
        self.finalized = true;

        debug!(block_offset = self.block_offset, "record log finalized");
        Ok(())
    }

    /// Offset into the current block where the next header would land.
    pub fn block_offset(&self) -> usize {
        self.block_offset
    }

    pub fn into_inner(self) -> W {
        self.dest
    }

    async fn emit_physical_record(&mut self, kind: RecordType, payload: &[u8]) -> Result<()> {
        let masked = mask_crc(record_crc(kind, payload));

        let mut header = [0u8; HEADER_LEN];
        header[0..4].copy_from_slice(&masked.to_le_bytes());
        header[4..6].copy_from_slice(&(payload.len() as u16).to_le_bytes());
        header[6] = kind.as_u8();

        self.dest.write_all(&header).await?;
        self.dest.write_all(payload).await?;
        self.block_offset += HEADER_LEN + payload.len();
        if self.block_offset == BLOCK_SIZE {
            self.block_offset = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::unmask_crc;

    /// Walk a raw log buffer and return (type, payload length, offset)
    /// for each physical record, skipping block-tail padding.
    fn physical_records(buf: &[u8]) -> Vec<(u8, usize, usize)> {
        let mut out = Vec::new();
        let mut i = 0usize;
        while i + HEADER_LEN <= buf.len() {
            let room = BLOCK_SIZE - i % BLOCK_SIZE;
            if room < HEADER_LEN {
                i += room;
                continue;
            }
            let len = buf[i + 4] as usize | (buf[i + 5] as usize) << 8;
            let typ = buf[i + 6];
            if i + HEADER_LEN + len > buf.len() {
                break;
            }
            out.push((typ, len, i));
            i += HEADER_LEN + len;
        }
        out
    }

    // ---------------------------------------------------------------
    // Basic framing
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn two_small_records_are_full() {
        let mut writer = LogWriter::new(Vec::new());
        writer.append(b"hello").await.unwrap();
        writer.append(b"world!").await.unwrap();
        let buf = writer.into_inner();

        let recs = physical_records(&buf);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0], (RecordType::Full.as_u8(), 5, 0));
        assert_eq!(recs[1], (RecordType::Full.as_u8(), 6, HEADER_LEN + 5));
        assert_eq!(&buf[HEADER_LEN..HEADER_LEN + 5], b"hello");
    }

    #[tokio::test]
    async fn header_carries_masked_crc_of_type_and_payload() {
        let mut writer = LogWriter::new(Vec::new());
        writer.append(b"checked").await.unwrap();
        let buf = writer.into_inner();

        let stored = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        assert_eq!(
            unmask_crc(stored),
            record_crc(RecordType::Full, b"checked")
        );
        // Stored value is masked, not the raw CRC.
        assert_ne!(stored, record_crc(RecordType::Full, b"checked"));
    }

    #[tokio::test]
    async fn empty_record_is_a_full_record_with_no_payload() {
        let mut writer = LogWriter::new(Vec::new());
        assert_eq!(writer.append(b"").await.unwrap(), 0);
        let buf = writer.into_inner();

        assert_eq!(buf.len(), HEADER_LEN);
        assert_eq!(physical_records(&buf), vec![(RecordType::Full.as_u8(), 0, 0)]);
    }

    // ---------------------------------------------------------------
    // Block boundaries
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn short_block_tail_is_zero_padded() {
        // Leave 3 bytes in the block: too short for a header.
        let first_len = BLOCK_SIZE - HEADER_LEN - 3;
        let mut writer = LogWriter::new(Vec::new());
        writer.append(&vec![b'x'; first_len]).await.unwrap();
        writer.append(b"abc").await.unwrap();
        let buf = writer.into_inner();

        let tail = HEADER_LEN + first_len;
        assert_eq!(&buf[tail..tail + 3], &[0, 0, 0]);

        let recs = physical_records(&buf);
        assert_eq!(recs[1].0, RecordType::Full.as_u8());
        assert_eq!(recs[1].2 % BLOCK_SIZE, 0, "next record starts a new block");
    }

    #[tokio::test]
    async fn exact_fit_record_needs_no_padding() {
        // Payload exactly fills the block after its header.
        let len = BLOCK_SIZE - HEADER_LEN;
        let mut writer = LogWriter::new(Vec::new());
        writer.append(&vec![b'x'; len]).await.unwrap();
        assert_eq!(writer.block_offset(), 0);

        writer.append(b"next").await.unwrap();
        let buf = writer.into_inner();

        let recs = physical_records(&buf);
        assert_eq!(recs[0], (RecordType::Full.as_u8(), len, 0));
        assert_eq!(recs[1], (RecordType::Full.as_u8(), 4, BLOCK_SIZE));
    }

    #[tokio::test]
    async fn oversized_record_fragments_first_then_last() {
        let avail = BLOCK_SIZE - HEADER_LEN;
        let mut writer = LogWriter::new(Vec::new());
        writer.append(&vec![b'y'; avail + 10]).await.unwrap();
        let buf = writer.into_inner();

        let recs = physical_records(&buf);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0], (RecordType::First.as_u8(), avail, 0));
        assert_eq!(recs[1], (RecordType::Last.as_u8(), 10, BLOCK_SIZE));
    }

    #[tokio::test]
    async fn multi_block_record_has_middle_fragments() {
        let avail = BLOCK_SIZE - HEADER_LEN;
        let total = 3 * avail + 100;
        let mut writer = LogWriter::new(Vec::new());
        writer.append(&vec![b'z'; total]).await.unwrap();
        let buf = writer.into_inner();

        let types: Vec<u8> = physical_records(&buf).iter().map(|r| r.0).collect();
        assert_eq!(
            types,
            vec![
                RecordType::First.as_u8(),
                RecordType::Middle.as_u8(),
                RecordType::Middle.as_u8(),
                RecordType::Last.as_u8(),
            ]
        );
    }

    #[tokio::test]
    async fn with_offset_resumes_mid_block() {
        // Pretend the stream already holds one and a half blocks.
        let existing = BLOCK_SIZE as u64 + (BLOCK_SIZE / 2) as u64;
        let mut writer = LogWriter::with_offset(Vec::new(), existing);
        assert_eq!(writer.block_offset(), BLOCK_SIZE / 2);

        // A record larger than the half block must fragment.
        let half = BLOCK_SIZE / 2;
        writer.append(&vec![b'r'; half]).await.unwrap();
        let buf = writer.into_inner();

        // First fragment fills what the half block had left.
        let first_payload = half - HEADER_LEN;
        assert_eq!(buf[6], RecordType::First.as_u8());
        let len = buf[4] as usize | (buf[5] as usize) << 8;
        assert_eq!(len, first_payload);
    }

    // ---------------------------------------------------------------
    // State and bookkeeping
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn append_after_finish_is_a_state_error() {
        let mut writer = LogWriter::new(Vec::new());
        writer.append(b"data").await.unwrap();
        writer.finish().await.unwrap();

        assert!(matches!(
            writer.append(b"late").await,
            Err(Error::WriterFinalized)
        ));
        // finish is idempotent
        writer.finish().await.unwrap();
    }

    #[tokio::test]
    async fn sequence_key_is_retained_not_written() {
        let mut writer = LogWriter::new(Vec::new());
        assert_eq!(writer.last_sequence_key(), None);

        writer
            .append_with_sequence_key(b"payload", "seq-0042")
            .await
            .unwrap();
        assert_eq!(writer.last_sequence_key(), Some("seq-0042"));

        let buf = writer.into_inner();
        assert_eq!(buf.len(), HEADER_LEN + 7, "key added nothing to the wire");
    }
}
