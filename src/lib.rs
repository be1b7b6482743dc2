//! recordlog - Block-Aligned Record Log Framing
//!
//! This crate implements a length-prefixed, checksummed record log: a
//! writer and reader pair that puts a sequence of arbitrary-length
//! logical records onto an append-only byte stream and later recovers
//! that exact sequence, detecting and skipping corruption. It is the
//! framing layer of a write-ahead log, in the same family as leveldb's
//! log format.
//!
//! ## Stream Layout
//!
//! The stream is divided into fixed 32 KiB blocks starting at offset 0.
//! Logical records are carried by physical records that never cross a
//! block boundary:
//!
//! ```text
//! ┌──────────────────── Block 0 ────────────────────┬──── Block 1 ───
//! │ [hdr|payload] [hdr|payload]        [hdr|pay...] │ [...load] ...
//! │  FULL          FIRST                (padding)   │  LAST
//! └─────────────────────────────────────────────────┴────────────────
//!
//! hdr = [masked CRC32C, 4 B LE][payload length, 2 B LE][type, 1 B]
//! ```
//!
//! A logical record that fits in the current block is one `FULL`
//! physical record; otherwise it is split into `FIRST`, `MIDDLE`*,
//! `LAST` fragments, one per block. Block tails too short for a header
//! are zero-padded and skipped on read.
//!
//! ## Why Blocks?
//!
//! The block is the unit of damage containment. A reader that finds a
//! bad checksum, an impossible length, or a fragment out of sequence
//! discards at most the records touching the current block, seeks to
//! the next boundary, and keeps going. A crash mid-write costs the tail
//! of the stream, never the records before it.
//!
//! ## Main Components
//!
//! ### [`LogWriter`]
//! Appends logical records to any `AsyncWrite` sink, fragmenting and
//! padding as the format requires. Tracks its own block offset, so the
//! sink only needs to append.
//!
//! ### [`LogReader`]
//! Reassembles logical records from any `AsyncRead + AsyncSeek` source.
//! Corruption is recovered, reported through an injectable
//! [`CorruptionReporter`], and never surfaced as an error; truncated
//! tails read as a clean end of stream. `position`/`seek` support
//! resumable scans.
//!
//! ### [`format`]
//! The wire constants: block geometry, record-type tags, and the
//! CRC32C masking transform shared by both sides.
//!
//! ## Usage
//!
//! ```ignore
//! use recordlog::{LogReader, LogWriter};
//!
//! // Write
//! let mut writer = LogWriter::new(tokio::fs::File::create(&path).await?);
//! writer.append(b"hello").await?;
//! writer.append(&large_payload).await?;
//! writer.finish().await?;
//!
//! // Read back
//! let mut reader = LogReader::new(tokio::fs::File::open(&path).await?);
//! while let Some(record) = reader.read_record().await? {
//!     process(record);
//! }
//! ```
//!
//! ## Concurrency
//!
//! Writer and reader are single-owner (`&mut self`) components with no
//! internal locking; coordinating multiple channels over one resource
//! is the caller's responsibility.

pub mod error;
pub mod format;
pub mod reader;
pub mod writer;

pub use error::{Error, Result};
pub use format::{mask_crc, record_crc, unmask_crc, RecordType, BLOCK_SIZE, HEADER_LEN};
pub use reader::{CorruptionReporter, LogReader, TracingReporter};
pub use writer::LogWriter;
