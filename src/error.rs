//! Log Error Types
//!
//! Only two failure classes reach callers:
//!
//! - `Io`: the underlying stream failed. Fatal for the affected channel;
//!   propagated unchanged.
//! - `WriterFinalized`: an append was attempted after [`finish`].
//!
//! Local corruption (bad length, checksum mismatch, invalid fragment
//! sequence) is never an error: the reader recovers by resynchronizing
//! to the next block boundary and reports the event through its
//! [`CorruptionReporter`].
//!
//! [`finish`]: crate::writer::LogWriter::finish
//! [`CorruptionReporter`]: crate::reader::CorruptionReporter

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("writer is finalized; no further appends are accepted")]
    WriterFinalized,
}
