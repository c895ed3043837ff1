//! Trail Error Types
//!
//! ## Error Categories
//!
//! - `Closed`: operation on a trail that was already closed.
//! - `AlreadyActive`: opening a trail whose `active.gz` survives from an
//!   earlier run, without requesting truncation.
//! - `Corrupt`: entry framing violation inside a segment (length mismatch,
//!   stream ending mid-entry, unreadable varint).
//! - `NotPacked`: a name handed to `trim` that does not match the packed
//!   segment pattern.
//! - `Io`: any filesystem or compression error from the OS.
//!
//! All trail operations return `Result<T>`, aliased to `Result<T, Error>`.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("trail is closed")]
    Closed,

    #[error("active segment already exists: {0}")]
    AlreadyActive(PathBuf),

    #[error("corrupt segment: {0}")]
    Corrupt(String),

    #[error("not a packed segment name: {0}")]
    NotPacked(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<aviary_core::Error> for Error {
    fn from(err: aviary_core::Error) -> Self {
        match err {
            aviary_core::Error::Io(e) => Error::Io(e),
            aviary_core::Error::VarintOverflow => {
                Error::Corrupt("entry length varint overflows 64 bits".to_string())
            }
            aviary_core::Error::UnexpectedEof => {
                Error::Corrupt("stream ended in the middle of an entry".to_string())
            }
        }
    }
}
