//! Segmented Append-Only Commit Log ("the trail")
//!
//! A [`Trail`] owns a directory holding one *active* segment being written
//! (`active.gz`) and any number of *packed* segments, immutable files named
//! by creation instant and content digest. Records are opaque byte strings;
//! each is framed on disk as `varint(len) || bytes || varint(len)` and the
//! whole segment is one gzip stream at best compression.
//!
//! ## Segment Lifecycle
//! 1. Entries accumulate in the active segment ([`Trail::append`]).
//! 2. [`Trail::pack`] flushes, fsyncs and renames the active segment to its
//!    packed name, then opens a fresh active segment. An active segment that
//!    never received data is deleted instead of promoted.
//! 3. Packed segments are read back sequentially with [`SegmentReader`] and
//!    eventually removed by [`Trail::trim`] to enforce a disk budget.
//!
//! ## Packed Filenames
//! `YYYYMMDD_HHMMSS_<millis-hex>_<crc32-hex>.segment.gz`, UTC. The CRC32
//! (Koopman polynomial) covers the uncompressed payloads appended to the
//! segment, so the name is a content address; zero-padded fields keep
//! lexicographic order chronological.
//!
//! ## Failure Semantics
//! Any I/O failure during `append` or `pack` is sticky: the trail records it
//! and every subsequent operation fails with the same error kind until the
//! trail is closed. Reader-side corruption is isolated to the reader.

mod entry;
pub mod error;
mod reader;
mod segment;
mod trail;

pub use error::{Error, Result};
pub use reader::SegmentReader;
pub use trail::Trail;
