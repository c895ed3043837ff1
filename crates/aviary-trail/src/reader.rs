//! Segment Reader
//!
//! Pull-based, single-consumer iteration over the entries of a packed
//! segment. The reader decompresses the gzip stream incrementally and
//! verifies each entry's trailing length against its leading one, so a
//! segment truncated mid-entry surfaces as corruption instead of silently
//! yielding a short payload.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use bytes::Bytes;
use flate2::read::GzDecoder;

use crate::entry;
use crate::error::Result;

/// Sequential reader over one packed segment. Not restartable; reopen the
/// segment to scan it again.
pub struct SegmentReader {
    input: BufReader<GzDecoder<File>>,
}

impl SegmentReader {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            input: BufReader::new(GzDecoder::new(file)),
        })
    }

    /// The next entry's payload, or `None` at the end of the segment.
    pub fn next_entry(&mut self) -> Result<Option<Bytes>> {
        Ok(entry::read_entry(&mut self.input)?.map(Bytes::from))
    }
}
