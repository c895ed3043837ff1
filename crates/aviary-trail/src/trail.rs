//! Trail: directory-scoped log of one active and many packed segments.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::reader::SegmentReader;
use crate::segment::{ActiveSegment, RE_PACKED_SEGMENT};

/// A sticky failure. `io::Error` is not `Clone`, so the trail keeps the
/// failing operation's kind and message and re-materializes an error of the
/// same kind on every subsequent call.
#[derive(Debug, Clone)]
struct Fault {
    kind: io::ErrorKind,
    message: String,
}

impl Fault {
    fn capture(err: &Error) -> Option<Self> {
        match err {
            Error::Io(e) => Some(Self {
                kind: e.kind(),
                message: e.to_string(),
            }),
            Error::AlreadyActive(path) => Some(Self {
                kind: io::ErrorKind::AlreadyExists,
                message: format!("active segment already exists: {}", path.display()),
            }),
            _ => None,
        }
    }

    fn to_error(&self) -> Error {
        Error::Io(io::Error::new(self.kind, self.message.clone()))
    }
}

/// A series of log segments inside one directory.
///
/// Exactly one active segment exists while the trail is open; packed
/// segments are immutable and named so that lexicographic order is
/// chronological. The trail owns its directory entries exclusively for the
/// life of the process; two trails over one directory are undefined
/// behavior.
#[derive(Debug)]
pub struct Trail {
    dir: PathBuf,
    mode: u32,
    closed: bool,
    fault: Option<Fault>,
    active: Option<ActiveSegment>,
}

impl Trail {
    /// Open a trail in `dir`, creating the directory if needed.
    ///
    /// `mode` sets the unix permission bits of segment files. With
    /// `truncate_existing` any leftover `active.gz` is overwritten;
    /// without it the open fails with [`Error::AlreadyActive`].
    pub fn open(dir: impl Into<PathBuf>, mode: u32, truncate_existing: bool) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let active = ActiveSegment::create(&dir, mode, truncate_existing)?;
        info!(dir = %dir.display(), "trail opened");
        Ok(Self {
            dir,
            mode,
            closed: false,
            fault: None,
            active: Some(active),
        })
    }

    fn guard(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        if let Some(fault) = &self.fault {
            return Err(fault.to_error());
        }
        Ok(())
    }

    fn stick<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.fault = Fault::capture(err);
        }
        result
    }

    /// Append one entry to the active segment.
    ///
    /// Writes land in the gzip layer's buffer; there is no fsync per call.
    pub fn append(&mut self, payload: &[u8]) -> Result<()> {
        self.guard()?;
        let active = self.active.as_mut().ok_or(Error::Closed)?;
        let result = active.append(payload).map(|_| ());
        self.stick(result)
    }

    /// Rotate: pack the active segment and open a new one.
    ///
    /// An active segment that never received data is deleted rather than
    /// promoted. Any failure leaves the trail error-sticky.
    pub fn pack(&mut self) -> Result<()> {
        self.guard()?;
        let active = self.active.take().ok_or(Error::Closed)?;
        let packed = self.stick(active.pack_and_close())?;
        if let Some(name) = packed {
            info!(dir = %self.dir.display(), segment = %name, "segment packed");
        }
        let next = ActiveSegment::create(&self.dir, self.mode, false);
        self.active = Some(self.stick(next)?);
        Ok(())
    }

    /// Pack the active segment without reopening. Idempotent; every
    /// operation after the first close returns [`Error::Closed`].
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(active) = self.active.take() {
            active.pack_and_close()?;
        }
        Ok(())
    }

    /// Base filenames of the packed segments, sorted lexicographically
    /// (which, by construction of the names, is chronological).
    pub fn segment_names(&self) -> Result<Vec<String>> {
        self.guard()?;
        let mut names = Vec::new();
        for dirent in fs::read_dir(&self.dir)? {
            let dirent = dirent?;
            if let Some(name) = dirent.file_name().to_str() {
                if RE_PACKED_SEGMENT.is_match(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Open the packed segment with the given name for sequential reading.
    ///
    /// Failures here are isolated: they do not stick to the trail.
    pub fn open_segment(&self, name: &str) -> Result<SegmentReader> {
        self.guard()?;
        let base = base_name(name)?;
        SegmentReader::open(&self.dir.join(base))
    }

    /// Total on-disk size: all packed segments plus the active segment.
    pub fn size(&self) -> Result<u64> {
        let mut total = self.unpacked_size()?;
        for name in self.segment_names()? {
            total += fs::symlink_metadata(self.dir.join(name))?.len();
        }
        Ok(total)
    }

    /// On-disk size of the active segment only.
    ///
    /// The gzip writer buffers in memory, so the logical size may be larger;
    /// treat this as a lower bound, not a precise threshold.
    pub fn unpacked_size(&self) -> Result<u64> {
        self.guard()?;
        let active = self.active.as_ref().ok_or(Error::Closed)?;
        active.disk_size()
    }

    /// The smallest oldest-first prefix of packed segments whose removal
    /// brings the total packed size within `budget`. Empty when already
    /// under budget. The active segment is never included.
    ///
    /// Removal granularity is a whole segment, so there is no guarantee the
    /// fewest *entries* are removed; callers wanting a tight ratio should
    /// watch the active segment's size and pack often.
    pub fn compute_trim(&self, budget: u64) -> Result<Vec<String>> {
        let names = self.segment_names()?;
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let mut sizes = Vec::with_capacity(names.len());
        let mut total: u64 = 0;
        for name in &names {
            let size = fs::symlink_metadata(self.dir.join(name))?.len();
            sizes.push(size);
            total += size;
        }
        if total <= budget {
            return Ok(Vec::new());
        }
        for (i, size) in sizes.iter().enumerate() {
            total -= size;
            if total <= budget {
                return Ok(names[..=i].to_vec());
            }
        }
        Ok(names)
    }

    /// Unlink the given packed segments.
    ///
    /// Every name is validated against the packed pattern before anything is
    /// removed; the first unlink failure aborts, leaving the remaining names
    /// on disk for a retry.
    pub fn trim<I, S>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.guard()?;
        let mut bases = Vec::new();
        for name in names {
            let base = base_name(name.as_ref())?.to_string();
            bases.push(base);
        }
        for base in &bases {
            fs::remove_file(self.dir.join(base))?;
        }
        Ok(())
    }
}

/// Strip any directory components and insist on the packed pattern.
fn base_name(name: &str) -> Result<&str> {
    let base = Path::new(name)
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::NotPacked(name.to_string()))?;
    if !RE_PACKED_SEGMENT.is_match(base) {
        return Err(Error::NotPacked(base.to_string()));
    }
    Ok(base)
}
