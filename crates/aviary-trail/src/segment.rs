//! Active Segment
//!
//! The single writable segment of a trail: a gzip stream at best compression
//! over `active.gz`, plus the running Koopman CRC32 of every payload written
//! to it. Packing finishes the gzip stream, fsyncs, and either deletes the
//! file (nothing was ever appended) or renames it to its content-addressed
//! packed name within the same directory. Rename-within-directory is atomic,
//! and the source name is unique, so no temp-file dance is needed.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crc::Digest;
use flate2::write::GzEncoder;
use flate2::Compression;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use aviary_core::checksum;

use crate::entry;
use crate::error::{Error, Result};

/// On-disk name of the writable segment.
pub(crate) const ACTIVE_NAME: &str = "active.gz";

lazy_static! {
    pub(crate) static ref RE_PACKED_SEGMENT: Regex =
        Regex::new(r"^\d+_\d+_[0-9a-f]+_[0-9a-f]+\.segment\.gz$").expect("pattern compiles");
}

pub(crate) struct ActiveSegment {
    path: PathBuf,
    writer: GzEncoder<File>,
    digest: Digest<'static, u32>,
    dirty: bool,
}

impl std::fmt::Debug for ActiveSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveSegment")
            .field("path", &self.path)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

impl ActiveSegment {
    /// Open `active.gz` inside `dir`. Without `truncate_existing` the open
    /// is exclusive-create; a leftover active segment from an earlier run
    /// fails with [`Error::AlreadyActive`].
    pub(crate) fn create(dir: &Path, mode: u32, truncate_existing: bool) -> Result<Self> {
        let path = dir.join(ACTIVE_NAME);
        let mut opts = OpenOptions::new();
        opts.write(true);
        if truncate_existing {
            opts.create(true).truncate(true);
        } else {
            opts.create_new(true);
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;

        let file = opts.open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                Error::AlreadyActive(path.clone())
            } else {
                Error::Io(e)
            }
        })?;

        Ok(Self {
            path,
            writer: GzEncoder::new(file, Compression::best()),
            digest: checksum::digest(),
            dirty: false,
        })
    }

    /// Append one framed entry. The digest accumulates only the payload
    /// bytes, not the framing or the compressed output.
    pub(crate) fn append(&mut self, payload: &[u8]) -> Result<u64> {
        self.dirty = true;
        let written = entry::write_entry(&mut self.writer, payload)?;
        self.digest.update(payload);
        Ok(written)
    }

    /// Finish the gzip stream, fsync and close the file, then promote or
    /// discard it. Returns the packed name, or `None` when the segment was
    /// empty and therefore deleted.
    pub(crate) fn pack_and_close(self) -> Result<Option<String>> {
        let file = self.writer.finish()?;
        file.sync_all()?;
        drop(file);

        if !self.dirty {
            fs::remove_file(&self.path)?;
            return Ok(None);
        }

        let sum = self.digest.finalize();
        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        loop {
            let name = packed_name(Utc::now(), sum);
            // A candidate that collides with, or would sort before, an
            // existing packed name means two packs landed in the same
            // millisecond; wait for a fresh clock reading so lexicographic
            // order stays chronological.
            if !sorts_after_existing(&dir, &name)? {
                std::thread::sleep(Duration::from_millis(1));
                continue;
            }
            fs::rename(&self.path, &dir.join(&name))?;
            debug!(segment = %name, "packed segment");
            return Ok(Some(name));
        }
    }

    /// On-disk size of `active.gz`. The gzip writer buffers in memory, so
    /// this lags the logical size and is only a lower bound.
    pub(crate) fn disk_size(&self) -> Result<u64> {
        Ok(fs::symlink_metadata(&self.path)?.len())
    }
}

fn sorts_after_existing(dir: &Path, candidate: &str) -> Result<bool> {
    for dirent in fs::read_dir(dir)? {
        let dirent = dirent?;
        if let Some(existing) = dirent.file_name().to_str() {
            if RE_PACKED_SEGMENT.is_match(existing) && existing >= candidate {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

fn packed_name(now: DateTime<Utc>, sum: u32) -> String {
    format!(
        "{}_{:03x}_{:08x}.segment.gz",
        now.format("%Y%m%d_%H%M%S"),
        now.timestamp_subsec_millis(),
        sum
    )
}
