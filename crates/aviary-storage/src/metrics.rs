//! Storage Metrics
//!
//! Write-path counters labeled by trail directory, registered against an
//! injected registry.

use prometheus::{IntCounterVec, Opts, Registry};

use crate::error::Result;

#[derive(Clone)]
pub struct StorageMetrics {
    /// Payload bytes appended, per trail.
    pub bytes_written: IntCounterVec,

    /// Entries appended, per trail.
    pub entries_written: IntCounterVec,
}

impl StorageMetrics {
    pub fn new(registry: &Registry) -> Result<Self> {
        let bytes_written = IntCounterVec::new(
            Opts::new("bytes_written", "Payload bytes appended to the trail"),
            &["trail"],
        )?;
        let entries_written = IntCounterVec::new(
            Opts::new("entries_written", "Entries appended to the trail"),
            &["trail"],
        )?;

        registry.register(Box::new(bytes_written.clone()))?;
        registry.register(Box::new(entries_written.clone()))?;

        Ok(Self {
            bytes_written,
            entries_written,
        })
    }
}
