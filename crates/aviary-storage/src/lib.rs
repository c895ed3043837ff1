//! Storage Supervisor
//!
//! A long-running cooperative task that subscribes to a stream multiplexer,
//! batches incoming records, and maintains a [`aviary_trail::Trail`] on
//! their behalf: interval flushes, size- and time-triggered packs, and
//! budget-driven trims.
//!
//! ```text
//! upstream source → Multiplexer → StorageServer → Trail (active segment)
//!                                                   └─ pack → packed segment
//! ```
//!
//! Record schema conversion is external: the supervisor is handed a
//! record-to-bytes function at construction and treats its failures as
//! log-and-skip. Trim failures are fatal: once the disk state cannot be
//! trusted, the supervisor refuses to keep running.

mod config;
pub mod error;
mod metrics;
mod server;

pub use config::StorageConfig;
pub use error::{Error, Result};
pub use metrics::StorageMetrics;
pub use server::StorageServer;
