//! Storage Supervisor Error Types
//!
//! The supervisor swallows most runtime trouble (encode failures, flush
//! failures, pack failures) with a log line, because the pipeline is built
//! to prefer losing records over stopping. What does surface here is the
//! unrecoverable: startup failures and trim failures.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("trail error: {0}")]
    Trail(#[from] aviary_trail::Error),

    #[error("stream error: {0}")]
    Stream(#[from] aviary_stream::Error),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}
