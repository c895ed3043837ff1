//! Stream Error Types
//!
//! Upstream failures are the only errors this crate produces itself; the
//! multiplexer's control operations report inability through return values
//! (`set_terms` → `false`, pre-closed sinks) rather than errors, because a
//! stopping multiplexer is a normal condition, not a fault.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The record source could not open or maintain a filtered stream.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// A metric handle could not be registered on the injected registry.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}
