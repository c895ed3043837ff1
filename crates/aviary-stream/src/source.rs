//! Upstream Record Source
//!
//! The multiplexer consumes an abstract terms-filtered feed. A concrete
//! source wraps the third-party streaming API; tests use scripted sources.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

/// Credentials for the upstream API, passed in at construction and never
/// persisted.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never leak secrets through Debug output.
        f.debug_struct("Credentials").finish_non_exhaustive()
    }
}

/// One event from the upstream feed.
#[derive(Debug, Clone)]
pub enum StreamEvent<T> {
    /// A record matching the current filter terms.
    Record(T),

    /// The filter matched more than the stream could deliver; `undelivered`
    /// counts what was missed.
    RateLimit { undelivered: u64 },

    /// The upstream's delivery queue is filling up.
    Stall {
        percent_full: i64,
        code: String,
        message: String,
    },

    /// The upstream ended the stream.
    Disconnect { reason: String },
}

/// A terms-filtered upstream feed.
///
/// `open` starts a fresh filtered stream and hands back its event channel;
/// opening again with new terms replaces the previous stream (dropping the
/// old receiver releases it).
#[async_trait]
pub trait EventSource: Send + 'static {
    type Record: Clone + Send + 'static;

    async fn open(&mut self, terms: &[String]) -> Result<mpsc::Receiver<StreamEvent<Self::Record>>>;
}
