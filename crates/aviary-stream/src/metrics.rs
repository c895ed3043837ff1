//! Stream Metrics
//!
//! Counters and gauges for the multiplexer, registered against an injected
//! registry. There is no process-global registry in this workspace; whoever
//! constructs the component decides where its metrics land.

use prometheus::{IntCounter, IntGauge, Registry};

use crate::error::Result;

#[derive(Clone)]
pub struct StreamMetrics {
    /// Records received from the upstream feed.
    pub tweets_recvd: IntCounter,

    /// Records no sink accepted.
    pub dropped_tweets: IntCounter,

    /// Upstream queue fullness from the latest stall warning.
    pub percent_full: IntGauge,

    /// Records the upstream reported undelivered (rate limiting).
    pub undelivered: IntGauge,
}

impl StreamMetrics {
    pub fn new(registry: &Registry) -> Result<Self> {
        let tweets_recvd = IntCounter::new("tweets_recvd", "Records received from upstream")?;
        let dropped_tweets = IntCounter::new("dropped_tweets", "Records accepted by no sink")?;
        let percent_full = IntGauge::new("percent_full", "Upstream queue fullness percentage")?;
        let undelivered =
            IntGauge::new("undelivered", "Records the upstream reported undelivered")?;

        registry.register(Box::new(tweets_recvd.clone()))?;
        registry.register(Box::new(dropped_tweets.clone()))?;
        registry.register(Box::new(percent_full.clone()))?;
        registry.register(Box::new(undelivered.clone()))?;

        Ok(Self {
            tweets_recvd,
            dropped_tweets,
            percent_full,
            undelivered,
        })
    }
}
