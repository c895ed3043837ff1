//! Multiplexer Serve Loop and Control Handle
//!
//! One producer task ([`Multiplexer::serve`]) selects over the upstream
//! event channel, the terms channel, and the stop signal. Control operations
//! arrive from any task through a cloneable [`MultiplexerHandle`].

use std::sync::Arc;

use prometheus::Registry;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::Result;
use crate::metrics::StreamMetrics;
use crate::shutdown::ShutdownHandle;
use crate::sink::{Sink, SinkId, SinkSet};
use crate::source::{EventSource, StreamEvent};

/// The producer side: owns the upstream source and drives the fan-out.
pub struct Multiplexer<S: EventSource> {
    source: S,
    terms: Vec<String>,
    terms_rx: mpsc::Receiver<Vec<String>>,
    sinks: Arc<SinkSet<S::Record>>,
    shutdown: ShutdownHandle,
    metrics: StreamMetrics,
}

/// Cloneable control surface over a running multiplexer.
pub struct MultiplexerHandle<T> {
    terms_tx: mpsc::Sender<Vec<String>>,
    sinks: Arc<SinkSet<T>>,
    shutdown: ShutdownHandle,
}

impl<T> Clone for MultiplexerHandle<T> {
    fn clone(&self) -> Self {
        Self {
            terms_tx: self.terms_tx.clone(),
            sinks: Arc::clone(&self.sinks),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<S: EventSource> Multiplexer<S> {
    /// Build a multiplexer over `source`, initially filtering on `terms`.
    /// Metrics are registered on the given registry.
    pub fn new(
        source: S,
        terms: Vec<String>,
        registry: &Registry,
    ) -> Result<(Self, MultiplexerHandle<S::Record>)> {
        let metrics = StreamMetrics::new(registry)?;
        let (terms_tx, terms_rx) = mpsc::channel(1);
        let sinks = Arc::new(SinkSet::new());
        let shutdown = ShutdownHandle::new();

        let handle = MultiplexerHandle {
            terms_tx,
            sinks: Arc::clone(&sinks),
            shutdown: shutdown.clone(),
        };
        let mux = Self {
            source,
            terms,
            terms_rx,
            sinks,
            shutdown,
            metrics,
        };
        Ok((mux, handle))
    }

    /// Run the fan-out until the upstream disconnects or stop is requested.
    ///
    /// On exit every sink is closed (the sink-set lock is held while
    /// closing) and the completion signal fires, releasing anyone blocked
    /// in [`MultiplexerHandle::stop`].
    pub async fn serve(mut self) {
        info!(terms = ?self.terms, "starting stream");
        let result = self.run().await;
        if let Err(err) = &result {
            warn!(error = %err, "stream terminated");
        }
        self.sinks.close_all();
        self.shutdown.mark_done();
        info!("stream output closed");
    }

    async fn run(&mut self) -> Result<()> {
        let mut upstream = self.source.open(&self.terms).await?;
        loop {
            tokio::select! {
                _ = self.shutdown.stopped() => {
                    info!("stop requested");
                    return Ok(());
                }
                new_terms = self.terms_rx.recv() => {
                    // The control channel outlives us; `None` is unreachable
                    // while a handle exists, but treat it as a stop anyway.
                    let Some(new_terms) = new_terms else { return Ok(()) };
                    info!(terms = ?new_terms, "reopening stream with new terms");
                    self.terms = new_terms;
                    upstream = self.source.open(&self.terms).await?;
                }
                event = upstream.recv() => {
                    let Some(event) = event else {
                        info!("upstream stream closed");
                        return Ok(());
                    };
                    if self.handle_event(event) {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Apply one upstream event. Returns `true` when the loop should end.
    fn handle_event(&self, event: StreamEvent<S::Record>) -> bool {
        match event {
            StreamEvent::Record(record) => {
                self.metrics.tweets_recvd.inc();
                let accepted = self.sinks.broadcast(&record);
                if accepted == 0 {
                    self.metrics.dropped_tweets.inc();
                }
                false
            }
            StreamEvent::RateLimit { undelivered } => {
                self.metrics.undelivered.set(undelivered as i64);
                false
            }
            StreamEvent::Stall {
                percent_full,
                code,
                message,
            } => {
                warn!(event = "stall-warning", percent_full, code = %code, "{}", message);
                self.metrics.percent_full.set(percent_full);
                false
            }
            StreamEvent::Disconnect { reason } => {
                warn!(event = "disconnect", reason = %reason, "upstream disconnected");
                true
            }
        }
    }
}

impl<T: Clone + Send + 'static> MultiplexerHandle<T> {
    /// Offer a new term list to the running multiplexer.
    ///
    /// Returns `true` if the terms were delivered, `false` if the
    /// multiplexer is stopping. Never blocks forever against a stopped
    /// multiplexer: the serve loop either drains the channel or is gone.
    pub async fn set_terms(&self, terms: Vec<String>) -> bool {
        if self.shutdown.is_stop_requested() {
            return false;
        }
        tokio::select! {
            sent = self.terms_tx.send(terms) => sent.is_ok(),
            _ = self.shutdown.done() => false,
        }
    }

    /// Subscribe with a bounded queue of `capacity` records. If the
    /// multiplexer is already stopping the sink comes back pre-closed.
    pub fn new_sink(&self, capacity: usize) -> Sink<T> {
        self.sinks.add(capacity)
    }

    /// Unsubscribe and close one sink. Idempotent.
    pub fn remove_sink(&self, id: SinkId) {
        self.sinks.remove(id);
    }

    /// Signal the serve loop to stop and wait until it has closed every
    /// sink.
    pub async fn stop(&self) {
        self.shutdown.request_stop();
        self.shutdown.done().await;
    }
}
