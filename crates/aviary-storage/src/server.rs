//! Storage Server
//!
//! The supervisor's serve loop: one cooperative task driven by the
//! subscription sink and a set of timers. All trail access happens from
//! this task, so the trail's synchronous, possibly-blocking operations need
//! no further synchronization.

use std::time::{Duration, Instant};

use prometheus::{IntCounter, Registry};
use tokio::time::{interval_at, Interval};
use tracing::{error, info, warn};

use aviary_stream::{MultiplexerHandle, ShutdownHandle};
use aviary_trail::Trail;

use crate::config::StorageConfig;
use crate::error::Result;
use crate::metrics::StorageMetrics;

/// Unix permission bits for segment files.
const SEGMENT_FILE_MODE: u32 = 0o644;

/// Persists records from a multiplexer subscription into a trail.
///
/// ```ignore
/// let config = StorageConfig::new("/var/data/posts");
/// let server = StorageServer::new(config, mux_handle, encode_post, &registry)?;
/// let stop = server.shutdown_handle();
/// let running = tokio::spawn(server.serve());
///
/// // ... later ...
/// stop.request_stop();
/// running.await??;
/// ```
pub struct StorageServer<T, F> {
    config: StorageConfig,
    stream: MultiplexerHandle<T>,
    encode: F,
    shutdown: ShutdownHandle,
    metrics: StorageMetrics,
}

impl<T, F> StorageServer<T, F>
where
    T: Clone + Send + 'static,
    F: Fn(&T) -> anyhow::Result<Vec<u8>> + Send + 'static,
{
    /// Build a supervisor over `stream`, converting records with `encode`.
    /// Metrics are registered on the given registry.
    pub fn new(
        config: StorageConfig,
        stream: MultiplexerHandle<T>,
        encode: F,
        registry: &Registry,
    ) -> Result<Self> {
        let metrics = StorageMetrics::new(registry)?;
        Ok(Self {
            config,
            stream,
            encode,
            shutdown: ShutdownHandle::new(),
            metrics,
        })
    }

    /// Handle for requesting shutdown from another task. Stop completes the
    /// in-flight flush, closes the trail, and returns from [`serve`].
    ///
    /// [`serve`]: StorageServer::serve
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Run until stopped, the subscription closes, or a trim fails.
    ///
    /// Trim failure is fatal: the disk state can no longer be trusted, so
    /// the error propagates instead of being swallowed.
    pub async fn serve(self) -> Result<()> {
        let mut trail = match Trail::open(&self.config.dir, SEGMENT_FILE_MODE, true) {
            Ok(trail) => trail,
            Err(err) => {
                error!(dir = %self.config.dir.display(), error = %err, "unable to open trail");
                return Err(err.into());
            }
        };

        // Losing records beats blocking the broadcast: the subscription is
        // bounded and overflow is dropped at the multiplexer.
        let mut sink = self.stream.new_sink(self.config.sink_capacity);

        let trail_label = self.config.dir.display().to_string();
        let bytes_written = self.metrics.bytes_written.with_label_values(&[&trail_label]);
        let entries_written = self.metrics.entries_written.with_label_values(&[&trail_label]);

        let mut batch: Vec<T> = Vec::with_capacity(self.config.batch_size);

        let mut sync_tick = ticker(self.config.sync_interval);
        let mut pack_tick = ticker(self.config.pack_interval);
        let mut size_check_tick = ticker(self.config.pack_interval / 4);
        let mut trim_tick = ticker(self.config.trim_check_interval);

        let exit = loop {
            tokio::select! {
                _ = self.shutdown.stopped() => {
                    info!("storage server stopping");
                    self.flush(&mut trail, &mut batch, &bytes_written, &entries_written);
                    break Ok(());
                }
                received = sink.recv() => {
                    match received {
                        Some(record) => {
                            batch.push(record);
                            if batch.len() >= self.config.batch_size {
                                self.flush(&mut trail, &mut batch, &bytes_written, &entries_written);
                            }
                        }
                        None => {
                            warn!("subscription closed, no further records will arrive");
                            self.flush(&mut trail, &mut batch, &bytes_written, &entries_written);
                            break Ok(());
                        }
                    }
                }
                _ = sync_tick.tick() => {
                    self.flush(&mut trail, &mut batch, &bytes_written, &entries_written);
                }
                _ = size_check_tick.tick() => {
                    match trail.unpacked_size() {
                        Ok(size) if size > self.config.pack_size_threshold => {
                            if pack(&mut trail) {
                                pack_tick.reset();
                            }
                        }
                        Ok(_) => {}
                        Err(err) => {
                            error!(error = %err, "unable to compute active segment size");
                        }
                    }
                }
                _ = pack_tick.tick() => {
                    pack(&mut trail);
                }
                _ = trim_tick.tick() => {
                    if let Err(err) = self.enforce_budget(&trail) {
                        error!(error = %err, "trim failed, storage state is untrusted");
                        break Err(err);
                    }
                }
            }
        };

        self.stream.remove_sink(sink.id());
        if let Err(err) = trail.close() {
            error!(error = %err, "unable to close trail");
        }
        self.shutdown.mark_done();
        exit
    }

    /// Convert and append every batched record. Encode and append failures
    /// drop the record with a log line; the rest of the batch continues.
    fn flush(
        &self,
        trail: &mut Trail,
        batch: &mut Vec<T>,
        bytes_written: &IntCounter,
        entries_written: &IntCounter,
    ) {
        for record in batch.drain(..) {
            let payload = match (self.encode)(&record) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(error = %err, "unable to encode record, skipping");
                    continue;
                }
            };
            if let Err(err) = trail.append(&payload) {
                warn!(error = %err, "unable to append record");
                continue;
            }
            bytes_written.inc_by(payload.len() as u64);
            entries_written.inc();
        }
    }

    fn enforce_budget(&self, trail: &Trail) -> Result<()> {
        let segments = trail.compute_trim(self.config.disk_budget)?;
        if segments.is_empty() {
            return Ok(());
        }
        trail.trim(&segments)?;
        info!(?segments, "trim performed");
        Ok(())
    }
}

/// Interval whose first tick fires one period from now, not immediately.
fn ticker(period: Duration) -> Interval {
    let period = period.max(Duration::from_millis(1));
    interval_at((Instant::now() + period).into(), period)
}

fn pack(trail: &mut Trail) -> bool {
    match trail.pack() {
        Ok(()) => true,
        Err(err) => {
            error!(error = %err, "unable to pack trail");
            false
        }
    }
}
