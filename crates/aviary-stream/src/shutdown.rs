//! Level-Triggered Shutdown Handles
//!
//! A pair of watch channels: one carries the stop request, the other the
//! completion acknowledgement. Stop is level-triggered: a task observing
//! the signal finishes its in-flight work, releases resources, and marks
//! itself done; late subscribers still see the signal.

use tokio::sync::watch;

/// Handle for requesting and awaiting a task's shutdown.
#[derive(Clone)]
pub struct ShutdownHandle {
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);
        Self {
            stop_tx,
            stop_rx,
            done_tx,
            done_rx,
        }
    }

    /// Request shutdown. Idempotent.
    pub fn request_stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.stop_rx.borrow()
    }

    /// Wait until shutdown is requested.
    pub async fn stopped(&self) {
        let mut rx = self.stop_rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Mark the owning task's cleanup as complete.
    pub fn mark_done(&self) {
        let _ = self.done_tx.send(true);
    }

    /// Wait until the owning task has finished its cleanup.
    pub async fn done(&self) {
        let mut rx = self.done_rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}
