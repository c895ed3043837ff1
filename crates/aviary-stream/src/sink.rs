//! Subscriber Sinks
//!
//! Each subscriber owns a [`Sink`]: the receiving half of a bounded queue
//! keyed by a [`SinkId`] in the multiplexer's shared sink set. Membership
//! changes and broadcast both serialize on one mutex, held briefly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;

/// Identifies one subscription within a multiplexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

/// One subscriber's bounded record queue.
///
/// Closed when the subscription is removed or the multiplexer shuts down;
/// after that `recv` drains whatever was already enqueued and then yields
/// `None`.
pub struct Sink<T> {
    id: SinkId,
    rx: mpsc::Receiver<T>,
}

impl<T> Sink<T> {
    pub fn id(&self) -> SinkId {
        self.id
    }

    /// The next record, in upstream order, or `None` once the sink is
    /// closed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`Sink::recv`].
    pub fn try_recv(&mut self) -> Result<T, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }
}

/// The multiplexer's set of live sinks.
pub(crate) struct SinkSet<T> {
    senders: Mutex<HashMap<SinkId, mpsc::Sender<T>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl<T: Clone> SinkSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            senders: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Create a sink with `capacity` slots. A sink created after the set
    /// closed is born closed: its sender is dropped immediately.
    pub(crate) fn add(&self, capacity: usize) -> Sink<T> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = SinkId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut senders = self.senders.lock().expect("sink set lock");
        if !self.closed.load(Ordering::Acquire) {
            senders.insert(id, tx);
        }
        Sink { id, rx }
    }

    /// Remove and close one sink. A no-op for ids already removed.
    pub(crate) fn remove(&self, id: SinkId) {
        let mut senders = self.senders.lock().expect("sink set lock");
        senders.remove(&id);
    }

    /// Offer `record` to every sink without blocking. Returns the number of
    /// sinks that accepted it.
    pub(crate) fn broadcast(&self, record: &T) -> usize {
        let senders = self.senders.lock().expect("sink set lock");
        let mut accepted = 0;
        for tx in senders.values() {
            if tx.try_send(record.clone()).is_ok() {
                accepted += 1;
            }
        }
        accepted
    }

    /// Close every sink and refuse new live ones. The lock is held for the
    /// duration of the close.
    pub(crate) fn close_all(&self) {
        let mut senders = self.senders.lock().expect("sink set lock");
        self.closed.store(true, Ordering::Release);
        senders.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.senders.lock().expect("sink set lock").len()
    }
}
