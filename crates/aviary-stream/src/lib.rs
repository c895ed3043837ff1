//! Fan-out Stream Multiplexer
//!
//! One producer task reads events from an upstream record source and
//! broadcasts records to a dynamic set of bounded subscriber sinks. The hot
//! path never blocks: a sink that cannot keep up misses records instead of
//! slowing the upstream down.
//!
//! ## Pieces
//!
//! - [`EventSource`]: the abstract upstream, a terms-filtered feed yielding
//!   [`StreamEvent`]s. Concrete implementations (the third-party API client)
//!   live outside this crate.
//! - [`Multiplexer`]: the serve loop. Owns the upstream connection, reopens
//!   it when new filter terms arrive, and fans records out.
//! - [`MultiplexerHandle`]: cloneable control surface for subscribing,
//!   unsubscribing, changing terms, and stopping.
//! - [`Sink`]: one subscriber's bounded queue.
//!
//! ## Delivery Semantics
//!
//! Broadcast walks the sink set under a mutex and attempts a non-blocking
//! enqueue on each sink; a full sink misses that record. A record accepted
//! by no sink at all counts once on the drop counter. Within a single sink,
//! records arrive in upstream order; across sinks there is no ordering
//! guarantee.

pub mod error;
mod metrics;
mod multiplexer;
mod shutdown;
mod sink;
mod source;

pub use error::{Error, Result};
pub use metrics::StreamMetrics;
pub use multiplexer::{Multiplexer, MultiplexerHandle};
pub use shutdown::ShutdownHandle;
pub use sink::{Sink, SinkId};
pub use source::{Credentials, EventSource, StreamEvent};
