//! Lineage Relay Core Library
//!
//! Build lineage run events with [`EventBuilder`] and hand the snapshots to a
//! [`DispatchQueue`], whose background worker forwards them to a [`Sink`]
//! such as an OpenLineage collector.

pub mod config;
pub mod error;
pub mod events;
pub mod queues;
pub mod sinks;
pub mod workers;

// Re-export commonly used items at crate root
pub use config::{DispatchConfig, HttpSinkConfig};
pub use error::{LineageError, Result};
pub use events::{
    Dataset, EventBuilder, EventType, Facet, FacetAttachments, Facets, Job, LineageEvent, Run,
};
pub use queues::{CancelToken, DispatchQueue, Emitter, FifoReceiver, QueueKind, QueueState};
pub use sinks::{ConsoleSink, HttpSink, Sink};
pub use workers::{ForwarderStats, SinkForwarder, Worker};

/// Dispatch queue that forwards lineage events to an HTTP collector
/// configured from the environment.
pub type HttpDispatchQueue =
    DispatchQueue<LineageEvent, SinkForwarder<HttpSink, fn() -> Result<HttpSink>>>;

/// Start a queue that posts events to the collector named by
/// `OPENLINEAGE_URL`. The sink is built on the worker task.
pub fn start_http_dispatch(cfg: &DispatchConfig) -> Result<HttpDispatchQueue> {
    // Fail on the caller's side if the collector is not configured at all.
    HttpSinkConfig::from_env()?;

    let factory: fn() -> Result<HttpSink> = HttpSink::from_env;
    let mut queue = DispatchQueue::forwarding(factory, cfg)?;
    queue.start()?;
    Ok(queue)
}
