use std::{
    any::Any,
    marker::PhantomData,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::{
    error::Result,
    queues::{CancelToken, FifoReceiver},
    sinks::Sink,
    workers::Worker,
};

const FORWARDER_ID: &str = "lineage.sink_forwarder";

#[derive(Debug, Default)]
pub struct ForwarderStats {
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl ForwarderStats {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Worker that hands every queued item to a sink.
///
/// The sink is built by `factory` on the worker task each time the worker
/// starts, so connection setup never runs on the producer's side. A sink
/// error or panic only costs the item that caused it.
pub struct SinkForwarder<S, F> {
    factory: F,
    poll_interval: Duration,
    stats: Arc<ForwarderStats>,
    _sink: PhantomData<fn() -> S>,
}

impl<S, F> SinkForwarder<S, F>
where
    F: Fn() -> Result<S> + Send + Sync + 'static,
{
    pub fn new(factory: F, poll_interval: Duration) -> Self {
        Self {
            factory,
            poll_interval,
            stats: Arc::new(ForwarderStats::default()),
            _sink: PhantomData,
        }
    }

    pub fn stats(&self) -> Arc<ForwarderStats> {
        Arc::clone(&self.stats)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

#[async_trait]
impl<T, S, F> Worker<T> for SinkForwarder<S, F>
where
    T: Send + Sync + 'static,
    S: Sink<T> + 'static,
    F: Fn() -> Result<S> + Send + Sync + 'static,
{
    const WORKER_ID: &'static str = FORWARDER_ID;

    async fn run(&self, inbox: FifoReceiver<T>, cancel: CancelToken) -> Result<()> {
        let sink = match (self.factory)() {
            Ok(sink) => sink,
            Err(e) => {
                error!(worker = FORWARDER_ID, error = %e, "Failed to build sink");
                return Err(e);
            }
        };

        // Position of the item within this run, carried on failure logs.
        let mut seq: u64 = 0;

        loop {
            // Read before draining: everything queued ahead of the stop
            // request is delivered before we exit.
            let cancelled = cancel.is_cancelled();

            while let Some(item) = inbox.try_recv() {
                seq += 1;
                match AssertUnwindSafe(sink.emit(&item)).catch_unwind().await {
                    Ok(Ok(())) => {
                        self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(Err(e)) => {
                        self.stats.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            worker = FORWARDER_ID,
                            seq,
                            error = %e,
                            pending = inbox.len(),
                            "Failed to deliver item, continuing"
                        );
                    }
                    Err(payload) => {
                        self.stats.failed.fetch_add(1, Ordering::Relaxed);
                        error!(
                            worker = FORWARDER_ID,
                            seq,
                            panic = panic_message(&*payload),
                            pending = inbox.len(),
                            "Sink panicked while delivering item, continuing"
                        );
                    }
                }
            }

            if cancelled {
                debug!(
                    worker = FORWARDER_ID,
                    delivered = self.stats.delivered(),
                    failed = self.stats.failed(),
                    "Queue drained, worker exiting"
                );
                return Ok(());
            }

            inbox.wait(self.poll_interval).await;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}
