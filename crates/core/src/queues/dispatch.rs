use std::sync::Arc;

use tokio::{runtime::Handle, sync::Notify, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    config::DispatchConfig,
    error::{LineageError, Result},
    queues::{CancelToken, FifoQueue, QueueState, StoppedOnDrop},
    sinks::Sink,
    workers::{SinkForwarder, Worker},
};

/// Cloneable producer side of a [`DispatchQueue`], for handing to other
/// threads or tasks.
pub struct Emitter<T> {
    queue: FifoQueue<T>,
}

impl<T> Emitter<T> {
    pub fn emit(&self, item: T) {
        if self.queue.push(item).is_some() {
            warn!(
                dropped_total = self.queue.dropped(),
                "Dispatch queue full, dropped oldest item"
            );
        }
    }
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

/// A FIFO of items plus the background worker that drains it.
///
/// `emit` only enqueues; delivery happens on the worker task spawned by
/// `start`. Stopping is cooperative: the worker finishes whatever is queued
/// before it exits.
pub struct DispatchQueue<T, W> {
    worker: Arc<W>,
    queue: FifoQueue<T>,
    notify_any: Arc<Notify>,
    task: Option<JoinHandle<Result<()>>>,
    cancel: Option<CancelToken>,
}

impl<T, W> std::fmt::Debug for DispatchQueue<T, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchQueue").finish_non_exhaustive()
    }
}

impl<T, W> DispatchQueue<T, W>
where
    T: Send + 'static,
    W: Worker<T>,
{
    pub fn create(worker: W, cfg: &DispatchConfig) -> Result<Self> {
        cfg.validate()?;

        let notify_any = Arc::new(Notify::new());
        Ok(Self {
            worker: Arc::new(worker),
            queue: FifoQueue::new(cfg.queue_kind, Arc::clone(&notify_any)),
            notify_any,
            task: None,
            cancel: None,
        })
    }

    pub fn create_and_start(worker: W, cfg: &DispatchConfig) -> Result<Self> {
        let mut queue = Self::create(worker, cfg)?;
        queue.start()?;
        Ok(queue)
    }

    /// Spawn the worker on the current tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        if self.task.is_some() {
            return Err(LineageError::AlreadyStarted);
        }
        let runtime = Handle::try_current().map_err(|e| LineageError::WorkerFailed {
            reason: format!("no tokio runtime to spawn on: {e}"),
        })?;

        let cancel = CancelToken::new(Arc::clone(&self.notify_any));
        cancel.mark_running();

        let worker = Arc::clone(&self.worker);
        let inbox = self.queue.receiver();
        let token = cancel.clone();
        self.task = Some(runtime.spawn(async move {
            let _stopped = StoppedOnDrop(token.clone());
            worker.run(inbox, token).await
        }));
        self.cancel = Some(cancel);

        info!(worker = <W as Worker<T>>::WORKER_ID, "Dispatch worker started");
        Ok(())
    }

    pub fn emit(&self, item: T) {
        self.emitter().emit(item);
    }

    pub fn emitter(&self) -> Emitter<T> {
        Emitter {
            queue: self.queue.clone(),
        }
    }

    /// Ask the worker to stop without waiting for it. The handle is released
    /// right away, so `start` may be called again while the old worker is
    /// still draining.
    pub fn stop(&mut self) {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
        if self.task.take().is_some() {
            info!(
                worker = <W as Worker<T>>::WORKER_ID,
                pending = self.queue.len(),
                "Dispatch worker stop requested"
            );
        }
    }

    /// Ask the worker to stop and wait until it has drained the queue and
    /// exited.
    pub async fn join(&mut self) -> Result<()> {
        let task = self.task.take().ok_or(LineageError::NotStarted)?;
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
        debug!(
            worker = <W as Worker<T>>::WORKER_ID,
            pending = self.queue.len(),
            "Waiting for dispatch worker to drain"
        );

        let outcome = match task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(LineageError::WorkerFailed {
                reason: e.to_string(),
            }),
            Err(e) => Err(LineageError::WorkerFailed {
                reason: e.to_string(),
            }),
        };

        info!(
            worker = <W as Worker<T>>::WORKER_ID,
            ok = outcome.is_ok(),
            "Dispatch worker joined"
        );
        outcome
    }

    pub fn state(&self) -> QueueState {
        self.cancel
            .as_ref()
            .map(CancelToken::state)
            .unwrap_or(QueueState::Idle)
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Items waiting to be picked up by the worker.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    pub fn worker(&self) -> &W {
        &self.worker
    }
}

impl<T, S, F> DispatchQueue<T, SinkForwarder<S, F>>
where
    T: Send + Sync + 'static,
    S: Sink<T> + 'static,
    F: Fn() -> Result<S> + Send + Sync + 'static,
{
    /// Queue whose worker builds a sink with `factory` and forwards every
    /// item to it.
    pub fn forwarding(factory: F, cfg: &DispatchConfig) -> Result<Self> {
        Self::create(SinkForwarder::new(factory, cfg.poll_interval), cfg)
    }
}

impl<T, W> Drop for DispatchQueue<T, W> {
    fn drop(&mut self) {
        if self.task.is_none() {
            return;
        }
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
    }
}
