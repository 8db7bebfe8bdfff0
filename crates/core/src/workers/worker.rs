use async_trait::async_trait;

use crate::{
    error::Result,
    queues::{CancelToken, FifoReceiver},
};

/// Body of a dispatch queue's background task.
///
/// `run` owns the consuming side of the queue until it returns. It must keep
/// draining `inbox` until it is empty and `cancel` has been requested, and
/// should wait on [`FifoReceiver::wait`] between drains instead of spinning.
#[async_trait]
pub trait Worker<T: Send + 'static>: Send + Sync + 'static {
    const WORKER_ID: &'static str;

    async fn run(&self, inbox: FifoReceiver<T>, cancel: CancelToken) -> Result<()>;
}
