use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::sync::Notify;

use crate::queues::QueueKind;

/// Multi-producer FIFO shared with a single [`FifoReceiver`].
///
/// Pushing never blocks on the consumer. With
/// [`QueueKind::FifoDropOldest`] a full queue evicts its oldest item to make
/// room and counts the eviction.
pub struct FifoQueue<T> {
    inner: Arc<FifoInner<T>>,
}

struct FifoInner<T> {
    buf: Mutex<VecDeque<T>>,
    capacity: Option<usize>,
    notify_any: Arc<Notify>,
    dropped: AtomicU64,
}

pub struct FifoReceiver<T> {
    inner: Arc<FifoInner<T>>,
}

impl<T> FifoInner<T> {
    // A panicking producer cannot leave the deque half-written, so a
    // poisoned lock is still safe to use.
    fn buf(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> FifoQueue<T> {
    pub fn new(kind: QueueKind, notify_any: Arc<Notify>) -> Self {
        let capacity = match kind {
            QueueKind::Unbounded => None,
            QueueKind::FifoDropOldest { capacity } => Some(capacity.max(1)),
        };

        Self {
            inner: Arc::new(FifoInner {
                buf: Mutex::new(VecDeque::with_capacity(capacity.unwrap_or(16))),
                capacity,
                notify_any,
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Append `value`, returning the item evicted to make room, if any.
    pub fn push(&self, value: T) -> Option<T> {
        let mut buf = self.inner.buf();
        let evicted = match self.inner.capacity {
            Some(capacity) if buf.len() >= capacity => buf.pop_front(),
            _ => None,
        };
        buf.push_back(value);
        drop(buf);

        if evicted.is_some() {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.notify_any.notify_one();
        evicted
    }

    pub fn receiver(&self) -> FifoReceiver<T> {
        FifoReceiver {
            inner: self.inner.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.buf().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl<T> Clone for FifoQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> FifoReceiver<T> {
    pub fn try_recv(&self) -> Option<T> {
        self.inner.buf().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.buf().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sleep until a producer pushes, someone pokes the shared notifier, or
    /// `timeout` elapses.
    pub async fn wait(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.inner.notify_any.notified()).await;
    }
}
