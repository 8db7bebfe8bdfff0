use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum QueueState {
    Idle = 0,
    Running = 1,
    StopRequested = 2,
    Stopped = 3,
}

impl QueueState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => QueueState::Idle,
            1 => QueueState::Running,
            2 => QueueState::StopRequested,
            _ => QueueState::Stopped,
        }
    }
}

/// Stop request for one worker run.
///
/// A worker checks [`CancelToken::is_cancelled`] once its inbox is empty and
/// only exits then, so nothing queued before the request is lost.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

struct CancelInner {
    state: AtomicU8,
    notify_any: Arc<Notify>,
}

impl CancelToken {
    pub fn new(notify_any: Arc<Notify>) -> Self {
        Self {
            inner: Arc::new(CancelInner {
                state: AtomicU8::new(QueueState::Idle as u8),
                notify_any,
            }),
        }
    }

    pub fn state(&self) -> QueueState {
        QueueState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.state(),
            QueueState::StopRequested | QueueState::Stopped
        )
    }

    /// Request a stop and wake the worker if it is waiting. Idempotent; a
    /// token that already reached `Stopped` stays there.
    pub fn cancel(&self) {
        let _ = self
            .inner
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                match QueueState::from_u8(raw) {
                    QueueState::Idle | QueueState::Running => {
                        Some(QueueState::StopRequested as u8)
                    }
                    _ => None,
                }
            });
        self.inner.notify_any.notify_one();
    }

    pub(crate) fn mark_running(&self) {
        let _ = self.inner.state.compare_exchange(
            QueueState::Idle as u8,
            QueueState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub(crate) fn mark_stopped(&self) {
        self.inner
            .state
            .store(QueueState::Stopped as u8, Ordering::Release);
    }
}

/// Marks the token `Stopped` when the worker future finishes or unwinds.
pub(crate) struct StoppedOnDrop(pub(crate) CancelToken);

impl Drop for StoppedOnDrop {
    fn drop(&mut self) {
        self.0.mark_stopped();
    }
}
