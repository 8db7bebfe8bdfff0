pub mod cancel;
pub mod dispatch;
pub mod fifo_queue;

pub use cancel::*;
pub use dispatch::*;
pub use fifo_queue::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueKind {
    #[default]
    Unbounded,
    FifoDropOldest {
        capacity: usize,
    },
}
