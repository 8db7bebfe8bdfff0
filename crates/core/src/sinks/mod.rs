pub mod console;
pub mod http;

pub use console::*;
pub use http::*;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Delivery target for dispatched items. An `Err` means this one item was not
/// delivered; the caller decides whether to carry on.
#[async_trait]
pub trait Sink<T: Send + Sync + 'static>: Send + Sync {
    async fn emit(&self, item: &T) -> Result<()>;
}

#[async_trait]
impl<T, S> Sink<T> for Arc<S>
where
    T: Send + Sync + 'static,
    S: Sink<T> + ?Sized,
{
    async fn emit(&self, item: &T) -> Result<()> {
        (**self).emit(item).await
    }
}

#[async_trait]
impl<T> Sink<T> for Box<dyn Sink<T>>
where
    T: Send + Sync + 'static,
{
    async fn emit(&self, item: &T) -> Result<()> {
        (**self).emit(item).await
    }
}
