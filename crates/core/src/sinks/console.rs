use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::{error::Result, sinks::Sink};

/// Writes each item as a JSON line to the `tracing` output. Handy when no
/// collector is running.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

#[async_trait]
impl<T> Sink<T> for ConsoleSink
where
    T: Serialize + Send + Sync + 'static,
{
    async fn emit(&self, item: &T) -> Result<()> {
        let json = serde_json::to_string(item)?;
        info!(target: "lineage", event = %json, "lineage event");
        Ok(())
    }
}
