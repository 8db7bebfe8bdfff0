use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::{
    config::HttpSinkConfig,
    error::{LineageError, Result},
    sinks::Sink,
};

/// Posts each item as JSON to a lineage collector.
pub struct HttpSink {
    client: reqwest::Client,
    lineage_url: String,
}

impl HttpSink {
    pub fn new(cfg: &HttpSinkConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(cfg.timeout).build()?;
        Ok(Self {
            client,
            lineage_url: cfg.lineage_url(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(&HttpSinkConfig::from_env()?)
    }

    pub fn lineage_url(&self) -> &str {
        &self.lineage_url
    }
}

#[async_trait]
impl<T> Sink<T> for HttpSink
where
    T: Serialize + Send + Sync + 'static,
{
    async fn emit(&self, item: &T) -> Result<()> {
        let response = self
            .client
            .post(&self.lineage_url)
            .header("Content-Type", "application/json")
            .json(item)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LineageError::DeliveryFailed {
                status: status.as_u16(),
                body,
            });
        }

        debug!(url = %self.lineage_url, status = status.as_u16(), "Lineage event delivered");
        Ok(())
    }
}
