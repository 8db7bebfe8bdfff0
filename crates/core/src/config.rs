use std::time::Duration;

use crate::{
    error::{LineageError, Result},
    queues::QueueKind,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_ENDPOINT: &str = "api/v1/lineage";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

pub const URL_ENV_VAR: &str = "OPENLINEAGE_URL";
pub const ENDPOINT_ENV_VAR: &str = "OPENLINEAGE_ENDPOINT";
pub const TIMEOUT_ENV_VAR: &str = "OPENLINEAGE_TIMEOUT_SECS";

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Longest the worker sleeps between drains when nothing wakes it.
    pub poll_interval: Duration,
    pub queue_kind: QueueKind,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            queue_kind: QueueKind::Unbounded,
        }
    }
}

impl DispatchConfig {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_queue_kind(mut self, queue_kind: QueueKind) -> Self {
        self.queue_kind = queue_kind;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(LineageError::InvalidField {
                field: "poll_interval",
                reason: "must be > 0".to_string(),
            });
        }
        if let QueueKind::FifoDropOldest { capacity: 0 } = self.queue_kind {
            return Err(LineageError::InvalidField {
                field: "capacity",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    pub url: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl HttpSinkConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Read the collector location from `OPENLINEAGE_URL`, with optional
    /// `OPENLINEAGE_ENDPOINT` and `OPENLINEAGE_TIMEOUT_SECS` overrides.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let url = lookup(URL_ENV_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| LineageError::MissingEnv {
                env_var: URL_ENV_VAR.to_string(),
            })?;
        let mut cfg = Self::new(url);

        if let Some(endpoint) = lookup(ENDPOINT_ENV_VAR) {
            cfg.endpoint = endpoint;
        }

        if let Some(raw) = lookup(TIMEOUT_ENV_VAR) {
            let secs: u64 = raw.trim().parse().map_err(|_| LineageError::InvalidField {
                field: "timeout",
                reason: format!("{TIMEOUT_ENV_VAR}={raw} is not a whole number of seconds"),
            })?;
            cfg.timeout = Duration::from_secs(secs);
        }

        Ok(cfg)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn lineage_url(&self) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            self.endpoint.trim_start_matches('/')
        )
    }
}
