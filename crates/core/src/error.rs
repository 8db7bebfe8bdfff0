use thiserror::Error;

#[derive(Error, Debug)]
pub enum LineageError {
    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Dispatch worker is already started")]
    AlreadyStarted,

    #[error("Dispatch worker is not started")]
    NotStarted,

    #[error("Dispatch worker failed: {reason}")]
    WorkerFailed { reason: String },

    #[error("Facet {facet} is not attached")]
    NotAttached { facet: &'static str },

    #[error("Collector rejected event with status {status}: {body}")]
    DeliveryFailed { status: u16, body: String },

    #[error("JSON serialize error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Missing configuration: {env_var} environment variable is not set")]
    MissingEnv { env_var: String },
}

pub type Result<T> = std::result::Result<T, LineageError>;
