use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode service response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unsupported media type: {0}")]
    UnsupportedType(String),

    #[error("Service reported failure: {0}")]
    Failed(String),

    #[error("Service response missing field: {0}")]
    MissingField(&'static str),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
