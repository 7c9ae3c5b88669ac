use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Store returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode store response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid data: {message}")]
    InvalidData { message: String },
}

pub type RepositoryResult<T> = Result<T, StoreError>;
