use thiserror::Error;

/// Settings persistence failures.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Cannot determine config directory")]
    NoConfigDir,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SettingsResult<T> = Result<T, SettingsError>;
