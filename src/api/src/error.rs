//! Error taxonomy for the storage layers and the race-save pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    /// Raw input that cannot be normalized (unsupported unit, missing discipline, ...).
    #[error("Invalid race data: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid date string '{0}', expected ddMMyyyy")]
    InvalidDate(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Payload does not match the expected shape: {0}")]
    Payload(#[from] serde_json::Error),
}

impl DataError {
    pub fn validation(msg: impl Into<String>) -> Self {
        DataError::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        DataError::NotFound(what.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DataError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
