//! Error types for Linkshelf

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShelfError>;

#[derive(Error, Debug)]
pub enum ShelfError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl ShelfError {
    pub fn validation(message: impl Into<String>) -> Self {
        ShelfError::Validation(message.into())
    }

    /// Errors that the API layer reports as the caller's fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, ShelfError::Validation(_) | ShelfError::NotFound(_))
    }
}

impl From<serde_json::Error> for ShelfError {
    fn from(e: serde_json::Error) -> Self {
        ShelfError::Serialization(e.to_string())
    }
}
