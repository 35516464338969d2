//! Storage error types

use common::{ApiError, ErrorCode};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// The store answered with a non-success status
    #[error("Write rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Connection(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        let msg = err.to_string();
        match err {
            StorageError::Connection(e) => {
                ApiError::with_message(ErrorCode::RequestFailed, msg).with_attr("err", e)
            }
            StorageError::Rejected { status, body } => {
                ApiError::with_message(ErrorCode::BadStatusCode, msg)
                    .with_attr("statusCode", status)
                    .with_attr("resp", body)
            }
            StorageError::Config(_) => ApiError::internal(msg),
        }
    }
}
