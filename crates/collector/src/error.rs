//! Collection cycle errors

use common::{ApiError, ErrorCode};
use storage::StorageError;
use thiserror::Error;

/// Why a single collection cycle failed
///
/// Both arms carry an [`ApiError`], so a failed cycle reports the same
/// codes and attributes as the HTTP surfaces.
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("price request fail: {0}")]
    Price(#[source] ApiError),

    #[error("db write fail: {0}")]
    Write(#[source] ApiError),
}

impl CollectError {
    pub fn code(&self) -> ErrorCode {
        self.api_error().code
    }

    pub fn api_error(&self) -> &ApiError {
        match self {
            CollectError::Price(err) | CollectError::Write(err) => err,
        }
    }
}

impl From<StorageError> for CollectError {
    fn from(err: StorageError) -> Self {
        CollectError::Write(err.into())
    }
}
