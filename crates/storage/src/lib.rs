//! Price storage for PriceGW
//!
//! This crate provides the [`Writer`] capability used by the periodic
//! collector and its InfluxDB implementation.
//!
//! # Modules
//!
//! - [`writer`] - `Writer` trait and `InfluxDbWriter`
//! - [`mock`] - Recording writer for tests
//! - [`error`] - `StorageError`

pub mod error;
pub mod mock;
pub mod writer;

pub use error::StorageError;
pub use writer::{InfluxDbWriter, Writer};

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
