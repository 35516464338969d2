//! Common types and utilities for PriceGW
//!
//! This crate provides the types shared by every PriceGW crate: the
//! structured error model that travels across HTTP boundaries and the
//! price/average value types that data sources produce.
//!
//! # Modules
//!
//! - [`error`] - `ApiError` and its `ErrorCode` set
//! - [`types`] - `Granularity`, `PriceQuote`, `AverageQuote`

pub mod error;
pub mod types;

pub use error::{ApiError, ErrorCode, Result};
pub use types::*;
