//! HTTP API exposing a single data source.
//!
//! ## Modules
//!
//! - `models` - Query parameters, response bodies and the error response
//! - `handlers` - Price and average handlers
//! - `routes` - Axum router

pub mod handlers;
pub mod models;
pub mod routes;

pub use models::{AverageBody, AverageParams, ErrorResponse, PriceBody, PriceParams};
pub use routes::datasource_routes;
