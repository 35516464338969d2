//! Failover aggregation gateway for PriceGW
//!
//! The gateway holds an ordered list of backends per capability and answers
//! each request from the first backend that succeeds. When every backend
//! fails, the caller receives a single `NO_DATA_SOURCE_AVAILABLE` error
//! carrying each backend's failure keyed by its identity.
//!
//! # Modules
//!
//! - [`failover`] - The try-in-order aggregator and its `ErrorSet`
//! - [`router`] - Axum router exposing the aggregator over HTTP

pub mod failover;
pub mod router;

pub use failover::{ErrorSet, Failover, FailoverError, Sourced};
pub use router::{gateway_routes, GatewayState};
