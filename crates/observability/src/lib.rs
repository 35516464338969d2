//! Observability infrastructure for PriceGW
//!
//! This crate provides:
//! - Structured logging via tracing
//! - Prometheus metrics for failover attempts and collection cycles
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! // Initialize logging
//! init_logging("gateway", LogFormat::Pretty)?;
//!
//! // Initialize metrics (optional)
//! observability::metrics::init_metrics(9090)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use self::metrics::{init_metrics, AttemptOutcome, CollectorMetrics};
