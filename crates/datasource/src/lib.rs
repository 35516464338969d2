//! Price data sources for PriceGW
//!
//! A data source answers two questions about a symbol: its price at an
//! instant and its average over an interval. This crate defines those
//! capabilities and ships the concrete backends plus the HTTP surface that
//! exposes a single backend.
//!
//! # Modules
//!
//! - [`source`] - `PriceSource` / `AverageSource` capabilities and `IdentifiedSource`
//! - [`binance`] - Exchange-backed source using the Binance klines API
//! - [`influxdb`] - Time-series source using the InfluxDB v2 query API
//! - [`api`] - Axum router exposing one backend over HTTP
//! - [`client`] - `HttpDataSource`, a source that calls a remote [`api`] server
//! - [`mock`] - Scripted in-memory source for tests

pub mod api;
pub mod binance;
pub mod client;
pub mod influxdb;
pub mod mock;
pub mod source;

mod util;

pub use binance::{BinanceApi, BinanceDataSource};
pub use client::HttpDataSource;
pub use influxdb::InfluxDbDataSource;
pub use source::{AverageSource, DataSource, IdentifiedSource, PriceSource, SourceIdentity};
