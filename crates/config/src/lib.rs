//! PriceGW configuration file
//!
//! One YAML document may carry a section per service. A process only reads
//! the section for the subcommand it runs; command-line flags and their
//! environment variables override whatever the file says.
//!
//! ```yaml
//! gateway:
//!   symbol: BTCUSD
//!   price_sources:
//!     - binance:http://binance-ds
//!     - influxdb:http://influxdb-ds
//!   average_sources:
//!     - influxdb:http://influxdb-ds
//! influxdb:
//!   server_url: http://influxdb:8086
//!   org: pricegw
//!   bucket: prices
//!   token: ${IDB_TOKEN}
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod defaults;
pub mod parser;
pub mod sources;
pub mod substitution;
pub mod validator;

pub use parser::*;
pub use sources::*;
pub use substitution::*;
pub use validator::*;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PriceGwConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binance: Option<BinanceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub influxdb: Option<InfluxDbConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector: Option<CollectorConfig>,
}

impl PriceGwConfig {
    pub fn is_empty(&self) -> bool {
        self.gateway.is_none()
            && self.binance.is_none()
            && self.influxdb.is_none()
            && self.collector.is_none()
    }
}

/// Failover gateway
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// `id:url` entries, queried in order for prices
    #[serde(default)]
    pub price_sources: Vec<String>,
    /// `id:url` entries, queried in order for averages
    #[serde(default)]
    pub average_sources: Vec<String>,
    /// Symbol used when a request does not name one
    #[serde(default)]
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_timeout_ms: Option<u64>,
}

impl GatewayConfig {
    pub fn resolved_listen_addr(&self) -> &str {
        self.listen_addr
            .as_deref()
            .unwrap_or(defaults::DEFAULT_LISTEN_ADDR)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(
            self.source_timeout_ms
                .unwrap_or(defaults::DEFAULT_SOURCE_TIMEOUT_MS),
        )
    }
}

/// Binance-backed data source server
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BinanceConfig {
    /// Exchange API root; the public Binance.US API when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_addr: Option<String>,
}

impl BinanceConfig {
    pub fn resolved_listen_addr(&self) -> &str {
        self.listen_addr
            .as_deref()
            .unwrap_or(defaults::DEFAULT_LISTEN_ADDR)
    }
}

/// InfluxDB v2 connection settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct InfluxConnection {
    #[serde(default)]
    pub server_url: String,
    #[serde(default)]
    pub org: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub token: String,
}

/// InfluxDB-backed data source server
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct InfluxDbConfig {
    #[serde(flatten)]
    pub connection: InfluxConnection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_addr: Option<String>,
}

impl InfluxDbConfig {
    pub fn resolved_listen_addr(&self) -> &str {
        self.listen_addr
            .as_deref()
            .unwrap_or(defaults::DEFAULT_LISTEN_ADDR)
    }
}

/// Periodic price collector
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CollectorConfig {
    /// Data source server the collector samples
    #[serde(default)]
    pub datasource_base_url: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
    /// Where sampled prices are written
    #[serde(default)]
    pub influx: InfluxConnection,
}

impl CollectorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(
            self.interval_secs
                .unwrap_or(defaults::DEFAULT_COLLECTOR_INTERVAL_SECS),
        )
    }
}
