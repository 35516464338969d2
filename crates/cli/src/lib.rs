//! Command line of the `pricegw` binary
//!
//! Every service flag can also be set through the environment variable
//! named in its help text. Flags left unset fall back to the `--config`
//! file and then to built-in defaults.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub const LOG_FORMATS: [&str; 3] = ["pretty", "json", "compact"];

#[derive(Parser, Debug)]
#[command(name = "pricegw")]
#[command(about = "PriceGW - failover price gateway, data source servers and price collector")]
#[command(version)]
pub struct Cli {
    /// Log output format
    #[arg(
        long,
        global = true,
        env = "PRICEGW_LOG_FORMAT",
        default_value = "pretty",
        value_parser = LOG_FORMATS
    )]
    pub log_format: String,

    /// Expose Prometheus metrics on this port
    #[arg(long, global = true, env = "PRICEGW_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve prices from the first data source that answers
    Gateway(GatewayArgs),

    /// Serve prices from the Binance kline API
    Binance(BinanceArgs),

    /// Serve prices stored in InfluxDB
    Influxdb(InfluxDbArgs),

    /// Sample a data source periodically and store the prices in InfluxDB
    Collector(CollectorArgs),

    /// Validate a configuration file without starting anything
    Validate {
        /// Path to the configuration file
        #[arg(short, long, default_value = "pricegw.yaml")]
        config: PathBuf,
    },

    /// Write a configuration template
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "pricegw.yaml")]
        output: PathBuf,
    },
}

impl Commands {
    /// Service name used in logs and the health route
    pub fn service_name(&self) -> &'static str {
        match self {
            Commands::Gateway(_) => "gateway",
            Commands::Binance(_) => "binance",
            Commands::Influxdb(_) => "influxdb",
            Commands::Collector(_) => "collector",
            Commands::Validate { .. } => "validate",
            Commands::Init { .. } => "init",
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct GatewayArgs {
    /// Configuration file with a `gateway` section
    #[arg(short, long, env = "PRICEGW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Price sources as `id:url,id:url`, queried in order
    #[arg(long, env = "GW_PRICE_DATASOURCE")]
    pub price_sources: Option<String>,

    /// Average sources as `id:url,id:url`, queried in order
    #[arg(long, env = "GW_AVERAGE_DATASOURCE")]
    pub average_sources: Option<String>,

    /// `:port` or `host:port` [default: :80]
    #[arg(long, env = "GW_LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    /// Symbol used when a request does not name one
    #[arg(long, env = "GW_SYMBOL")]
    pub symbol: Option<String>,

    /// Per-source deadline in milliseconds [default: 30000]
    #[arg(long, env = "GW_SOURCE_TIMEOUT_MS")]
    pub source_timeout_ms: Option<u64>,
}

#[derive(Args, Debug, Default)]
pub struct BinanceArgs {
    /// Configuration file with a `binance` section
    #[arg(short, long, env = "PRICEGW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Exchange API root [default: https://api.binance.us/]
    #[arg(long, env = "BINANCE_BASEURL")]
    pub base_url: Option<String>,

    /// `:port` or `host:port` [default: :80]
    #[arg(long, env = "BINANCE_LISTEN_ADDR")]
    pub listen_addr: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct InfluxDbArgs {
    /// Configuration file with an `influxdb` section
    #[arg(short, long, env = "PRICEGW_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "IDB_SERVER_URL")]
    pub server_url: Option<String>,

    #[arg(long, env = "IDB_ORG")]
    pub org: Option<String>,

    #[arg(long, env = "IDB_BUCKET")]
    pub bucket: Option<String>,

    #[arg(long, env = "IDB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// `:port` or `host:port` [default: :80]
    #[arg(long, env = "IDB_LISTEN_ADDR")]
    pub listen_addr: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct CollectorArgs {
    /// Configuration file with a `collector` section
    #[arg(short, long, env = "PRICEGW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Data source server to sample
    #[arg(long, env = "PPC_DATASOURCE_BASEURL")]
    pub datasource_base_url: Option<String>,

    #[arg(long, env = "PPC_SYMBOL")]
    pub symbol: Option<String>,

    /// Seconds between samples [default: 60]
    #[arg(long, env = "PPC_INTERVAL_SECS")]
    pub interval_secs: Option<u64>,

    #[arg(long, env = "PPC_INFLUX_SERVER_URL")]
    pub influx_server_url: Option<String>,

    #[arg(long, env = "PPC_INFLUX_ORG")]
    pub influx_org: Option<String>,

    #[arg(long, env = "PPC_INFLUX_BUCKET")]
    pub influx_bucket: Option<String>,

    #[arg(long, env = "PPC_INFLUX_TOKEN", hide_env_values = true)]
    pub influx_token: Option<String>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
