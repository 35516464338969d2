use crate::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PriceGwConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());

    parse_config_str(&content)
}

/// Substitute environment placeholders, then parse YAML
pub fn parse_config_str(content: &str) -> Result<PriceGwConfig> {
    let substituted = substitution::substitute_env_vars(content)?;
    debug!("Environment variable substitution completed");

    // An empty file is a valid, empty configuration
    if substituted.trim().is_empty() {
        return Ok(PriceGwConfig::default());
    }

    let config: PriceGwConfig = serde_yaml::from_str(&substituted)
        .with_context(|| "Failed to parse YAML configuration")?;

    info!("Configuration loaded successfully");
    Ok(config)
}

/// Template written by `pricegw init`
///
/// Secrets are left as `${VAR}` placeholders.
pub fn generate_default_config() -> PriceGwConfig {
    use defaults::*;

    let influx = InfluxConnection {
        server_url: "http://localhost:8086".to_string(),
        org: "pricegw".to_string(),
        bucket: "prices".to_string(),
        token: "${IDB_TOKEN}".to_string(),
    };

    PriceGwConfig {
        gateway: Some(GatewayConfig {
            price_sources: vec![
                "binance:http://localhost:8081".to_string(),
                "influxdb:http://localhost:8082".to_string(),
            ],
            average_sources: vec!["influxdb:http://localhost:8082".to_string()],
            symbol: "BTCUSD".to_string(),
            listen_addr: Some(default_listen_addr()),
            source_timeout_ms: Some(DEFAULT_SOURCE_TIMEOUT_MS),
        }),
        binance: Some(BinanceConfig {
            base_url: Some(DEFAULT_BINANCE_BASE_URL.to_string()),
            listen_addr: Some(":8081".to_string()),
        }),
        influxdb: Some(InfluxDbConfig {
            connection: influx.clone(),
            listen_addr: Some(":8082".to_string()),
        }),
        collector: Some(CollectorConfig {
            datasource_base_url: "http://localhost:8081".to_string(),
            symbol: "BTCUSD".to_string(),
            interval_secs: Some(DEFAULT_COLLECTOR_INTERVAL_SECS),
            influx,
        }),
    }
}

#[instrument(skip(config))]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(config: &PriceGwConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;

    fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}
