//! Effective service settings
//!
//! A section starts from the `--config` file (or its defaults when no file
//! is given). Every flag or environment variable that is set replaces the
//! matching file value. The merged section must pass validation before a
//! service starts.

use anyhow::{bail, Result};
use cli::{BinanceArgs, CollectorArgs, GatewayArgs, InfluxDbArgs};
use config::{
    load_config, split_source_list, validate_config, BinanceConfig, CollectorConfig,
    GatewayConfig, InfluxDbConfig, PriceGwConfig,
};
use std::path::Path;
use tracing::{error, info, warn};

fn file_config(path: Option<&Path>) -> Result<PriceGwConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(PriceGwConfig::default()),
    }
}

/// Empty flag values count as unset
fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn override_string(target: &mut String, value: &Option<String>) {
    if let Some(value) = given(value) {
        *target = value.to_string();
    }
}

fn override_option(target: &mut Option<String>, value: &Option<String>) {
    if let Some(value) = given(value) {
        *target = Some(value.to_string());
    }
}

fn ensure_valid(config: &PriceGwConfig) -> Result<()> {
    let report = validate_config(config);

    for default in &report.defaults_applied {
        info!(field = %default.field, value = %default.value, "Default applied");
    }
    for warning in &report.warnings {
        warn!(field = %warning.field, message = %warning.message, "Configuration warning");
    }

    if !report.is_valid() {
        error!(
            error_count = report.errors.len(),
            "Configuration validation failed"
        );
        for err in &report.errors {
            error!("{}", err);
        }
        bail!("Cannot start due to configuration errors");
    }
    Ok(())
}

pub fn gateway(args: &GatewayArgs) -> Result<GatewayConfig> {
    let mut section = file_config(args.config.as_deref())?
        .gateway
        .unwrap_or_default();

    if let Some(list) = given(&args.price_sources) {
        section.price_sources = split_source_list(list);
    }
    if let Some(list) = given(&args.average_sources) {
        section.average_sources = split_source_list(list);
    }
    override_string(&mut section.symbol, &args.symbol);
    override_option(&mut section.listen_addr, &args.listen_addr);
    if args.source_timeout_ms.is_some() {
        section.source_timeout_ms = args.source_timeout_ms;
    }

    ensure_valid(&PriceGwConfig {
        gateway: Some(section.clone()),
        ..Default::default()
    })?;
    Ok(section)
}

pub fn binance(args: &BinanceArgs) -> Result<BinanceConfig> {
    let mut section = file_config(args.config.as_deref())?
        .binance
        .unwrap_or_default();

    override_option(&mut section.base_url, &args.base_url);
    override_option(&mut section.listen_addr, &args.listen_addr);

    ensure_valid(&PriceGwConfig {
        binance: Some(section.clone()),
        ..Default::default()
    })?;
    Ok(section)
}

pub fn influxdb(args: &InfluxDbArgs) -> Result<InfluxDbConfig> {
    let mut section = file_config(args.config.as_deref())?
        .influxdb
        .unwrap_or_default();

    let connection = &mut section.connection;
    override_string(&mut connection.server_url, &args.server_url);
    override_string(&mut connection.org, &args.org);
    override_string(&mut connection.bucket, &args.bucket);
    override_string(&mut connection.token, &args.token);
    override_option(&mut section.listen_addr, &args.listen_addr);

    ensure_valid(&PriceGwConfig {
        influxdb: Some(section.clone()),
        ..Default::default()
    })?;
    Ok(section)
}

pub fn collector(args: &CollectorArgs) -> Result<CollectorConfig> {
    let mut section = file_config(args.config.as_deref())?
        .collector
        .unwrap_or_default();

    override_string(&mut section.datasource_base_url, &args.datasource_base_url);
    override_string(&mut section.symbol, &args.symbol);
    if args.interval_secs.is_some() {
        section.interval_secs = args.interval_secs;
    }

    let influx = &mut section.influx;
    override_string(&mut influx.server_url, &args.influx_server_url);
    override_string(&mut influx.org, &args.influx_org);
    override_string(&mut influx.bucket, &args.influx_bucket);
    override_string(&mut influx.token, &args.influx_token);

    ensure_valid(&PriceGwConfig {
        collector: Some(section.clone()),
        ..Default::default()
    })?;
    Ok(section)
}
