//! PriceGW binary
//!
//! One executable, one service per subcommand: the failover gateway, the
//! Binance and InfluxDB data source servers, and the periodic collector.
//! `validate` and `init` work on configuration files.

mod settings;

use anyhow::{Context, Result};
use axum::Router;
use cli::{BinanceArgs, Cli, CollectorArgs, Commands, GatewayArgs, InfluxDbArgs};
use collector::Collector;
use config::{generate_default_config, load_config, parse_source_list, save_config, validate_config};
use datasource::api::datasource_routes;
use datasource::{BinanceDataSource, HttpDataSource, IdentifiedSource, InfluxDbDataSource};
use gateway::{gateway_routes, Failover, GatewayState};
use observability::{init_logging, init_metrics, LogFormat};
use server::{HttpServer, ServerConfig, ServerExt, ShutdownController};
use std::path::Path;
use std::sync::Arc;
use storage::InfluxDbWriter;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let format = LogFormat::parse(&cli.log_format).unwrap_or_default();
    init_logging(cli.command.service_name(), format)?;

    info!(version = env!("CARGO_PKG_VERSION"), "PriceGW starting...");
    debug!(service = cli.command.service_name(), "CLI arguments parsed");

    if let Some(port) = cli.metrics_port {
        init_metrics(port).context("Failed to start metrics exporter")?;
    }

    match cli.command {
        Commands::Gateway(args) => run_gateway(args).await,
        Commands::Binance(args) => run_binance(args).await,
        Commands::Influxdb(args) => run_influxdb(args).await,
        Commands::Collector(args) => run_collector(args).await,
        Commands::Validate { config } => validate_command(config),
        Commands::Init { output } => init_command(output),
    }
}

/// Serve `routes` plus `/health` until Ctrl+C
async fn serve(service: &str, listen_addr: &str, routes: Router) -> Result<()> {
    let config = ServerConfig::parse_listen_addr(listen_addr)?;
    info!(service, addr = %config.bind_addr(), "Starting service");

    HttpServer::for_service(config, service, routes)
        .run_with_ctrl_c()
        .await?;
    Ok(())
}

async fn run_gateway(args: GatewayArgs) -> Result<()> {
    let section = settings::gateway(&args)?;

    let mut failover = Failover::new().with_source_timeout(section.source_timeout());
    for spec in parse_source_list(&section.price_sources)? {
        let client = HttpDataSource::new(&spec.url)
            .with_context(|| format!("Invalid price source {}", spec))?;
        info!(source = %spec.id, url = %spec.url, "Registered price source");
        failover = failover.with_price_source(Arc::new(IdentifiedSource::new(spec.id, client)));
    }
    for spec in parse_source_list(&section.average_sources)? {
        let client = HttpDataSource::new(&spec.url)
            .with_context(|| format!("Invalid average source {}", spec))?;
        info!(source = %spec.id, url = %spec.url, "Registered average source");
        failover = failover.with_average_source(Arc::new(IdentifiedSource::new(spec.id, client)));
    }

    let routes = gateway_routes(GatewayState::new(failover, section.symbol.clone()));
    serve("gateway", section.resolved_listen_addr(), routes).await
}

async fn run_binance(args: BinanceArgs) -> Result<()> {
    let section = settings::binance(&args)?;

    let source = BinanceDataSource::from_base_url(section.base_url.as_deref())
        .context("Invalid Binance base url")?;
    info!(base_url = %source.api().base_url(), "Using Binance API");

    serve(
        "binance",
        section.resolved_listen_addr(),
        datasource_routes(Arc::new(source)),
    )
    .await
}

async fn run_influxdb(args: InfluxDbArgs) -> Result<()> {
    let section = settings::influxdb(&args)?;
    let connection = &section.connection;

    let source = InfluxDbDataSource::new(
        &connection.server_url,
        connection.org.clone(),
        connection.bucket.clone(),
        connection.token.clone(),
    )
    .context("Invalid InfluxDB server url")?;
    info!(server_url = %connection.server_url, bucket = %connection.bucket, "Using InfluxDB");

    serve(
        "influxdb",
        section.resolved_listen_addr(),
        datasource_routes(Arc::new(source)),
    )
    .await
}

async fn run_collector(args: CollectorArgs) -> Result<()> {
    let section = settings::collector(&args)?;
    let influx = &section.influx;

    let source = HttpDataSource::new(&section.datasource_base_url)
        .context("Invalid data source base url")?;
    let writer = InfluxDbWriter::new(
        &influx.server_url,
        &influx.org,
        &influx.bucket,
        influx.token.clone(),
    )
    .context("Invalid InfluxDB server url")?;

    let collector = Collector::new(Arc::new(source), Arc::new(writer), section.symbol.clone())
        .with_interval(section.interval());
    info!(
        symbol = %collector.symbol(),
        interval_secs = collector.interval().as_secs(),
        "Starting collector"
    );

    let shutdown = ShutdownController::with_ctrl_c();
    collector.run_until(shutdown.child_token()).await;

    info!("Collector stopped");
    Ok(())
}

fn validate_command<P: AsRef<Path>>(config_path: P) -> Result<()> {
    info!(path = ?config_path.as_ref(), "Validating configuration");

    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            anyhow::bail!(e);
        }
    };

    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    let sections = [
        ("gateway", config.gateway.is_some()),
        ("binance", config.binance.is_some()),
        ("influxdb", config.influxdb.is_some()),
        ("collector", config.collector.is_some()),
    ];
    for (name, present) in sections {
        println!("  {:<10} {}", name, if present { "configured" } else { "-" });
    }
    if let Some(gateway) = &config.gateway {
        println!();
        println!("Gateway symbol: {}", gateway.symbol);
        println!("Price sources: {}", gateway.price_sources.len());
        println!("Average sources: {}", gateway.average_sources.len());
    }

    Ok(())
}

fn init_command<P: AsRef<Path>>(output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!(?output_path, "Initializing new configuration file");

    let config = generate_default_config();

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    save_config(&config, output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("This configuration includes:");
    println!("  - gateway with a Binance and an InfluxDB price source");
    println!("  - binance and influxdb data source servers");
    println!("  - a collector sampling BTCUSD every 60 seconds");
    println!();
    println!("Next steps:");
    println!("  1. Edit the configuration file to point at your services");
    println!("  2. Export IDB_TOKEN with your InfluxDB API token");
    println!(
        "  3. Run 'pricegw validate --config {:?}' to check configuration",
        output_path
    );
    println!(
        "  4. Run 'pricegw <service> --config {:?}' to start a service",
        output_path
    );

    Ok(())
}
