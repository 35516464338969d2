//! Prometheus metrics
//!
//! # Metrics
//!
//! * `datasource_attempts_total{capability,source,outcome}` - One per backend call made by the gateway
//! * `datasource_attempt_duration_seconds{capability,source}` - Backend call latency
//! * `datasource_failover_exhausted_total{capability}` - Requests where every backend failed
//! * `collector_cycles_total{symbol,outcome}` - Collection cycles
//! * `collector_last_success_timestamp_seconds{symbol}` - Sample instant of the last stored price

use metrics::{counter, gauge, histogram, Counter, Gauge};
use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize the Prometheus metrics exporter
///
/// This starts an HTTP listener on the specified port that exposes metrics
/// at `/metrics`.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

/// Result of one backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failure,
    Timeout,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Timeout => "timeout",
        }
    }
}

/// Record one backend call made during failover
pub fn record_source_attempt(
    capability: &'static str,
    source: &str,
    outcome: AttemptOutcome,
    elapsed: Duration,
) {
    counter!(
        "datasource_attempts_total",
        "capability" => capability,
        "source" => source.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
    histogram!(
        "datasource_attempt_duration_seconds",
        "capability" => capability,
        "source" => source.to_string()
    )
    .record(elapsed.as_secs_f64());
}

/// Record a request for which no backend succeeded
pub fn record_failover_exhausted(capability: &'static str) {
    counter!("datasource_failover_exhausted_total", "capability" => capability).increment(1);
}

/// Per-symbol collector metrics
#[derive(Clone)]
pub struct CollectorMetrics {
    succeeded: Counter,
    failed: Counter,
    last_success: Gauge,
    symbol: String,
}

impl CollectorMetrics {
    pub fn new(symbol: &str) -> Self {
        let symbol = symbol.to_string();
        Self {
            succeeded: counter!("collector_cycles_total", "symbol" => symbol.clone(), "outcome" => "success"),
            failed: counter!("collector_cycles_total", "symbol" => symbol.clone(), "outcome" => "failure"),
            last_success: gauge!("collector_last_success_timestamp_seconds", "symbol" => symbol.clone()),
            symbol,
        }
    }

    /// A cycle stored the price sampled for `sample_ts` (unix seconds)
    pub fn cycle_succeeded(&self, sample_ts: i64) {
        self.succeeded.increment(1);
        self.last_success.set(sample_ts as f64);
    }

    pub fn cycle_failed(&self) {
        self.failed.increment(1);
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}
