use crate::*;
use regex::Regex;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} is required")]
    MissingField { field: String },

    #[error("Invalid data source '{spec}': {message}")]
    InvalidSource { spec: String, message: String },

    #[error("{field}: {message}")]
    InvalidUrl { field: String, message: String },

    #[error("{field}: invalid listen address '{addr}', expected :port or host:port")]
    InvalidListenAddr { field: String, addr: String },

    #[error("{field} must be a positive integer")]
    InvalidPositiveInteger { field: String },

    #[error("Environment variable in {field} is not set: {value}")]
    UnresolvedEnvVar { field: String, value: String },
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_default(&mut self, field: &str, value: &str) {
        self.defaults_applied.push(DefaultApplied {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

pub fn validate_config(config: &PriceGwConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    if config.is_empty() {
        report.add_warning("", "No service section configured");
    }
    if let Some(gateway) = &config.gateway {
        validate_gateway(gateway, &mut report);
    }
    if let Some(binance) = &config.binance {
        validate_binance(binance, &mut report);
    }
    if let Some(influxdb) = &config.influxdb {
        validate_influx_connection("influxdb", &influxdb.connection, &mut report);
        validate_listen_addr("influxdb.listen_addr", &influxdb.listen_addr, &mut report);
    }
    if let Some(collector) = &config.collector {
        validate_collector(collector, &mut report);
    }

    report
}

fn validate_gateway(gateway: &GatewayConfig, report: &mut ValidationReport) {
    validate_required("gateway.symbol", &gateway.symbol, report);
    validate_source_list("gateway.price_sources", &gateway.price_sources, report);
    validate_source_list("gateway.average_sources", &gateway.average_sources, report);
    validate_listen_addr("gateway.listen_addr", &gateway.listen_addr, report);

    match gateway.source_timeout_ms {
        None => report.add_default(
            "gateway.source_timeout_ms",
            &defaults::DEFAULT_SOURCE_TIMEOUT_MS.to_string(),
        ),
        Some(0) => report.add_error(ValidationError::InvalidPositiveInteger {
            field: "gateway.source_timeout_ms".to_string(),
        }),
        Some(_) => {}
    }
}

fn validate_source_list(field: &str, specs: &[String], report: &mut ValidationReport) {
    if specs.is_empty() {
        report.add_warning(
            field,
            "No data sources configured; every request will fail",
        );
        return;
    }

    let mut seen = HashSet::new();
    for spec in specs {
        match parse_source_spec(spec) {
            Ok(parsed) => {
                if !seen.insert(parsed.id.clone()) {
                    report.add_warning(
                        field,
                        &format!(
                            "Data source id '{}' is used more than once; errors keep only the last",
                            parsed.id
                        ),
                    );
                }
            }
            Err(err) => report.add_error(err),
        }
    }
}

fn validate_binance(binance: &BinanceConfig, report: &mut ValidationReport) {
    match &binance.base_url {
        Some(url) => validate_url("binance.base_url", url, report),
        None => report.add_default("binance.base_url", defaults::DEFAULT_BINANCE_BASE_URL),
    }
    validate_listen_addr("binance.listen_addr", &binance.listen_addr, report);
}

fn validate_collector(collector: &CollectorConfig, report: &mut ValidationReport) {
    if validate_required(
        "collector.datasource_base_url",
        &collector.datasource_base_url,
        report,
    ) {
        validate_url(
            "collector.datasource_base_url",
            &collector.datasource_base_url,
            report,
        );
    }
    validate_required("collector.symbol", &collector.symbol, report);
    validate_influx_connection("collector.influx", &collector.influx, report);

    match collector.interval_secs {
        None => report.add_default(
            "collector.interval_secs",
            &defaults::DEFAULT_COLLECTOR_INTERVAL_SECS.to_string(),
        ),
        Some(0) => report.add_error(ValidationError::InvalidPositiveInteger {
            field: "collector.interval_secs".to_string(),
        }),
        Some(_) => {}
    }
}

fn validate_influx_connection(
    section: &str,
    connection: &InfluxConnection,
    report: &mut ValidationReport,
) {
    let server_url = format!("{}.server_url", section);
    if validate_required(&server_url, &connection.server_url, report) {
        validate_url(&server_url, &connection.server_url, report);
    }
    validate_required(&format!("{}.org", section), &connection.org, report);
    validate_required(&format!("{}.bucket", section), &connection.bucket, report);
    validate_required(&format!("{}.token", section), &connection.token, report);
}

/// Returns true when the value is present and fully substituted
fn validate_required(field: &str, value: &str, report: &mut ValidationReport) -> bool {
    if value.trim().is_empty() {
        report.add_error(ValidationError::MissingField {
            field: field.to_string(),
        });
        return false;
    }
    if has_unresolved_env_vars(value) {
        report.add_error(ValidationError::UnresolvedEnvVar {
            field: field.to_string(),
            value: value.to_string(),
        });
        return false;
    }
    true
}

fn validate_url(field: &str, url: &str, report: &mut ValidationReport) {
    if let Err(message) = sources::check_http_url(url) {
        report.add_error(ValidationError::InvalidUrl {
            field: field.to_string(),
            message,
        });
    }
}

fn validate_listen_addr(field: &str, addr: &Option<String>, report: &mut ValidationReport) {
    let Some(addr) = addr else {
        report.add_default(field, defaults::DEFAULT_LISTEN_ADDR);
        return;
    };
    if !is_listen_addr(addr) {
        report.add_error(ValidationError::InvalidListenAddr {
            field: field.to_string(),
            addr: addr.clone(),
        });
    }
}

/// `:port`, `host:port` or `[v6]:port`
pub fn is_listen_addr(addr: &str) -> bool {
    let Ok(re) = Regex::new(r"^(\[[^\[\]]+\]|[^:\[\]]*):(\d{1,5})$") else {
        return false;
    };
    re.captures(addr.trim())
        .and_then(|caps| caps.get(2))
        .is_some_and(|port| port.as_str().parse::<u16>().is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> GatewayConfig {
        GatewayConfig {
            price_sources: vec!["binance:http://binance-ds".into()],
            average_sources: vec!["influxdb:http://influxdb-ds".into()],
            symbol: "BTCUSD".into(),
            listen_addr: None,
            source_timeout_ms: None,
        }
    }

    fn influx() -> InfluxConnection {
        InfluxConnection {
            server_url: "http://influxdb:8086".into(),
            org: "pricegw".into(),
            bucket: "prices".into(),
            token: "secret".into(),
        }
    }

    #[test]
    fn test_valid_gateway_reports_defaults() {
        let config = PriceGwConfig {
            gateway: Some(gateway()),
            ..Default::default()
        };
        let report = validate_config(&config);
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.warnings.is_empty());

        let fields: Vec<_> = report
            .defaults_applied
            .iter()
            .map(|d| d.field.as_str())
            .collect();
        assert_eq!(
            fields,
            vec!["gateway.listen_addr", "gateway.source_timeout_ms"]
        );
    }

    #[test]
    fn test_gateway_errors() {
        let config = PriceGwConfig {
            gateway: Some(GatewayConfig {
                price_sources: vec!["nourl".into()],
                symbol: String::new(),
                listen_addr: Some("80".into()),
                source_timeout_ms: Some(0),
                ..gateway()
            }),
            ..Default::default()
        };
        let report = validate_config(&config);
        assert_eq!(report.errors.len(), 4);
        assert!(report.errors.contains(&ValidationError::MissingField {
            field: "gateway.symbol".into()
        }));
        assert!(matches!(
            report.errors[1],
            ValidationError::InvalidSource { .. }
        ));
    }

    #[test]
    fn test_duplicate_ids_and_empty_lists_warn() {
        let config = PriceGwConfig {
            gateway: Some(GatewayConfig {
                price_sources: vec!["a:http://one".into(), "a:http://two".into()],
                average_sources: vec![],
                ..gateway()
            }),
            ..Default::default()
        };
        let report = validate_config(&config);
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings[0].message.contains("'a'"));
        assert_eq!(report.warnings[1].field, "gateway.average_sources");
    }

    #[test]
    fn test_influxdb_requires_every_field() {
        let config = PriceGwConfig {
            influxdb: Some(InfluxDbConfig {
                connection: InfluxConnection {
                    token: "${IDB_TOKEN_NOT_SET}".into(),
                    org: String::new(),
                    ..influx()
                },
                listen_addr: Some(":8080".into()),
            }),
            ..Default::default()
        };
        let report = validate_config(&config);
        assert_eq!(
            report.errors,
            vec![
                ValidationError::MissingField {
                    field: "influxdb.org".into()
                },
                ValidationError::UnresolvedEnvVar {
                    field: "influxdb.token".into(),
                    value: "${IDB_TOKEN_NOT_SET}".into()
                },
            ]
        );
    }

    #[test]
    fn test_collector_rules() {
        let config = PriceGwConfig {
            collector: Some(CollectorConfig {
                datasource_base_url: "gateway:80".into(),
                symbol: "BTCUSD".into(),
                interval_secs: Some(0),
                influx: influx(),
            }),
            ..Default::default()
        };
        let report = validate_config(&config);
        assert_eq!(report.errors.len(), 2);
        assert!(matches!(report.errors[0], ValidationError::InvalidUrl { .. }));
        assert_eq!(
            report.errors[1],
            ValidationError::InvalidPositiveInteger {
                field: "collector.interval_secs".into()
            }
        );
    }

    #[test]
    fn test_binance_default_base_url() {
        let config = PriceGwConfig {
            binance: Some(BinanceConfig::default()),
            ..Default::default()
        };
        let report = validate_config(&config);
        assert!(report.is_valid());
        assert_eq!(report.defaults_applied[0].value, "https://api.binance.us/");
    }

    #[test]
    fn test_empty_config_warns() {
        let report = validate_config(&PriceGwConfig::default());
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_listen_addr_forms() {
        assert!(is_listen_addr(":80"));
        assert!(is_listen_addr("0.0.0.0:8080"));
        assert!(is_listen_addr("[::1]:80"));
        assert!(!is_listen_addr("80"));
        assert!(!is_listen_addr(":99999"));
        assert!(!is_listen_addr("::1:80"));
    }
}
