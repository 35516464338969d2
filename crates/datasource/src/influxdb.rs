//! InfluxDB v2 backed data source
//!
//! Points are stored as measurement `price`, field `open`, tag `symbol`,
//! one point per minute. Queries are Flux scripts posted to
//! `/api/v2/query`; the CSV response is decoded with the `csv` crate.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use common::{ApiError, AverageQuote, ErrorCode, Granularity, PriceQuote, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::source::{AverageSource, PriceSource, SourceIdentity};
use crate::util::{escape_double_quote, http_client, join_path, parse_base_url, request_failed};

const QUERY_PATH: &str = "api/v2/query";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const EMPTY_RANGE: &str = "cannot query an empty range";

/// One row of a Flux CSV result, keyed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FluxRecord(HashMap<String, String>);

impl FluxRecord {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    fn float(&self, column: &str) -> Result<f64> {
        let raw = self.get(column).unwrap_or_default();
        raw.parse::<f64>()
            .map_err(|_| ApiError::type_mismatch(column, "float", format!("\"{}\"", raw)))
    }

    fn time(&self, column: &str) -> Result<DateTime<Utc>> {
        let raw = self.get(column).unwrap_or_default();
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                ApiError::new(ErrorCode::DataParseError)
                    .with_attr("field", column)
                    .with_attr("err", e.to_string())
            })
    }
}

/// Error body of the InfluxDB HTTP API
#[derive(Debug, Deserialize)]
struct InfluxErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Decode an InfluxDB CSV response into records
///
/// Annotation rows (`#...`) are skipped, as are repeated header rows that
/// start each additional table. An `error` column signals a query failure
/// reported in-band.
pub fn parse_flux_csv(body: &str) -> Result<Vec<FluxRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(body.as_bytes());

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => return Err(csv_error(e)),
    };

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(csv_error)?;
        if row.iter().eq(headers.iter()) {
            continue;
        }
        let record = FluxRecord(
            headers
                .iter()
                .zip(row.iter())
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        if let Some(message) = record.get("error").filter(|m| !m.is_empty()) {
            return Err(upstream_error("", message));
        }
        records.push(record);
    }

    Ok(records)
}

fn csv_error(err: csv::Error) -> ApiError {
    ApiError::new(ErrorCode::DataParseError)
        .with_attr("field", "result")
        .with_attr("err", err.to_string())
}

fn upstream_error(code: &str, message: &str) -> ApiError {
    if message.contains(EMPTY_RANGE) {
        return ApiError::no_data();
    }
    let detail = if code.is_empty() {
        message.to_string()
    } else {
        format!("{}: {}", code, message)
    };
    ApiError::with_message(
        ErrorCode::SourceError,
        format!("{}: {}", ErrorCode::SourceError.default_message(), detail),
    )
    .with_attr("err", detail)
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Flux script selecting the point stored exactly at `ts`
pub fn price_query(bucket: &str, symbol: &str, ts: DateTime<Utc>) -> String {
    let t = rfc3339(ts);
    format!(
        r#"from(bucket: "{bucket}")
  |> range(start: {t})
  |> filter(fn: (r) => r["_measurement"] == "price")
  |> filter(fn: (r) => r["_field"] == "open")
  |> filter(fn: (r) => r["symbol"] == "{symbol}")
  |> first()
  |> filter(fn: (r) => r["_time"] == {t})
"#,
        bucket = escape_double_quote(bucket),
        symbol = escape_double_quote(symbol),
        t = t,
    )
}

/// Flux script averaging the points in `[from, until)`
pub fn average_query(
    bucket: &str,
    symbol: &str,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> String {
    format!(
        r#"from(bucket: "{bucket}")
  |> range(start: {from}, stop: {until})
  |> filter(fn: (r) => r["_measurement"] == "price")
  |> filter(fn: (r) => r["_field"] == "open")
  |> filter(fn: (r) => r["symbol"] == "{symbol}")
  |> mean()
"#,
        bucket = escape_double_quote(bucket),
        symbol = escape_double_quote(symbol),
        from = rfc3339(from),
        until = rfc3339(until),
    )
}

/// Data source over an InfluxDB v2 bucket
#[derive(Debug, Clone)]
pub struct InfluxDbDataSource {
    url: Url,
    org: String,
    bucket: String,
    token: String,
    client: reqwest::Client,
}

impl InfluxDbDataSource {
    pub fn new(
        url: &str,
        org: impl Into<String>,
        bucket: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            url: parse_base_url(url)?,
            org: org.into(),
            bucket: bucket.into(),
            token: token.into(),
            client: http_client(REQUEST_TIMEOUT)?,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    #[instrument(skip(self, flux), level = "debug")]
    async fn query(&self, flux: &str) -> Result<Vec<FluxRecord>> {
        let url = join_path(&self.url, &[QUERY_PATH]);
        let response = self
            .client
            .post(url)
            .query(&[("org", self.org.as_str())])
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/csv")
            .header("Content-Type", "application/vnd.flux")
            .body(flux.to_string())
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status();
        let body = response.text().await.map_err(request_failed)?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<InfluxErrorBody>(&body) {
                Ok(err) => upstream_error(&err.code, &err.message)
                    .with_attr("statusCode", status.as_u16()),
                Err(_) => ApiError::new(ErrorCode::BadStatusCode)
                    .with_attr("statusCode", status.as_u16())
                    .with_attr("resp", body),
            });
        }

        parse_flux_csv(&body)
    }
}

impl SourceIdentity for InfluxDbDataSource {}

#[async_trait]
impl PriceSource for InfluxDbDataSource {
    async fn price(&self, symbol: &str, ts: DateTime<Utc>) -> Result<PriceQuote> {
        let records = self.query(&price_query(&self.bucket, symbol, ts)).await?;
        let record = records.first().ok_or_else(ApiError::no_data)?;

        let price = record.float("_value")?;
        let actual = record.time("_time")?;
        if actual != ts {
            return Err(ApiError::value_mismatch(
                "ts",
                ts.timestamp(),
                actual.timestamp(),
            ));
        }

        debug!(symbol, ts = %ts, price, "influxdb price");
        Ok(PriceQuote::new(price, ts))
    }
}

#[async_trait]
impl AverageSource for InfluxDbDataSource {
    async fn average(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<AverageQuote> {
        if granularity != Granularity::Minute {
            return Err(ApiError::new(ErrorCode::InvalidGranularity)
                .with_attr("details", "only support 1m")
                .with_attr("value", granularity.as_str()));
        }

        // Both ends of the interval must hold a stored point
        let first = self.price(symbol, from).await?;
        if from == until {
            return Ok(AverageQuote::point(first));
        }
        self.price(symbol, until).await?;

        let records = self
            .query(&average_query(&self.bucket, symbol, from, until))
            .await?;
        let record = records.first().ok_or_else(ApiError::no_data)?;

        let actual_from = record.time("_start")?;
        let actual_until = record.time("_stop")?;
        let average = record.float("_value")?;

        if actual_from != from {
            return Err(ApiError::value_mismatch(
                "from",
                from.timestamp(),
                actual_from.timestamp(),
            ));
        }
        if actual_until != until {
            return Err(ApiError::value_mismatch(
                "until",
                until.timestamp(),
                actual_until.timestamp(),
            ));
        }

        Ok(AverageQuote::new(average, actual_from, actual_until))
    }
}
