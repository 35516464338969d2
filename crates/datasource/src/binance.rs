//! Binance klines backed data source
//!
//! Prices come from the open of one-second klines; averages are the mean of
//! kline opens at the requested granularity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    from_unix_millis, ApiError, AverageQuote, ErrorCode, Granularity, PriceQuote, Result,
};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::source::{AverageSource, PriceSource, SourceIdentity};
use crate::util::{http_client, join_path, json_type, parse_base_url, request_failed, source_error};

pub const DEFAULT_BASE_URL: &str = "https://api.binance.us/";

const KLINES_PATH: &str = "api/v3/klines";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const AVERAGE_LIMIT: u32 = 1000;

/// Raw kline rows as returned by the exchange
pub type Klines = Vec<Vec<Value>>;

/// Thin client for the public klines endpoint
#[derive(Debug, Clone)]
pub struct BinanceApi {
    base_url: Url,
    client: reqwest::Client,
}

impl BinanceApi {
    /// Client against the public endpoint
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Client against a custom base URL, which must be http or https
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            client: http_client(REQUEST_TIMEOUT)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET api/v3/klines`
    #[instrument(skip(self), level = "debug")]
    pub async fn klines(
        &self,
        symbol: &str,
        interval: Granularity,
        start_ms: i64,
        end_ms: Option<i64>,
        limit: u32,
    ) -> Result<Klines> {
        let mut url = join_path(&self.base_url, &[KLINES_PATH]);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("symbol", symbol)
                .append_pair("interval", interval.as_str())
                .append_pair("startTime", &start_ms.to_string());
            if let Some(end_ms) = end_ms {
                query.append_pair("endTime", &end_ms.to_string());
            }
            query.append_pair("limit", &limit.to_string());
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status();
        let body = response.text().await.map_err(request_failed)?;

        if status != reqwest::StatusCode::OK {
            return Err(ApiError::new(ErrorCode::BadStatusCode)
                .with_attr("statusCode", status.as_u16())
                .with_attr("resp", body));
        }

        serde_json::from_str(&body).map_err(|e| {
            ApiError::new(ErrorCode::DataParseError)
                .with_attr("field", "result")
                .with_attr("err", e.to_string())
        })
    }
}

/// Data source over [`BinanceApi`]
#[derive(Debug, Clone)]
pub struct BinanceDataSource {
    api: BinanceApi,
}

impl BinanceDataSource {
    pub fn new(api: BinanceApi) -> Self {
        Self { api }
    }

    /// Build from an optional base URL, defaulting to the public endpoint
    pub fn from_base_url(base_url: Option<&str>) -> Result<Self> {
        let api = match base_url {
            Some(url) if !url.is_empty() => BinanceApi::with_base_url(url)?,
            _ => BinanceApi::new()?,
        };
        Ok(Self::new(api))
    }

    pub fn api(&self) -> &BinanceApi {
        &self.api
    }
}

impl SourceIdentity for BinanceDataSource {}

fn open_time(row: &[Value], field: &str) -> Result<i64> {
    let value = &row[0];
    value
        .as_i64()
        // Some proxies re-encode integers as floats
        .or_else(|| value.as_f64().map(|f| f as i64))
        .ok_or_else(|| ApiError::type_mismatch(field, "number", json_type(value)))
}

fn open_price(row: &[Value]) -> Result<&str> {
    row[1]
        .as_str()
        .ok_or_else(|| ApiError::type_mismatch("open", "string", json_type(&row[1])))
}

#[async_trait]
impl PriceSource for BinanceDataSource {
    async fn price(&self, symbol: &str, ts: DateTime<Utc>) -> Result<PriceQuote> {
        let ts_ms = ts.timestamp_millis();
        let rows = self
            .api
            .klines(symbol, Granularity::Second, ts_ms, None, 1)
            .await
            .map_err(source_error)?;

        let row = rows.first().ok_or_else(ApiError::no_data)?;
        if row.len() <= 2 {
            return Err(ApiError::new(ErrorCode::InvalidResultFormat));
        }

        let actual = open_time(row, "ts")?;
        if actual != ts_ms {
            return Err(ApiError::value_mismatch("ts", ts_ms, actual));
        }

        let open = open_price(row)?;
        let price = open.parse::<f64>().map_err(|e| {
            ApiError::new(ErrorCode::SourceError).with_attr("err", e.to_string())
        })?;

        debug!(symbol, ts = ts_ms, price, "binance price");
        Ok(PriceQuote::new(price, ts))
    }
}

#[async_trait]
impl AverageSource for BinanceDataSource {
    async fn average(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<AverageQuote> {
        if from == until {
            return self.price(symbol, from).await.map(AverageQuote::point);
        }

        let rows = self
            .api
            .klines(
                symbol,
                granularity,
                from.timestamp_millis(),
                Some(until.timestamp_millis()),
                AVERAGE_LIMIT,
            )
            .await
            .map_err(source_error)?;

        let (first, last) = match (rows.first(), rows.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(ApiError::no_data()),
        };

        let mut sum = 0.0;
        for (i, row) in rows.iter().enumerate() {
            if row.len() <= 2 {
                return Err(ApiError::new(ErrorCode::InvalidResultFormat).with_attr("arr", i));
            }
            let open = open_price(row)?;
            sum += open.parse::<f64>().map_err(|e| {
                ApiError::new(ErrorCode::DataParseError)
                    .with_attr("field", format!("open[{}]", i))
                    .with_attr("err", e.to_string())
            })?;
        }

        let actual_from = open_time(first, "from")?;
        let actual_until = if rows.len() >= 2 {
            open_time(last, "until")?
        } else {
            actual_from
        };

        let average = sum / rows.len() as f64;
        debug!(symbol, rows = rows.len(), average, "binance average");

        Ok(AverageQuote::new(
            average,
            from_unix_millis("from", actual_from)?,
            from_unix_millis("until", actual_until)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
    use common::from_unix_seconds;
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    /// Serve `router` on an ephemeral port and return its base URL
    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    /// Fake exchange returning one kline per second of the requested window
    async fn fake_exchange() -> BinanceDataSource {
        async fn klines(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
            let start: i64 = params["startTime"].parse().unwrap();
            let end: i64 = params
                .get("endTime")
                .map(|v| v.parse().unwrap())
                .unwrap_or(start);
            let limit: i64 = params["limit"].parse().unwrap();
            let step = match params["interval"].as_str() {
                "1m" => 60_000,
                _ => 1_000,
            };

            // Nothing recorded before the epoch + 1h
            if start >= 3_600_000 {
                return Json(json!([]));
            }

            let rows: Vec<Value> = (0..limit)
                .map(|i| start + i * step)
                .take_while(|t| *t <= end)
                .map(|t| json!([t, format!("{}.0", 100 + t / 1000), "1", "0", "0"]))
                .collect();
            Json(Value::Array(rows))
        }

        let base = serve(Router::new().route("/api/v3/klines", get(klines))).await;
        BinanceDataSource::from_base_url(Some(&base)).unwrap()
    }

    #[test]
    fn test_rejects_unsupported_scheme() {
        let err = BinanceApi::with_base_url("ws://api.binance.us").unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedProtocolScheme);
        assert_eq!(err.attr("protocol"), Some(&json!("ws")));
    }

    #[test]
    fn test_default_base_url() {
        let source = BinanceDataSource::from_base_url(None).unwrap();
        assert_eq!(source.api().base_url().as_str(), DEFAULT_BASE_URL);
    }

    #[tokio::test]
    async fn test_price() {
        let source = fake_exchange().await;
        let ts = from_unix_seconds("ts", 10).unwrap();

        let quote = source.price("BTCUSD", ts).await.unwrap();
        assert_eq!(quote.price, 110.0);
        assert_eq!(quote.timestamp, ts);
    }

    #[tokio::test]
    async fn test_price_no_data() {
        let source = fake_exchange().await;
        let ts = from_unix_seconds("ts", 7200).unwrap();

        let err = source.price("BTCUSD", ts).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NoData);
    }

    #[tokio::test]
    async fn test_average_mean_and_actual_bounds() {
        let source = fake_exchange().await;
        let from = from_unix_seconds("from", 0).unwrap();
        let until = from_unix_seconds("until", 120).unwrap();

        let quote = source
            .average("BTCUSD", from, until, Granularity::Minute)
            .await
            .unwrap();

        // opens at 0s, 60s, 120s => 100, 160, 220
        assert_eq!(quote.average, 160.0);
        assert_eq!(quote.from, from);
        assert_eq!(quote.until, until);
    }

    #[tokio::test]
    async fn test_average_zero_width_is_point_price() {
        let source = fake_exchange().await;
        let ts = from_unix_seconds("ts", 0).unwrap();

        let quote = source
            .average("BTCUSD", ts, ts, Granularity::Minute)
            .await
            .unwrap();
        assert_eq!(quote.average, 100.0);
        assert_eq!(quote.from, ts);
        assert_eq!(quote.until, ts);
    }

    #[tokio::test]
    async fn test_price_timestamp_mismatch() {
        async fn shifted() -> Json<Value> {
            Json(json!([[5000, "1.5", "1", "0"]]))
        }
        let base = serve(Router::new().route("/api/v3/klines", get(shifted))).await;
        let source = BinanceDataSource::from_base_url(Some(&base)).unwrap();

        let err = source
            .price("BTCUSD", from_unix_seconds("ts", 1).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ResultValueMismatch);
        assert_eq!(err.attr("field"), Some(&json!("ts")));
        assert_eq!(err.attr("expect"), Some(&json!(1000)));
        assert_eq!(err.attr("actual"), Some(&json!(5000)));
    }

    #[tokio::test]
    async fn test_price_open_type_mismatch() {
        async fn numeric_open() -> Json<Value> {
            Json(json!([[1000, 1.5, "1", "0"]]))
        }
        let base = serve(Router::new().route("/api/v3/klines", get(numeric_open))).await;
        let source = BinanceDataSource::from_base_url(Some(&base)).unwrap();

        let err = source
            .price("BTCUSD", from_unix_seconds("ts", 1).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ResultTypeMismatch);
        assert_eq!(err.attr("field"), Some(&json!("open")));
    }

    #[tokio::test]
    async fn test_short_row_is_invalid_format() {
        async fn short() -> Json<Value> {
            Json(json!([[1000, "1.5"]]))
        }
        let base = serve(Router::new().route("/api/v3/klines", get(short))).await;
        let source = BinanceDataSource::from_base_url(Some(&base)).unwrap();

        let err = source
            .price("BTCUSD", from_unix_seconds("ts", 1).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidResultFormat);
    }

    #[tokio::test]
    async fn test_bad_status_wrapped_as_source_error() {
        async fn rejected() -> (StatusCode, &'static str) {
            (StatusCode::TOO_MANY_REQUESTS, "slow down")
        }
        let base = serve(Router::new().route("/api/v3/klines", get(rejected))).await;
        let source = BinanceDataSource::from_base_url(Some(&base)).unwrap();

        let err = source
            .price("BTCUSD", from_unix_seconds("ts", 1).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::SourceError);

        let cause = err.attr("err").unwrap();
        assert_eq!(cause["code"], "BAD_STATUS_CODE");
        assert_eq!(cause["attr"]["statusCode"], 429);
        assert_eq!(cause["attr"]["resp"], "slow down");
    }
}
