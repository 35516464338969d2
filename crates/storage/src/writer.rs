//! Price writers

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::error::StorageError;
use crate::Result;

const MEASUREMENT: &str = "price";
const WRITE_PATH: &str = "api/v2/write";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Push sink for sampled prices
#[async_trait]
pub trait Writer: Send + Sync {
    async fn write_price(&self, symbol: &str, price: f64, ts: DateTime<Utc>) -> Result<()>;
}

/// Escape a tag value for line protocol
fn escape_tag(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | ' ' | '=' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Line protocol for one price point, second precision
pub fn price_line(symbol: &str, price: f64, ts: DateTime<Utc>) -> String {
    format!(
        "{},symbol={} open={:?} {}",
        MEASUREMENT,
        escape_tag(symbol),
        price,
        ts.timestamp()
    )
}

/// Writer for an InfluxDB v2 bucket
#[derive(Debug, Clone)]
pub struct InfluxDbWriter {
    write_url: Url,
    token: String,
    client: reqwest::Client,
}

impl InfluxDbWriter {
    pub fn new(server_url: &str, org: &str, bucket: &str, token: impl Into<String>) -> Result<Self> {
        let mut write_url = Url::parse(server_url)
            .map_err(|e| StorageError::Config(format!("invalid server url {}: {}", server_url, e)))?;
        if !matches!(write_url.scheme(), "http" | "https") {
            return Err(StorageError::Config(format!(
                "unsupported protocol scheme: {}",
                write_url.scheme()
            )));
        }

        let path = format!("{}/{}", write_url.path().trim_end_matches('/'), WRITE_PATH);
        write_url.set_path(&path);
        write_url
            .query_pairs_mut()
            .append_pair("org", org)
            .append_pair("bucket", bucket)
            .append_pair("precision", "s");

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self {
            write_url,
            token: token.into(),
            client,
        })
    }

    pub fn write_url(&self) -> &Url {
        &self.write_url
    }
}

#[async_trait]
impl Writer for InfluxDbWriter {
    #[instrument(skip(self), level = "debug")]
    async fn write_price(&self, symbol: &str, price: f64, ts: DateTime<Utc>) -> Result<()> {
        let line = price_line(symbol, price, ts);

        let response = self
            .client
            .post(self.write_url.clone())
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(line)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(symbol, price, ts = ts.timestamp(), "price written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{RawQuery, State},
        http::{HeaderMap, StatusCode},
        routing::post,
        Router,
    };
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct Received {
        query: Option<String>,
        auth: Option<String>,
        body: String,
    }

    async fn fake_influx(status: StatusCode) -> (InfluxDbWriter, Arc<Mutex<Received>>) {
        let received = Arc::new(Mutex::new(Received::default()));

        async fn write(
            State((received, status)): State<(Arc<Mutex<Received>>, StatusCode)>,
            RawQuery(query): RawQuery,
            headers: HeaderMap,
            body: String,
        ) -> StatusCode {
            let mut r = received.lock();
            r.query = query;
            r.auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            r.body = body;
            status
        }

        let router = Router::new()
            .route("/api/v2/write", post(write))
            .with_state((received.clone(), status));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let writer =
            InfluxDbWriter::new(&format!("http://{}", addr), "acme", "prices", "secret").unwrap();
        (writer, received)
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_price_line() {
        assert_eq!(
            price_line("BTCUSD", 100.0, ts(60)),
            "price,symbol=BTCUSD open=100.0 60"
        );
        assert_eq!(
            price_line("BTC USD,x=1", 1.25, ts(0)),
            r"price,symbol=BTC\ USD\,x\=1 open=1.25 0"
        );
    }

    #[test]
    fn test_rejects_unsupported_scheme() {
        let err = InfluxDbWriter::new("ftp://db", "o", "b", "t").unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[tokio::test]
    async fn test_write_posts_line_protocol() {
        let (writer, received) = fake_influx(StatusCode::NO_CONTENT).await;

        writer.write_price("BTCUSD", 42.5, ts(120)).await.unwrap();

        let r = received.lock();
        assert_eq!(r.body, "price,symbol=BTCUSD open=42.5 120");
        assert_eq!(r.auth.as_deref(), Some("Token secret"));
        assert_eq!(
            r.query.as_deref(),
            Some("org=acme&bucket=prices&precision=s")
        );
    }

    #[tokio::test]
    async fn test_write_rejected() {
        let (writer, _) = fake_influx(StatusCode::UNAUTHORIZED).await;

        let err = writer.write_price("BTCUSD", 1.0, ts(0)).await.unwrap_err();
        match err {
            StorageError::Rejected { status, .. } => assert_eq!(status, 401),
            other => panic!("unexpected error: {other}"),
        }
    }
}
