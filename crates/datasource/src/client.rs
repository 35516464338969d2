//! Data source that calls a remote data source API server

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    from_unix_seconds, ApiError, AverageQuote, ErrorCode, Granularity, PriceQuote, Result,
};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::api::models::{AverageBody, PriceBody, AVERAGE_ROUTE, PRICE_ROUTE};
use crate::source::{AverageSource, PriceSource, SourceIdentity};
use crate::util::{http_client, join_path, parse_base_url, request_failed};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP-based data source
#[derive(Debug, Clone)]
pub struct HttpDataSource {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpDataSource {
    /// Create a new HTTP data source
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            client: http_client(REQUEST_TIMEOUT)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, route: &str, query: &[(&str, String)]) -> Result<T> {
        let url = join_path(&self.base_url, &[route]);
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status();
        let body = response.text().await.map_err(request_failed)?;

        if status != reqwest::StatusCode::OK {
            return Err(decode_error(&body));
        }

        serde_json::from_str(&body).map_err(|e| {
            ApiError::new(ErrorCode::DataParseError)
                .with_attr("field", "body")
                .with_attr("err", e.to_string())
        })
    }
}

/// Decode an error payload, falling back to the raw body
fn decode_error(body: &str) -> ApiError {
    serde_json::from_str::<ApiError>(body)
        .unwrap_or_else(|_| ApiError::internal(format!("unknown error: {}", body)))
}

impl SourceIdentity for HttpDataSource {}

#[async_trait]
impl PriceSource for HttpDataSource {
    async fn price(&self, symbol: &str, ts: DateTime<Utc>) -> Result<PriceQuote> {
        let body: PriceBody = self
            .get(
                PRICE_ROUTE,
                &[
                    ("symbol", symbol.to_string()),
                    ("ts", ts.timestamp().to_string()),
                ],
            )
            .await?;

        Ok(PriceQuote::new(body.price, ts))
    }
}

#[async_trait]
impl AverageSource for HttpDataSource {
    async fn average(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<AverageQuote> {
        let body: AverageBody = self
            .get(
                AVERAGE_ROUTE,
                &[
                    ("symbol", symbol.to_string()),
                    ("from", from.timestamp().to_string()),
                    ("until", until.timestamp().to_string()),
                    ("granularity", granularity.to_string()),
                ],
            )
            .await?;

        Ok(AverageQuote::new(
            body.average,
            from_unix_seconds("from", body.from)?,
            from_unix_seconds("until", body.until)?,
        ))
    }
}
