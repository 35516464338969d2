//! Gateway HTTP surface.
//!
//! # Routes
//!
//! - `GET /api/v1/price?ts[&symbol]` - Price from the first answering source
//! - `GET /api/v1/average?from&until[&granularity][&symbol]` - Average from the first answering source
//!
//! Successful responses wrap the backend body as `{"data": ..., "source": id|null}`.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use common::{ApiError, Granularity};
use datasource::api::models::{
    required_unix, AverageBody, AverageParams, ErrorResponse, PriceBody, PriceParams,
    AVERAGE_ROUTE, PRICE_ROUTE,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::failover::{Failover, Sourced};

/// Response envelope naming the source that answered
#[derive(Debug, Clone, Serialize)]
pub struct GatewayBody<T> {
    pub data: T,
    pub source: Option<String>,
}

impl<Q, T: From<Q>> From<Sourced<Q>> for GatewayBody<T> {
    fn from(sourced: Sourced<Q>) -> Self {
        Self {
            data: sourced.data.into(),
            source: sourced.source,
        }
    }
}

/// Shared state for gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub failover: Arc<Failover>,
    /// Symbol used when a request does not name one
    pub default_symbol: String,
}

impl GatewayState {
    pub fn new(failover: Failover, default_symbol: impl Into<String>) -> Self {
        Self {
            failover: Arc::new(failover),
            default_symbol: default_symbol.into(),
        }
    }

    fn symbol<'a>(&'a self, requested: &'a Option<String>) -> &'a str {
        match requested.as_deref() {
            Some(symbol) if !symbol.is_empty() => symbol,
            _ => &self.default_symbol,
        }
    }
}

/// GET /api/v1/price
async fn price(
    State(state): State<GatewayState>,
    Query(params): Query<PriceParams>,
) -> Result<Json<GatewayBody<PriceBody>>, ErrorResponse> {
    let ts = required_unix("ts", &params.ts)?;
    let symbol = state.symbol(&params.symbol);

    let sourced = state
        .failover
        .price(symbol, ts)
        .await
        .map_err(ApiError::from)?;

    info!(symbol, ts = ts.timestamp(), source = ?sourced.source, "price answered");
    Ok(Json(sourced.into()))
}

/// GET /api/v1/average
async fn average(
    State(state): State<GatewayState>,
    Query(params): Query<AverageParams>,
) -> Result<Json<GatewayBody<AverageBody>>, ErrorResponse> {
    let from = required_unix("from", &params.from)?;
    let until = required_unix("until", &params.until)?;
    let granularity = Granularity::from_query(params.granularity.as_deref())?;
    let symbol = state.symbol(&params.symbol);

    let sourced = state
        .failover
        .average(symbol, from, until, granularity)
        .await
        .map_err(ApiError::from)?;

    info!(symbol, %granularity, source = ?sourced.source, "average answered");
    Ok(Json(sourced.into()))
}

/// Create the gateway routes.
pub fn gateway_routes(state: GatewayState) -> Router {
    Router::new()
        .route(PRICE_ROUTE, get(price))
        .route(AVERAGE_ROUTE, get(average))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use common::{from_unix_seconds, AverageQuote};
    use datasource::mock::MockSource;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn router(failover: Failover) -> Router {
        gateway_routes(GatewayState::new(failover, "BTCUSD"))
    }

    #[tokio::test]
    async fn test_price_from_second_source() {
        let a = MockSource::new()
            .with_price_error(ApiError::internal("timeout"))
            .with_id("A");
        let b = MockSource::new().with_price(100.0).with_id("B");
        let b_calls = b.calls();
        let failover = Failover::new()
            .with_price_source(Arc::new(a))
            .with_price_source(Arc::new(b));

        let (status, body) = get_json(router(failover), "/api/v1/price?ts=1000").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"data": {"price": 100.0}, "source": "B"}));

        // Default symbol applies when none is requested
        assert_eq!(b_calls.prices()[0].0, "BTCUSD");
    }

    #[tokio::test]
    async fn test_price_symbol_override() {
        let source = MockSource::new().with_price(1.0);
        let calls = source.calls();
        let failover = Failover::new().with_price_source(Arc::new(source));

        let (_, body) = get_json(router(failover), "/api/v1/price?ts=1&symbol=ETHUSD").await;
        assert_eq!(body["source"], Value::Null);
        assert_eq!(calls.prices()[0].0, "ETHUSD");
    }

    #[tokio::test]
    async fn test_all_sources_fail() {
        let failover = Failover::new()
            .with_price_source(Arc::new(
                MockSource::new()
                    .with_price_error(ApiError::internal("timeout"))
                    .with_id("A"),
            ))
            .with_price_source(Arc::new(
                MockSource::new().with_price_error(ApiError::no_data()),
            ));

        let (status, body) = get_json(router(failover), "/api/v1/price?ts=1000").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "NO_DATA_SOURCE_AVAILABLE");
        assert_eq!(body["attr"]["errs"]["A"]["msg"], "timeout");
        assert_eq!(body["attr"]["errs"]["1"]["code"], "NO_DATA");
    }

    #[tokio::test]
    async fn test_price_requires_ts() {
        let (status, body) = get_json(router(Failover::new()), "/api/v1/price").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "QUERY_STRING_REQUIRED");
        assert_eq!(body["attr"]["field"], "ts");

        let (_, body) = get_json(router(Failover::new()), "/api/v1/price?ts=x").await;
        assert_eq!(body["code"], "QUERY_STRING_INVALID");
    }

    #[tokio::test]
    async fn test_average_zero_width() {
        let ts = from_unix_seconds("ts", 0).unwrap();
        let source = MockSource::new()
            .with_average(AverageQuote::new(42.0, ts, ts))
            .with_id("binance");
        let calls = source.calls();
        let failover = Failover::new().with_average_source(Arc::new(source));

        let (status, body) = get_json(
            router(failover),
            "/api/v1/average?from=0&until=0&granularity=1m",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"data": {"average": 42.0, "from": 0, "until": 0}, "source": "binance"})
        );
        assert_eq!(calls.averages()[0].3, Granularity::Minute);
    }

    #[tokio::test]
    async fn test_invalid_granularity_rejected_before_failover() {
        let source = MockSource::new().with_id("binance");
        let calls = source.calls();
        let failover = Failover::new().with_average_source(Arc::new(source));

        let (status, body) = get_json(
            router(failover),
            "/api/v1/average?from=0&until=60&granularity=1w",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_GRANULARITY");
        assert_eq!(calls.average_count(), 0);
    }

    #[tokio::test]
    async fn test_average_defaults_to_finest_granularity() {
        let ts = from_unix_seconds("ts", 0).unwrap();
        let source = MockSource::new().with_average(AverageQuote::new(1.0, ts, ts));
        let calls = source.calls();
        let failover = Failover::new().with_average_source(Arc::new(source));

        let (status, _) = get_json(
            router(failover),
            "/api/v1/average?from=0&until=60&granularity=",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(calls.averages()[0].3, Granularity::Second);
    }
}
