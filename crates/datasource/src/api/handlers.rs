//! HTTP request handlers for the data source API.

use crate::api::models::*;
use crate::source::DataSource;
use axum::extract::{Query, State};
use axum::Json;
use common::Granularity;
use std::sync::Arc;
use tracing::debug;

/// Shared state for data source API handlers.
#[derive(Clone)]
pub struct DataSourceApiState {
    pub source: Arc<dyn DataSource>,
}

impl DataSourceApiState {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }
}

/// GET /api/v1/price
pub async fn price(
    State(state): State<DataSourceApiState>,
    Query(params): Query<PriceParams>,
) -> Result<Json<PriceBody>, ErrorResponse> {
    let symbol = required("symbol", &params.symbol)?;
    let ts = required_unix("ts", &params.ts)?;

    let quote = state.source.price(symbol, ts).await?;
    debug!(symbol, ts = ts.timestamp(), price = quote.price, "price served");

    Ok(Json(quote.into()))
}

/// GET /api/v1/average
pub async fn average(
    State(state): State<DataSourceApiState>,
    Query(params): Query<AverageParams>,
) -> Result<Json<AverageBody>, ErrorResponse> {
    let symbol = required("symbol", &params.symbol)?;
    let from = required_unix("from", &params.from)?;
    let until = required_unix("until", &params.until)?;
    let granularity = Granularity::from_query(params.granularity.as_deref())?;

    let quote = state
        .source
        .average(symbol, from, until, granularity)
        .await
        .map_err(|e| e.context("request average error"))?;

    Ok(Json(quote.into()))
}
