//! Axum route definitions for the data source API.

use crate::api::handlers::{self, DataSourceApiState};
use crate::api::models::{AVERAGE_ROUTE, PRICE_ROUTE};
use crate::source::DataSource;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

/// Create the data source routes.
///
/// # Routes
///
/// - `GET /api/v1/price?symbol&ts` - Point price
/// - `GET /api/v1/average?symbol&from&until&granularity` - Interval average
pub fn datasource_routes(source: Arc<dyn DataSource>) -> Router {
    Router::new()
        .route(PRICE_ROUTE, get(handlers::price))
        .route(AVERAGE_ROUTE, get(handlers::average))
        .with_state(DataSourceApiState::new(source))
}
