//! Request and response types for the data source API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use common::{from_unix_seconds, ApiError, AverageQuote, PriceQuote, Result};
use serde::{Deserialize, Serialize};

pub const PRICE_ROUTE: &str = "/api/v1/price";
pub const AVERAGE_ROUTE: &str = "/api/v1/average";

/// Query parameters for `GET /api/v1/price`
///
/// Everything is optional at the extractor level so that missing values
/// surface as `QUERY_STRING_REQUIRED` rather than an axum rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceParams {
    pub symbol: Option<String>,
    pub ts: Option<String>,
}

/// Query parameters for `GET /api/v1/average`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AverageParams {
    pub symbol: Option<String>,
    pub from: Option<String>,
    pub until: Option<String>,
    pub granularity: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBody {
    pub price: f64,
}

impl From<PriceQuote> for PriceBody {
    fn from(quote: PriceQuote) -> Self {
        Self { price: quote.price }
    }
}

/// Average over the actual covered bounds, in unix seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AverageBody {
    pub average: f64,
    pub from: i64,
    pub until: i64,
}

impl From<AverageQuote> for AverageBody {
    fn from(quote: AverageQuote) -> Self {
        Self {
            average: quote.average,
            from: quote.from.timestamp(),
            until: quote.until.timestamp(),
        }
    }
}

/// An [`ApiError`] rendered as `400 Bad Request`
#[derive(Debug)]
pub struct ErrorResponse(pub ApiError);

impl From<ApiError> for ErrorResponse {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self.0)).into_response()
    }
}

/// A required, non-empty query value
pub fn required<'a>(field: &str, value: &'a Option<String>) -> Result<&'a str> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::query_required(field)),
    }
}

/// A required query value holding unix seconds
pub fn required_unix(field: &str, value: &Option<String>) -> Result<DateTime<Utc>> {
    let raw = required(field, value)?;
    let secs = raw
        .parse::<i64>()
        .map_err(|e| ApiError::query_invalid(field, e))?;
    from_unix_seconds(field, secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ErrorCode;

    #[test]
    fn test_required_treats_empty_as_missing() {
        assert_eq!(required("symbol", &Some("BTCUSD".into())).unwrap(), "BTCUSD");

        let err = required("symbol", &Some(String::new())).unwrap_err();
        assert_eq!(err.code, ErrorCode::QueryStringRequired);

        let err = required("symbol", &None).unwrap_err();
        assert_eq!(err.attr("field"), Some(&serde_json::json!("symbol")));
    }

    #[test]
    fn test_required_unix() {
        let ts = required_unix("ts", &Some("1000".into())).unwrap();
        assert_eq!(ts.timestamp(), 1000);

        let err = required_unix("ts", &Some("ten".into())).unwrap_err();
        assert_eq!(err.code, ErrorCode::QueryStringInvalid);
        assert_eq!(err.attr("field"), Some(&serde_json::json!("ts")));
    }

    #[test]
    fn test_average_body_uses_unix_seconds() {
        let from = from_unix_seconds("from", 60).unwrap();
        let until = from_unix_seconds("until", 120).unwrap();
        let body = AverageBody::from(AverageQuote::new(1.5, from, until));
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!({"average": 1.5, "from": 60, "until": 120})
        );
    }
}
