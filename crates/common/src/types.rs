//! Value types produced and consumed by data sources

use crate::error::{ApiError, ErrorCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Averaging bucket width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Granularity {
    #[default]
    #[serde(rename = "1s")]
    Second,
    #[serde(rename = "1m")]
    Minute,
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "1d")]
    Day,
    #[serde(rename = "1M")]
    Month,
}

impl Granularity {
    pub const ALL: [Granularity; 5] = [
        Granularity::Second,
        Granularity::Minute,
        Granularity::Hour,
        Granularity::Day,
        Granularity::Month,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Second => "1s",
            Granularity::Minute => "1m",
            Granularity::Hour => "1h",
            Granularity::Day => "1d",
            Granularity::Month => "1M",
        }
    }

    /// Exact, case-sensitive membership test. `"1m"` and `"1M"` differ.
    pub fn is_valid(value: &str) -> bool {
        Self::ALL.iter().any(|g| g.as_str() == value)
    }

    /// Resolve a request value: absent or empty selects the finest
    /// granularity, anything else must be a member of the set.
    pub fn from_query(value: Option<&str>) -> Result<Self, ApiError> {
        match value {
            None | Some("") => Ok(Self::default()),
            Some(v) => v.parse(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| {
                ApiError::with_message(
                    ErrorCode::InvalidGranularity,
                    format!("invalid granularity: \"{}\" is not supported", s),
                )
                .with_attr("field", "granularity")
                .with_attr("value", s)
            })
    }
}

/// A single price observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    pub price: f64,
    /// Instant the price was sampled for
    pub timestamp: DateTime<Utc>,
}

impl PriceQuote {
    pub fn new(price: f64, timestamp: DateTime<Utc>) -> Self {
        Self { price, timestamp }
    }
}

/// An averaged observation over the interval a backend actually covered
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AverageQuote {
    pub average: f64,
    pub from: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl AverageQuote {
    pub fn new(average: f64, from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            average,
            from,
            until,
        }
    }

    /// Boundary law: a zero-width interval is the point price itself
    pub fn point(quote: PriceQuote) -> Self {
        Self::new(quote.price, quote.timestamp, quote.timestamp)
    }
}

/// Convert unix seconds into a UTC instant
pub fn from_unix_seconds(field: &str, secs: i64) -> Result<DateTime<Utc>, ApiError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| ApiError::query_invalid(field, format!("timestamp {} out of range", secs)))
}

/// Convert unix milliseconds into a UTC instant
pub fn from_unix_millis(field: &str, millis: i64) -> Result<DateTime<Utc>, ApiError> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        ApiError::with_message(
            ErrorCode::DataParseError,
            format!("timestamp {}ms out of range", millis),
        )
        .with_attr("field", field)
    })
}
