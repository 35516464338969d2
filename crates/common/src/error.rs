//! Structured error model shared by sources, servers and the gateway
//!
//! Errors are data: every [`ApiError`] carries a machine-readable
//! [`ErrorCode`], a human-readable message and an optional attribute map.
//! The serialized form is the wire error payload
//! `{"code": ..., "msg": ..., "attr": {...}}`, so an error produced by a
//! backend server can be decoded by a client and re-surfaced unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Result type alias using [`ApiError`]
pub type Result<T> = std::result::Result<T, ApiError>;

/// Machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    QueryStringRequired,
    QueryStringInvalid,
    NoDataSourceAvailable,
    NoData,
    InvalidResultFormat,
    UnsupportedProtocolScheme,
    ResultValueMismatch,
    ResultTypeMismatch,
    InvalidGranularity,
    SourceError,
    DataParseError,
    BadStatusCode,
    RequestFailed,
    Timeout,
    /// Anything unclassified, including codes this build does not know
    #[serde(other)]
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::QueryStringRequired => "QUERY_STRING_REQUIRED",
            ErrorCode::QueryStringInvalid => "QUERY_STRING_INVALID",
            ErrorCode::NoDataSourceAvailable => "NO_DATA_SOURCE_AVAILABLE",
            ErrorCode::NoData => "NO_DATA",
            ErrorCode::InvalidResultFormat => "INVALID_RESULT_FORMAT",
            ErrorCode::UnsupportedProtocolScheme => "UNSUPPORTED_PROTOCOL_SCHEME",
            ErrorCode::ResultValueMismatch => "RESULT_VALUE_MISMATCH",
            ErrorCode::ResultTypeMismatch => "RESULT_TYPE_MISMATCH",
            ErrorCode::InvalidGranularity => "INVALID_GRANULARITY",
            ErrorCode::SourceError => "SOURCE_ERROR",
            ErrorCode::DataParseError => "DATA_PARSE_ERROR",
            ErrorCode::BadStatusCode => "BAD_STATUS_CODE",
            ErrorCode::RequestFailed => "REQUEST_FAILED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Default message used when an error is created from the bare code
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::QueryStringRequired => "query string is required",
            ErrorCode::QueryStringInvalid => "query string is invalid",
            ErrorCode::NoDataSourceAvailable => "no data source available",
            ErrorCode::NoData => "no data",
            ErrorCode::InvalidResultFormat => "invalid result format",
            ErrorCode::UnsupportedProtocolScheme => "unsupported protocol scheme",
            ErrorCode::ResultValueMismatch => "result value mismatch",
            ErrorCode::ResultTypeMismatch => "result type mismatch",
            ErrorCode::InvalidGranularity => "invalid granularity",
            ErrorCode::SourceError => "underlying data source error",
            ErrorCode::DataParseError => "data parse error",
            ErrorCode::BadStatusCode => "bad status code",
            ErrorCode::RequestFailed => "failed to send request",
            ErrorCode::Timeout => "data source timed out",
            ErrorCode::InternalError => "internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured, serializable error
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{msg}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub msg: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attr: Map<String, Value>,
}

impl ApiError {
    /// Create an error with the code's default message
    pub fn new(code: ErrorCode) -> Self {
        Self::with_message(code, code.default_message())
    }

    /// Create an error with a custom message
    pub fn with_message(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            attr: Map::new(),
        }
    }

    /// Attach an attribute, replacing any previous value under `key`
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attr.insert(key.into(), value.into());
        self
    }

    /// Prefix the message with context; code and attributes are kept
    pub fn context(mut self, context: impl fmt::Display) -> Self {
        self.msg = format!("{}: {}", context, self.msg);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attr.get(key)
    }

    pub fn query_required(field: &str) -> Self {
        Self::new(ErrorCode::QueryStringRequired)
            .with_attr("field", field)
            .context_suffix(field)
    }

    pub fn query_invalid(field: &str, details: impl fmt::Display) -> Self {
        Self::new(ErrorCode::QueryStringInvalid)
            .with_attr("field", field)
            .with_attr("details", details.to_string())
            .context_suffix(field)
    }

    pub fn no_data() -> Self {
        Self::new(ErrorCode::NoData)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InternalError, msg)
    }

    /// A value of the wrong JSON/CSV type came back from an upstream
    pub fn type_mismatch(field: &str, expect: &str, actual: impl fmt::Display) -> Self {
        let actual = actual.to_string();
        Self::with_message(
            ErrorCode::ResultTypeMismatch,
            format!(
                "{}: (expect: {}, actual: {})",
                ErrorCode::ResultTypeMismatch.default_message(),
                expect,
                actual
            ),
        )
        .with_attr("field", field)
        .with_attr("expect", expect)
        .with_attr("actual", actual)
    }

    /// A well-typed upstream value did not match what was asked for
    pub fn value_mismatch(
        field: &str,
        expect: impl Into<Value> + fmt::Display,
        actual: impl Into<Value> + fmt::Display,
    ) -> Self {
        let msg = format!(
            "{}: (expect: {}, actual: {})",
            ErrorCode::ResultValueMismatch.default_message(),
            expect,
            actual
        );
        Self::with_message(ErrorCode::ResultValueMismatch, msg)
            .with_attr("field", field)
            .with_attr("expect", expect)
            .with_attr("actual", actual)
    }

    fn context_suffix(mut self, suffix: &str) -> Self {
        self.msg = format!("{}: {}", self.msg, suffix);
        self
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::new(ErrorCode::DataParseError).with_attr("err", err.to_string())
    }
}
