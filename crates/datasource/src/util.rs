use common::{ApiError, ErrorCode, Result};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Parse a base URL, accepting only http and https
pub(crate) fn parse_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url).map_err(|e| {
        ApiError::new(ErrorCode::DataParseError)
            .with_attr("field", "url")
            .with_attr("err", e.to_string())
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ApiError::with_message(
            ErrorCode::UnsupportedProtocolScheme,
            format!("unsupported protocol scheme: {}", scheme),
        )
        .with_attr("protocol", scheme)),
    }
}

/// Append path segments to the base URL's own path
pub(crate) fn join_path(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    let mut path = base.path().trim_end_matches('/').to_string();
    for segment in segments {
        path.push('/');
        path.push_str(segment.trim_matches('/'));
    }
    url.set_path(&path);
    url
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| ApiError::internal(format!("failed to build http client: {}", e)))
}

pub(crate) fn request_failed(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(ErrorCode::Timeout).with_attr("err", err.to_string());
    }
    ApiError::new(ErrorCode::RequestFailed).with_attr("err", err.to_string())
}

/// Wrap a lower-level failure as a source error, keeping the cause under `err`
pub(crate) fn source_error(cause: ApiError) -> ApiError {
    let msg = format!("{}: {}", ErrorCode::SourceError.default_message(), cause.msg);
    let cause = serde_json::to_value(&cause).unwrap_or_else(|_| Value::String(cause.msg));
    ApiError::with_message(ErrorCode::SourceError, msg).with_attr("err", cause)
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Escape a value for use inside a double-quoted Flux string
pub(crate) fn escape_double_quote(s: &str) -> String {
    s.replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_url_schemes() {
        assert!(parse_base_url("https://api.binance.us/").is_ok());
        assert!(parse_base_url("http://localhost:8080").is_ok());

        let err = parse_base_url("ftp://example.com").unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedProtocolScheme);
        assert_eq!(err.attr("protocol"), Some(&Value::from("ftp")));

        let err = parse_base_url("not a url").unwrap_err();
        assert_eq!(err.code, ErrorCode::DataParseError);
    }

    #[test]
    fn test_join_path_keeps_base_path() {
        let base = Url::parse("http://localhost:9000/proxy/").unwrap();
        let url = join_path(&base, &["api/v1", "price"]);
        assert_eq!(url.as_str(), "http://localhost:9000/proxy/api/v1/price");

        let base = Url::parse("https://api.binance.us/").unwrap();
        let url = join_path(&base, &["api/v3/klines"]);
        assert_eq!(url.as_str(), "https://api.binance.us/api/v3/klines");
    }

    #[test]
    fn test_source_error_keeps_cause() {
        let err = source_error(ApiError::no_data());
        assert_eq!(err.code, ErrorCode::SourceError);
        assert_eq!(err.attr("err").unwrap()["code"], "NO_DATA");
    }

    #[test]
    fn test_escape_double_quote() {
        assert_eq!(escape_double_quote(r#"my"bucket"#), r#"my\"bucket"#);
    }
}
