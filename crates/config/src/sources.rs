//! `id:url` data source lists

use std::fmt;
use url::Url;

use crate::validator::ValidationError;

/// One entry of a gateway source list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub id: String,
    pub url: String,
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.url)
    }
}

/// Split a comma separated list as found in `GW_PRICE_DATASOURCE`.
///
/// Blank entries are dropped.
pub fn split_source_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `id:url`. The id ends at the first colon.
pub fn parse_source_spec(spec: &str) -> Result<SourceSpec, ValidationError> {
    let invalid = |message: &str| ValidationError::InvalidSource {
        spec: spec.to_string(),
        message: message.to_string(),
    };

    let (id, url) = spec
        .trim()
        .split_once(':')
        .ok_or_else(|| invalid("expected id:url"))?;

    if id.is_empty() {
        return Err(invalid("source id is empty"));
    }
    check_http_url(url).map_err(|message| invalid(&message))?;

    Ok(SourceSpec {
        id: id.to_string(),
        url: url.to_string(),
    })
}

pub fn parse_source_list(specs: &[String]) -> Result<Vec<SourceSpec>, ValidationError> {
    specs.iter().map(|spec| parse_source_spec(spec)).collect()
}

/// Accept absolute `http`/`https` URLs only
pub(crate) fn check_http_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("invalid url '{}': {}", raw, e))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported protocol scheme: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_env_list() {
        assert_eq!(
            split_source_list("binance:http://a, influxdb:http://b:8080,"),
            vec!["binance:http://a", "influxdb:http://b:8080"]
        );
        assert!(split_source_list("").is_empty());
    }

    #[test]
    fn test_id_ends_at_first_colon() {
        let spec = parse_source_spec("influxdb:http://influx-ds:8080/").unwrap();
        assert_eq!(spec.id, "influxdb");
        assert_eq!(spec.url, "http://influx-ds:8080/");
        assert_eq!(spec.to_string(), "influxdb:http://influx-ds:8080/");
    }

    #[test]
    fn test_rejected_specs() {
        for spec in ["binance", ":http://a", "a:ftp://host", "a:not a url"] {
            assert!(
                matches!(
                    parse_source_spec(spec),
                    Err(ValidationError::InvalidSource { .. })
                ),
                "{spec} should be rejected"
            );
        }
    }

    #[test]
    fn test_list_stops_at_first_bad_entry() {
        let specs = vec!["a:http://a".to_string(), "b".to_string()];
        let err = parse_source_list(&specs).unwrap_err();
        assert!(err.to_string().contains("'b'"));
    }
}
