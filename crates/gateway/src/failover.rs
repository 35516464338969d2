//! Try-in-order failover across data sources
//!
//! One pass, strictly sequential: sources are called in registration order
//! and the first success wins. Nothing is raced or retried. Every
//! failure is kept in an [`ErrorSet`] under the source's identity, or under
//! its position when the source has none.

use chrono::{DateTime, Utc};
use common::{ApiError, AverageQuote, ErrorCode, Granularity, PriceQuote};
use datasource::{AverageSource, PriceSource};
use observability::metrics::{record_failover_exhausted, record_source_attempt, AttemptOutcome};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Per-source failures collected during one failover pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ErrorSet(BTreeMap<String, ApiError>);

impl ErrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, err: ApiError) {
        self.0.insert(key.into(), err);
    }

    pub fn get(&self, key: &str) -> Option<&ApiError> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ApiError)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A successful result and the identity of the source that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub data: T,
    pub source: Option<String>,
}

/// Aggregate failure of a failover pass
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FailoverError {
    /// Every registered source failed, or none is registered
    #[error("no data source available ({} failed)", .0.len())]
    NoSourceAvailable(ErrorSet),
}

impl FailoverError {
    pub fn errors(&self) -> &ErrorSet {
        match self {
            FailoverError::NoSourceAvailable(errors) => errors,
        }
    }
}

impl From<FailoverError> for ApiError {
    fn from(err: FailoverError) -> Self {
        let FailoverError::NoSourceAvailable(errors) = err;
        let errs = serde_json::to_value(&errors).unwrap_or_default();
        ApiError::new(ErrorCode::NoDataSourceAvailable).with_attr("errs", errs)
    }
}

/// Failover aggregator holding the ordered sources for each capability
///
/// Source lists are fixed at construction.
#[derive(Clone, Default)]
pub struct Failover {
    price_sources: Vec<Arc<dyn PriceSource>>,
    average_sources: Vec<Arc<dyn AverageSource>>,
    source_timeout: Option<Duration>,
}

impl Failover {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a price source; call order is registration order
    pub fn with_price_source(mut self, source: Arc<dyn PriceSource>) -> Self {
        self.price_sources.push(source);
        self
    }

    /// Append an average source; call order is registration order
    pub fn with_average_source(mut self, source: Arc<dyn AverageSource>) -> Self {
        self.average_sources.push(source);
        self
    }

    /// Bound every individual source call
    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = Some(timeout);
        self
    }

    pub fn price_source_count(&self) -> usize {
        self.price_sources.len()
    }

    pub fn average_source_count(&self) -> usize {
        self.average_sources.len()
    }

    pub fn source_timeout(&self) -> Option<Duration> {
        self.source_timeout
    }

    /// Price from the first source that answers
    pub async fn price(
        &self,
        symbol: &str,
        ts: DateTime<Utc>,
    ) -> Result<Sourced<PriceQuote>, FailoverError> {
        let attempts = self
            .price_sources
            .iter()
            .map(|source| (source.source_id().map(str::to_string), source.price(symbol, ts)));

        self.first_success("price", attempts).await
    }

    /// Average from the first source that answers
    ///
    /// Interval ordering is left to the sources; a rejection is recorded
    /// like any other failure.
    pub async fn average(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<Sourced<AverageQuote>, FailoverError> {
        let attempts = self.average_sources.iter().map(|source| {
            (
                source.source_id().map(str::to_string),
                source.average(symbol, from, until, granularity),
            )
        });

        self.first_success("average", attempts).await
    }

    /// Await `attempts` one at a time until one succeeds
    ///
    /// The iterator is lazy, so a source is not called until every source
    /// before it has failed.
    async fn first_success<T, F>(
        &self,
        capability: &'static str,
        attempts: impl Iterator<Item = (Option<String>, F)>,
    ) -> Result<Sourced<T>, FailoverError>
    where
        F: Future<Output = common::Result<T>>,
    {
        let mut errors = ErrorSet::new();

        for (index, (id, attempt)) in attempts.enumerate() {
            let key = id.clone().unwrap_or_else(|| index.to_string());
            let started = Instant::now();

            let result = match self.source_timeout {
                Some(limit) => tokio::time::timeout(limit, attempt)
                    .await
                    .unwrap_or_else(|_| Err(timeout_error(limit))),
                None => attempt.await,
            };

            match result {
                Ok(data) => {
                    record_source_attempt(
                        capability,
                        &key,
                        AttemptOutcome::Success,
                        started.elapsed(),
                    );
                    debug!(capability, source = %key, "source answered");
                    return Ok(Sourced { data, source: id });
                }
                Err(err) => {
                    let outcome = if err.code == ErrorCode::Timeout {
                        AttemptOutcome::Timeout
                    } else {
                        AttemptOutcome::Failure
                    };
                    record_source_attempt(capability, &key, outcome, started.elapsed());
                    warn!(capability, source = %key, code = %err.code, error = %err, "source failed");
                    errors.insert(key, err);
                }
            }
        }

        record_failover_exhausted(capability);
        warn!(capability, failed = errors.len(), "no data source available");
        Err(FailoverError::NoSourceAvailable(errors))
    }
}

fn timeout_error(limit: Duration) -> ApiError {
    ApiError::new(ErrorCode::Timeout).with_attr("timeout_ms", limit.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::from_unix_seconds;
    use datasource::mock::MockSource;
    use datasource::IdentifiedSource;
    use serde_json::json;

    fn ts(secs: i64) -> DateTime<Utc> {
        from_unix_seconds("ts", secs).unwrap()
    }

    fn failing(reason: &str) -> MockSource {
        MockSource::new().with_price_error(ApiError::internal(reason))
    }

    #[tokio::test]
    async fn test_first_success_wins_and_later_sources_untouched() {
        let a = failing("timeout").with_id("A");
        let b = MockSource::new().with_price(100.0).with_id("B");
        let c = MockSource::new().with_price(200.0).with_id("C");
        let (a_calls, b_calls, c_calls) = (a.calls(), b.calls(), c.calls());

        let failover = Failover::new()
            .with_price_source(Arc::new(a))
            .with_price_source(Arc::new(b))
            .with_price_source(Arc::new(c));

        let result = failover.price("BTCUSD", ts(1000)).await.unwrap();
        assert_eq!(result.data.price, 100.0);
        assert_eq!(result.data.timestamp, ts(1000));
        assert_eq!(result.source.as_deref(), Some("B"));

        assert_eq!(a_calls.price_count(), 1);
        assert_eq!(b_calls.price_count(), 1);
        assert_eq!(c_calls.price_count(), 0);
    }

    #[tokio::test]
    async fn test_all_fail_keeps_every_error() {
        let failover = Failover::new()
            .with_price_source(Arc::new(failing("timeout").with_id("A")))
            .with_price_source(Arc::new(failing("bad gateway").with_id("B")));

        let err = failover.price("BTCUSD", ts(1000)).await.unwrap_err();
        let errors = err.errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("A").unwrap().msg, "timeout");
        assert_eq!(errors.get("B").unwrap().msg, "bad gateway");
    }

    #[tokio::test]
    async fn test_unidentified_sources_keyed_by_position() {
        let failover = Failover::new()
            .with_price_source(Arc::new(failing("x").with_id("binance")))
            .with_price_source(Arc::new(failing("y")))
            .with_price_source(Arc::new(failing("z")));

        let err = failover.price("BTCUSD", ts(0)).await.unwrap_err();
        let keys: Vec<&str> = err.errors().keys().collect();
        assert_eq!(keys, vec!["1", "2", "binance"]);
        assert_eq!(err.errors().get("2").unwrap().msg, "z");
    }

    #[tokio::test]
    async fn test_no_sources() {
        let failover = Failover::new();

        let err = failover.price("BTCUSD", ts(0)).await.unwrap_err();
        assert!(err.errors().is_empty());

        let err = failover
            .average("BTCUSD", ts(0), ts(60), Granularity::Minute)
            .await
            .unwrap_err();
        assert!(err.errors().is_empty());
    }

    #[tokio::test]
    async fn test_success_without_identity_has_no_source() {
        let failover =
            Failover::new().with_price_source(Arc::new(MockSource::new().with_price(5.0)));

        let result = failover.price("BTCUSD", ts(0)).await.unwrap();
        assert_eq!(result.source, None);
    }

    #[tokio::test]
    async fn test_identified_source_wrapper() {
        let failover = Failover::new().with_price_source(Arc::new(IdentifiedSource::new(
            "idb",
            MockSource::new().with_price(7.0),
        )));

        let result = failover.price("BTCUSD", ts(0)).await.unwrap();
        assert_eq!(result.source.as_deref(), Some("idb"));
    }

    #[tokio::test]
    async fn test_average_passes_arguments_and_actual_bounds() {
        let actual = AverageQuote::new(42.0, ts(0), ts(0));
        let source = MockSource::new().with_average(actual).with_id("binance");
        let calls = source.calls();

        let failover = Failover::new()
            .with_average_source(Arc::new(
                MockSource::new().with_average_error(ApiError::no_data()),
            ))
            .with_average_source(Arc::new(source));

        let result = failover
            .average("BTCUSD", ts(0), ts(0), Granularity::Minute)
            .await
            .unwrap();
        assert_eq!(result.data, actual);
        assert_eq!(result.source.as_deref(), Some("binance"));
        assert_eq!(
            calls.averages(),
            vec![("BTCUSD".to_string(), ts(0), ts(0), Granularity::Minute)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out_and_falls_through() {
        let slow = MockSource::new()
            .with_price(1.0)
            .with_delay(Duration::from_secs(60))
            .with_id("slow");
        let fast = MockSource::new().with_price(2.0).with_id("fast");

        let failover = Failover::new()
            .with_price_source(Arc::new(slow))
            .with_price_source(Arc::new(fast))
            .with_source_timeout(Duration::from_millis(500));

        let result = failover.price("BTCUSD", ts(0)).await.unwrap();
        assert_eq!(result.source.as_deref(), Some("fast"));
        assert_eq!(result.data.price, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_recorded_in_error_set() {
        let failover = Failover::new()
            .with_price_source(Arc::new(
                MockSource::new()
                    .with_delay(Duration::from_secs(5))
                    .with_id("slow"),
            ))
            .with_source_timeout(Duration::from_secs(1));

        let err = failover.price("BTCUSD", ts(0)).await.unwrap_err();
        let timeout = err.errors().get("slow").unwrap();
        assert_eq!(timeout.code, ErrorCode::Timeout);
        assert_eq!(timeout.attr("timeout_ms"), Some(&json!(1000)));
    }

    #[test]
    fn test_failover_error_payload() {
        let mut errors = ErrorSet::new();
        errors.insert("A", ApiError::internal("timeout"));
        errors.insert("0", ApiError::no_data());

        let api: ApiError = FailoverError::NoSourceAvailable(errors).into();
        assert_eq!(
            serde_json::to_value(&api).unwrap(),
            json!({
                "code": "NO_DATA_SOURCE_AVAILABLE",
                "msg": "no data source available",
                "attr": {
                    "errs": {
                        "0": {"code": "NO_DATA", "msg": "no data"},
                        "A": {"code": "INTERNAL_ERROR", "msg": "timeout"}
                    }
                }
            })
        );
    }
}
