//! Data source capabilities
//!
//! Price and average lookups are separate capabilities so that a gateway
//! can register different backends for each. Identity is an optional
//! capability of its own: a source reports `Some(id)` from
//! [`SourceIdentity::source_id`] only when it has one, which the gateway
//! uses to attribute failures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AverageQuote, Granularity, PriceQuote, Result};
use std::sync::Arc;

/// Optional stable identity of a source
pub trait SourceIdentity {
    fn source_id(&self) -> Option<&str> {
        None
    }
}

/// Point price lookup
#[async_trait]
pub trait PriceSource: SourceIdentity + Send + Sync {
    async fn price(&self, symbol: &str, ts: DateTime<Utc>) -> Result<PriceQuote>;
}

/// Interval average lookup
///
/// The returned quote carries the bounds the backend actually covered,
/// which may differ from the requested ones.
#[async_trait]
pub trait AverageSource: SourceIdentity + Send + Sync {
    async fn average(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<AverageQuote>;
}

/// A source offering both capabilities
pub trait DataSource: PriceSource + AverageSource {}

impl<T: PriceSource + AverageSource + ?Sized> DataSource for T {}

/// A source decorated with a caller-assigned identity
///
/// Uniqueness of ids is the caller's concern.
#[derive(Debug, Clone)]
pub struct IdentifiedSource<S> {
    id: String,
    inner: S,
}

impl<S> IdentifiedSource<S> {
    pub fn new(id: impl Into<String>, inner: S) -> Self {
        Self {
            id: id.into(),
            inner,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S> SourceIdentity for IdentifiedSource<S> {
    fn source_id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

#[async_trait]
impl<S: PriceSource> PriceSource for IdentifiedSource<S> {
    async fn price(&self, symbol: &str, ts: DateTime<Utc>) -> Result<PriceQuote> {
        self.inner.price(symbol, ts).await
    }
}

#[async_trait]
impl<S: AverageSource> AverageSource for IdentifiedSource<S> {
    async fn average(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<AverageQuote> {
        self.inner.average(symbol, from, until, granularity).await
    }
}

impl<S: SourceIdentity + ?Sized> SourceIdentity for Arc<S> {
    fn source_id(&self) -> Option<&str> {
        (**self).source_id()
    }
}

#[async_trait]
impl<S: PriceSource + ?Sized> PriceSource for Arc<S> {
    async fn price(&self, symbol: &str, ts: DateTime<Utc>) -> Result<PriceQuote> {
        (**self).price(symbol, ts).await
    }
}

#[async_trait]
impl<S: AverageSource + ?Sized> AverageSource for Arc<S> {
    async fn average(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<AverageQuote> {
        (**self).average(symbol, from, until, granularity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{from_unix_seconds, ApiError};

    struct Fixed(f64);

    impl SourceIdentity for Fixed {}

    #[async_trait]
    impl PriceSource for Fixed {
        async fn price(&self, _symbol: &str, ts: DateTime<Utc>) -> Result<PriceQuote> {
            Ok(PriceQuote::new(self.0, ts))
        }
    }

    #[async_trait]
    impl AverageSource for Fixed {
        async fn average(
            &self,
            _symbol: &str,
            _from: DateTime<Utc>,
            _until: DateTime<Utc>,
            _granularity: Granularity,
        ) -> Result<AverageQuote> {
            Err(ApiError::no_data())
        }
    }

    #[test]
    fn test_plain_source_has_no_identity() {
        assert_eq!(Fixed(1.0).source_id(), None);
    }

    #[tokio::test]
    async fn test_identified_source_delegates() {
        let source = IdentifiedSource::new("binance", Fixed(100.0));
        assert_eq!(source.source_id(), Some("binance"));

        let ts = from_unix_seconds("ts", 1000).unwrap();
        let quote = source.price("BTCUSD", ts).await.unwrap();
        assert_eq!(quote.price, 100.0);
        assert_eq!(quote.timestamp, ts);

        let err = source
            .average("BTCUSD", ts, ts, Granularity::Minute)
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::no_data());
    }

    #[test]
    fn test_identity_visible_through_trait_object() {
        let source: Arc<dyn DataSource> = Arc::new(IdentifiedSource::new("idb", Fixed(1.0)));
        let price: Arc<dyn PriceSource> = Arc::new(source.clone());
        assert_eq!(price.source_id(), Some("idb"));
    }
}
