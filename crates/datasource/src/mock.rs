//! Scripted in-memory data source for tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ApiError, AverageQuote, Granularity, PriceQuote, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::source::{AverageSource, PriceSource, SourceIdentity};

type PriceCall = (String, DateTime<Utc>);
type AverageCall = (String, DateTime<Utc>, DateTime<Utc>, Granularity);

#[derive(Debug, Default)]
struct CallLog {
    prices: Vec<PriceCall>,
    averages: Vec<AverageCall>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Handle onto the calls a [`MockSource`] received
#[derive(Debug, Clone, Default)]
pub struct MockCalls(Arc<Mutex<CallLog>>);

impl MockCalls {
    pub fn prices(&self) -> Vec<PriceCall> {
        self.0.lock().prices.clone()
    }

    pub fn averages(&self) -> Vec<AverageCall> {
        self.0.lock().averages.clone()
    }

    pub fn price_count(&self) -> usize {
        self.0.lock().prices.len()
    }

    pub fn average_count(&self) -> usize {
        self.0.lock().averages.len()
    }

    /// Highest number of price calls that were pending at the same time
    pub fn max_concurrent_prices(&self) -> usize {
        self.0.lock().max_in_flight
    }

    fn enter(&self) -> InFlight {
        let mut log = self.0.lock();
        log.in_flight += 1;
        log.max_in_flight = log.max_in_flight.max(log.in_flight);
        InFlight(self.clone())
    }
}

/// Counts a pending price call until dropped, completed or cancelled
struct InFlight(MockCalls);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0 .0.lock().in_flight -= 1;
    }
}

/// Mock source for testing
///
/// Without configuration every call fails with `NO_DATA`. Scripted price
/// responses are consumed first, then the fixed response applies.
pub struct MockSource {
    id: Option<String>,
    price: Result<f64>,
    average: Result<AverageQuote>,
    script: Mutex<VecDeque<Result<f64>>>,
    delay: Option<Duration>,
    calls: MockCalls,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            id: None,
            price: Err(ApiError::no_data()),
            average: Err(ApiError::no_data()),
            script: Mutex::new(VecDeque::new()),
            delay: None,
            calls: MockCalls::default(),
        }
    }

    /// Report an identity
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Answer every price call with `price` at the requested instant
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Ok(price);
        self
    }

    pub fn with_price_error(mut self, err: ApiError) -> Self {
        self.price = Err(err);
        self
    }

    /// Queue price responses ahead of the fixed one
    pub fn with_script(self, script: impl IntoIterator<Item = Result<f64>>) -> Self {
        self.script.lock().extend(script);
        self
    }

    pub fn with_average(mut self, quote: AverageQuote) -> Self {
        self.average = Ok(quote);
        self
    }

    pub fn with_average_error(mut self, err: ApiError) -> Self {
        self.average = Err(err);
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> MockCalls {
        self.calls.clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceIdentity for MockSource {
    fn source_id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[async_trait]
impl PriceSource for MockSource {
    async fn price(&self, symbol: &str, ts: DateTime<Utc>) -> Result<PriceQuote> {
        self.calls.0.lock().prices.push((symbol.to_string(), ts));
        let _pending = self.calls.enter();
        self.pause().await;

        let scripted = self.script.lock().pop_front();
        scripted
            .unwrap_or_else(|| self.price.clone())
            .map(|price| PriceQuote::new(price, ts))
    }
}

#[async_trait]
impl AverageSource for MockSource {
    async fn average(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        granularity: Granularity,
    ) -> Result<AverageQuote> {
        self.calls
            .0
            .lock()
            .averages
            .push((symbol.to_string(), from, until, granularity));
        self.pause().await;

        self.average.clone()
    }
}
