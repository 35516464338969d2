//! Recording writer for tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::StorageError;
use crate::writer::Writer;
use crate::Result;

/// A point accepted by [`MockWriter`]
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenPrice {
    pub symbol: String,
    pub price: f64,
    pub ts: DateTime<Utc>,
}

/// Mock writer for testing
///
/// Accepts every write unless failures are queued with [`MockWriter::fail_next`].
#[derive(Debug, Clone, Default)]
pub struct MockWriter {
    written: Arc<Mutex<Vec<WrittenPrice>>>,
    failures: Arc<Mutex<VecDeque<String>>>,
}

impl MockWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `n` writes
    pub fn fail_next(&self, n: usize, reason: &str) {
        let mut failures = self.failures.lock();
        failures.extend(std::iter::repeat(reason.to_string()).take(n));
    }

    pub fn written(&self) -> Vec<WrittenPrice> {
        self.written.lock().clone()
    }
}

#[async_trait]
impl Writer for MockWriter {
    async fn write_price(&self, symbol: &str, price: f64, ts: DateTime<Utc>) -> Result<()> {
        if let Some(reason) = self.failures.lock().pop_front() {
            return Err(StorageError::Connection(reason));
        }
        self.written.lock().push(WrittenPrice {
            symbol: symbol.to_string(),
            price,
            ts,
        });
        Ok(())
    }
}
