//! Collector lifecycle and scheduling loop
//!
//! States are `Idle -> Running -> Stopping -> Idle`. `start` and `stop`
//! each take effect exactly once per lifecycle: the transition is an atomic
//! compare-and-swap made under the `run` lock, so losing callers return
//! `false` immediately instead of blocking. Every run gets a fresh
//! [`CancellationToken`], which is what makes a stopped collector
//! restartable.
//!
//! Cycles hold the cycle gate for their whole duration and `stop` takes the
//! gate before returning to `Idle`, so cycles never overlap, not even
//! across a restart.

use chrono::{DateTime, DurationRound, Utc};
use datasource::PriceSource;
use observability::CollectorMetrics;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storage::Writer;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::CollectError;

/// Sampling interval used unless overridden
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPING: u8 = 2;

/// Observable lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Idle,
    Running,
    Stopping,
}

impl CollectorState {
    fn from_u8(value: u8) -> Self {
        match value {
            RUNNING => CollectorState::Running,
            STOPPING => CollectorState::Stopping,
            _ => CollectorState::Idle,
        }
    }
}

/// Instant to sample at `now`: one interval back, truncated to the interval
///
/// The current bucket may still be forming, so the collector always asks
/// for the previous one.
pub fn sample_instant(now: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    let step = chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::minutes(1));
    let shifted = now - step;
    shifted.duration_trunc(step).unwrap_or(shifted)
}

/// The loop task of a running collector
struct Run {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    source: Arc<dyn PriceSource>,
    writer: Arc<dyn Writer>,
    symbol: String,
    interval: Duration,
    state: AtomicU8,
    run: Mutex<Option<Run>>,
    cycle_gate: tokio::sync::Mutex<()>,
    metrics: CollectorMetrics,
}

/// Periodic collector
///
/// Cloning yields another handle onto the same collector.
#[derive(Clone)]
pub struct Collector {
    inner: Arc<Inner>,
}

impl Collector {
    pub fn new(
        source: Arc<dyn PriceSource>,
        writer: Arc<dyn Writer>,
        symbol: impl Into<String>,
    ) -> Self {
        Self::build(source, writer, symbol.into(), DEFAULT_INTERVAL)
    }

    /// Replace the sampling interval. A zero interval keeps the default.
    ///
    /// Only valid before the first start.
    pub fn with_interval(self, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            warn!("zero collector interval ignored");
            DEFAULT_INTERVAL
        } else {
            interval
        };
        let inner = &self.inner;
        Self::build(
            inner.source.clone(),
            inner.writer.clone(),
            inner.symbol.clone(),
            interval,
        )
    }

    fn build(
        source: Arc<dyn PriceSource>,
        writer: Arc<dyn Writer>,
        symbol: String,
        interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                metrics: CollectorMetrics::new(&symbol),
                source,
                writer,
                symbol,
                interval,
                state: AtomicU8::new(IDLE),
                run: Mutex::new(None),
                cycle_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.inner.symbol
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn state(&self) -> CollectorState {
        CollectorState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    /// Start collecting
    ///
    /// Runs one cycle before returning, then leaves the timer loop running
    /// in the background. Returns `false` when the collector was not idle.
    pub async fn start(&self) -> bool {
        let token = CancellationToken::new();
        {
            let mut slot = self.inner.run.lock();
            if self
                .inner
                .state
                .compare_exchange(IDLE, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                debug!(symbol = %self.inner.symbol, "start ignored, collector not idle");
                return false;
            }
            *slot = Some(Run {
                token: token.clone(),
                handle: None,
            });
        }
        info!(
            symbol = %self.inner.symbol,
            interval_secs = self.inner.interval.as_secs(),
            "collector started"
        );

        self.inner.cycle().await;

        // A stop that arrived during the first cycle cancelled our token; the
        // slot may already hold a later run
        let mut slot = self.inner.run.lock();
        if let Some(run) = slot.as_mut() {
            if !token.is_cancelled() {
                run.handle = Some(tokio::spawn(self.inner.clone().run_loop(token)));
            }
        }

        true
    }

    /// Stop collecting and wait for the loop to exit
    ///
    /// A cycle in flight completes first, including the first cycle of a
    /// `start` that has not returned yet. Returns `false` when the
    /// collector was not running.
    pub async fn stop(&self) -> bool {
        let run = {
            let mut slot = self.inner.run.lock();
            if self
                .inner
                .state
                .compare_exchange(RUNNING, STOPPING, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                debug!(symbol = %self.inner.symbol, "stop ignored, collector not running");
                return false;
            }
            slot.take()
        };

        if let Some(run) = run {
            run.token.cancel();
            if let Some(handle) = run.handle {
                if let Err(e) = handle.await {
                    error!(symbol = %self.inner.symbol, error = %e, "collector loop panicked");
                }
            }
        }
        drop(self.inner.cycle_gate.lock().await);

        self.inner.state.store(IDLE, Ordering::SeqCst);
        info!(symbol = %self.inner.symbol, "collector stopped");
        true
    }

    /// Run one collection cycle outside the schedule
    ///
    /// Waits for a scheduled cycle in flight to finish first.
    pub async fn collect_once(&self) -> Result<DateTime<Utc>, CollectError> {
        let _gate = self.inner.cycle_gate.lock().await;
        self.inner.collect().await
    }

    /// Start, wait for `shutdown`, then stop
    pub async fn run_until(&self, shutdown: CancellationToken) {
        self.start().await;
        shutdown.cancelled().await;
        self.stop().await;
    }
}

impl Inner {
    async fn run_loop(self: Arc<Self>, token: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => self.cycle().await,
            }
        }

        debug!(symbol = %self.symbol, "collector loop exited");
    }

    /// One cycle; failures are logged, never propagated
    async fn cycle(&self) {
        let _gate = self.cycle_gate.lock().await;
        match self.collect().await {
            Ok(ts) => {
                self.metrics.cycle_succeeded(ts.timestamp());
                debug!(symbol = %self.symbol, ts = %ts, "collection cycle complete");
            }
            Err(e) => {
                self.metrics.cycle_failed();
                warn!(
                    symbol = %self.symbol,
                    code = %e.code(),
                    error = %e,
                    "collection cycle failed"
                );
            }
        }
    }

    async fn collect(&self) -> Result<DateTime<Utc>, CollectError> {
        let ts = sample_instant(Utc::now(), self.interval);

        let quote = self
            .source
            .price(&self.symbol, ts)
            .await
            .map_err(CollectError::Price)?;

        self.writer
            .write_price(&self.symbol, quote.price, ts)
            .await?;

        Ok(ts)
    }
}
