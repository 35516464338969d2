//! Periodic price collector for PriceGW
//!
//! Samples one data source on a fixed cadence and writes each price to
//! storage. A failing cycle is logged and the next tick tries again.
//!
//! ```ignore
//! let collector = Collector::new(source, writer, "BTCUSD");
//! collector.run_until(shutdown_token).await;
//! ```

pub mod scheduler;
pub mod error;

pub use scheduler::{sample_instant, Collector, CollectorState, DEFAULT_INTERVAL};
pub use error::CollectError;
