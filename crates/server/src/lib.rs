//! Server infrastructure shared by every PriceGW service
//!
//! Each service (gateway, Binance backend, InfluxDB backend) is an axum
//! [`Router`](axum::Router) wrapped in an [`HttpServer`]. The wrapper adds
//! the `/health` route and request tracing, binds the configured listen
//! address and drains connections when its [`CancellationToken`] fires.
//!
//! # Example
//!
//! ```ignore
//! use server::{HttpServer, ServerConfig, ServerExt};
//!
//! let config = ServerConfig::parse_listen_addr(":80")?;
//! let server = HttpServer::for_service(config, "gateway", routes);
//! server.run_with_ctrl_c().await?;
//! ```
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod shutdown;
pub mod traits;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use health::{health_routes, HealthState, HealthStatus};
pub use http::HttpServer;
pub use shutdown::ShutdownController;
pub use traits::{Server, ServerExt};
