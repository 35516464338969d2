//! Listen address configuration

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

/// Default ports for PriceGW services
pub mod ports {
    /// Every service listens on `:80` unless told otherwise
    pub const DEFAULT_HTTP: u16 = 80;
}

/// Host used when a listen address omits it (`:80`)
pub const ALL_INTERFACES: &str = "0.0.0.0";

/// Server bind configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(ALL_INTERFACES, ports::DEFAULT_HTTP)
    }
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `:port` or `host:port`.
    ///
    /// A bare `:port` binds every interface. IPv6 hosts must be bracketed
    /// (`[::1]:8080`).
    pub fn parse_listen_addr(addr: &str) -> Result<Self> {
        let addr = addr.trim();
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| ServerError::InvalidAddress(addr.to_string()))?;

        let port: u16 = port
            .parse()
            .map_err(|_| ServerError::InvalidAddress(addr.to_string()))?;

        let host = match host {
            "" => ALL_INTERFACES.to_string(),
            h if h.starts_with('[') && h.ends_with(']') && h.len() > 2 => h.to_string(),
            h if h.contains(':') || h.contains('[') || h.contains(']') => {
                return Err(ServerError::InvalidAddress(addr.to_string()));
            }
            h => h.to_string(),
        };

        Ok(Self { host, port })
    }

    /// Address handed to the TCP listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
