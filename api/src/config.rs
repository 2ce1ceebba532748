//! Server configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use anyhow::Result;
use shared::srql::Limits;
use std::net::SocketAddr;

/// Server configuration.
///
/// Configuration values can be set via environment variables:
/// - `SIGHTLINE_HOST`: The host address to bind to (default: "0.0.0.0")
/// - `SIGHTLINE_PORT`: The port to listen on (default: 8080)
/// - `SIGHTLINE_DEFAULT_LIMIT`: Page size when a query omits `limit:` (default: 100)
/// - `SIGHTLINE_MAX_LIMIT`: Hard cap on page size (default: 500)
#[derive(Debug, Clone)]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Default page size for queries without an explicit limit.
    pub default_limit: i64,
    /// Maximum page size; requested limits are clamped to this.
    pub max_limit: i64,
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `SIGHTLINE_PORT` is set but cannot be parsed as a valid port number
    /// - `SIGHTLINE_DEFAULT_LIMIT` or `SIGHTLINE_MAX_LIMIT` are set but are
    ///   not valid integers
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("SIGHTLINE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = std::env::var("SIGHTLINE_PORT")
            .ok()
            .map(|p| p.parse::<u16>())
            .transpose()?
            .unwrap_or(8080);

        let default_limit = std::env::var("SIGHTLINE_DEFAULT_LIMIT")
            .ok()
            .map(|v| v.parse::<i64>())
            .transpose()?
            .unwrap_or(100);

        let max_limit = std::env::var("SIGHTLINE_MAX_LIMIT")
            .ok()
            .map(|v| v.parse::<i64>())
            .transpose()?
            .unwrap_or(500);

        Ok(Self {
            host,
            port,
            default_limit,
            max_limit,
        })
    }

    /// Returns the socket address for binding.
    ///
    /// # Panics
    ///
    /// Panics if the host and port combination cannot be parsed as a valid socket address.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid socket address from config")
    }

    /// Page-size limits for the query engine.
    #[must_use]
    pub fn limits(&self) -> Limits {
        Limits {
            default: self.default_limit,
            max: self.max_limit,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            default_limit: 100,
            max_limit: 500,
        }
    }
}
