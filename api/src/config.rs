//! Server configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;

/// Server configuration.
///
/// Configuration values can be set via environment variables:
/// - `LOQ_HOST`: The host address to bind to (default: "0.0.0.0")
/// - `LOQ_PORT`: The port to listen on (default: 8080)
/// - `LOQ_QUERY_TIMEOUT_SECS`: Timeout applied to queries that set none (default: 30)
#[derive(Debug, Clone)]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Default query timeout.
    pub query_timeout: Duration,
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `LOQ_PORT` is set but cannot be parsed as a valid port number
    /// - `LOQ_QUERY_TIMEOUT_SECS` is set but is not a positive integer
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("LOQ_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = std::env::var("LOQ_PORT")
            .ok()
            .map(|p| p.parse::<u16>())
            .transpose()
            .context("LOQ_PORT must be a port number")?
            .unwrap_or(8080);

        let timeout_secs = std::env::var("LOQ_QUERY_TIMEOUT_SECS")
            .ok()
            .map(|t| t.parse::<u64>())
            .transpose()
            .context("LOQ_QUERY_TIMEOUT_SECS must be a number of seconds")?
            .unwrap_or(30);
        anyhow::ensure!(timeout_secs > 0, "LOQ_QUERY_TIMEOUT_SECS must be positive");

        Ok(Self {
            host,
            port,
            query_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Returns the socket address for binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the host and port do not form a valid socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            query_timeout: Duration::from_secs(30),
        }
    }
}
