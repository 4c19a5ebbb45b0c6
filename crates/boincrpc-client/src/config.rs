use std::time::Duration;

use boincrpc_common::protocol::error::{BoincRpcError, Result};
use boincrpc_common::transport::DEFAULT_PORT;

/// Connection settings for a [`BoincRpcClient`](crate::BoincRpcClient).
///
/// # Default Configuration
///
/// - `host`: `localhost`
/// - `port`: 31416
/// - `timeout`: none (blocking calls wait indefinitely)
///
/// # Example
///
/// ```rust
/// use boincrpc_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_host("192.168.1.20")
///     .with_timeout(Duration::from_secs(10));
/// assert_eq!(config.port, 31416);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Host name or address of the daemon
    pub host: String,
    /// GUI RPC port
    pub port: u16,
    /// Bound on connecting and on each socket read/write
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Checks the settings before any socket is opened.
    ///
    /// # Errors
    ///
    /// Returns [`BoincRpcError::InvalidConfig`] for an empty host or a zero
    /// timeout, which the socket layer cannot apply.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(BoincRpcError::InvalidConfig("host must not be empty".to_string()));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(BoincRpcError::InvalidConfig("timeout must be greater than zero".to_string()));
        }
        Ok(())
    }
}
