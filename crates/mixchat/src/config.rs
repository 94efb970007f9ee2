//! Client configuration and its builder.

use std::time::Duration;

use mixchat_poll::DEFAULT_INTERVAL;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::MixchatError;

/// Path the relay serves its socket on.
pub const DEFAULT_PATH: &str = "/mix";

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Where the relay lives and how the engine talks to it.
///
/// Host and port are supplied by whatever launched the relay; the engine
/// does not negotiate them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Relay host name or IP address.
    pub host: String,

    /// Relay port.
    pub port: u16,

    /// Use `wss://` instead of `ws://`.
    pub secure: bool,

    /// Socket path on the relay.
    pub path: String,

    /// Cadence of fetch requests while the connection is open.
    pub poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
            secure: false,
            path: DEFAULT_PATH.to_string(),
            poll_interval: DEFAULT_INTERVAL,
        }
    }
}

impl ClientConfig {
    /// Creates a new builder starting from the defaults.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Builds the socket URL, `ws(s)://<host>:<port><path>`.
    ///
    /// # Errors
    /// Returns [`MixchatError::InvalidConfig`] if the host or path cannot
    /// form a URL.
    pub fn endpoint(&self) -> Result<Url, MixchatError> {
        let scheme = if self.secure { "wss" } else { "ws" };

        // Bare IPv6 literals need brackets inside a URL authority.
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };

        let mut url = Url::parse(&format!("{scheme}://{host}:{}", self.port))
            .map_err(|e| {
                MixchatError::InvalidConfig(format!(
                    "relay address {host}:{}: {e}",
                    self.port
                ))
            })?;
        url.set_path(&self.path);
        Ok(url)
    }

    /// Checks everything the connection relies on.
    ///
    /// # Errors
    /// Returns [`MixchatError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<(), MixchatError> {
        if self.poll_interval.is_zero() {
            return Err(MixchatError::InvalidConfig(
                "poll interval must be non-zero".into(),
            ));
        }
        self.endpoint().map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`ClientConfig`].
///
/// ```rust
/// use std::time::Duration;
/// use mixchat::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .host("10.0.0.7")
///     .port(1977)
///     .poll_interval(Duration::from_millis(500))
///     .build()
///     .unwrap();
/// assert_eq!(config.endpoint().unwrap().as_str(), "ws://10.0.0.7:1977/mix");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.config.secure = secure;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.config.path = path.into();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    /// See [`ClientConfig::validate`].
    pub fn build(self) -> Result<ClientConfig, MixchatError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
