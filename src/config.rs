//! Connection configuration.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::control::Credentials;
use crate::error::Result;
use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;

/// Default Rserve port.
pub const DEFAULT_PORT: u16 = 6311;

/// Settings for one connection.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use rserve_client::ConnectionConfig;
///
/// let config = ConnectionConfig::from_json(r#"{ "port": 6331, "command_timeout_ms": 5000 }"#).unwrap();
/// assert_eq!(config.host, "127.0.0.1");
/// assert_eq!(config.port, 6331);
/// ```
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Server host name or address.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// User name, needed when the server requires login.
    pub user: Option<String>,

    /// Password, needed when the server requires login.
    pub password: Option<String>,

    /// Limit on connecting plus the handshake, in milliseconds.
    pub connect_timeout_ms: Option<u64>,

    /// Limit on each command exchange, in milliseconds.
    pub command_timeout_ms: Option<u64>,

    /// Largest response body accepted, in bytes.
    pub max_payload_size: u64,

    /// Set `TCP_NODELAY` on the socket.
    pub nodelay: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: DEFAULT_PORT,
            user: None,
            password: None,
            connect_timeout_ms: None,
            command_timeout_ms: None,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            nodelay: true,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

impl ConnectionConfig {
    /// Load from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    /// Command timeout as a `Duration`.
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_ms.map(Duration::from_millis)
    }

    /// User and password.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("command_timeout_ms", &self.command_timeout_ms)
            .field("max_payload_size", &self.max_payload_size)
            .field("nodelay", &self.nodelay)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 6311);
        assert_eq!(config.max_payload_size, 1 << 30);
        assert!(config.nodelay);
        assert!(config.command_timeout().is_none());
    }

    #[test]
    fn test_from_json_partial() {
        let config = ConnectionConfig::from_json(
            r#"{ "host": "r.example", "user": "ann", "password": "pw", "connect_timeout_ms": 1500 }"#,
        )
        .unwrap();
        assert_eq!(config.host, "r.example");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.connect_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.credentials().user.as_deref(), Some("ann"));
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(ConnectionConfig::from_json(r#"{ "port": "x" }"#).is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ConnectionConfig {
            password: Some("hunter2".into()),
            ..Default::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }
}
