// ── Runtime session configuration ──
//
// Describes *how* to reach one gateway node. Carries the bearer token and
// connection tuning but never touches disk: the CLI (through vigil-config)
// builds a `SessionConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use url::Url;
use vigil_api::{DEFAULT_NODE, Endpoint, TlsMode, TransportConfig};

use crate::connection::ReconnectConfig;

/// Default region filter for the initial sensor load.
pub const DEFAULT_REGION: &str = "RU-MOW";
/// Queue the gateway answers requests on.
pub const DEFAULT_REPLY_QUEUE: &str = "/user/queue/reply";
/// Queue the gateway reports request failures on.
pub const DEFAULT_ERROR_QUEUE: &str = "/user/queue/errors";

/// TLS verification strategy for the HTTP fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed lab gateways).
    DangerAcceptInvalid,
}

/// Configuration for one operator session against one gateway node.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Gateway base URL (e.g. `https://gw.example.net`).
    pub gateway: Url,
    /// Routing node path segment.
    pub node: String,
    /// Bearer token; `None` connects anonymously.
    pub token: Option<SecretString>,
    /// Region passed to the initial sensor load.
    pub region: String,
    pub tls: TlsVerification,
    /// Per-request timeout for the HTTP path.
    pub http_timeout: Duration,
    /// Bound on WebSocket upgrade + STOMP handshake.
    pub connect_timeout: Duration,
    /// Outgoing heart-beat interval promised in CONNECT (`0` disables).
    pub heartbeat: Duration,
    pub reconnect: ReconnectConfig,
    pub reply_queue: String,
    pub error_queue: String,
}

impl SessionConfig {
    pub fn new(gateway: Url) -> Self {
        Self {
            gateway,
            node: DEFAULT_NODE.into(),
            token: None,
            region: DEFAULT_REGION.into(),
            tls: TlsVerification::default(),
            http_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            heartbeat: Duration::from_secs(20),
            reconnect: ReconnectConfig::default(),
            reply_queue: DEFAULT_REPLY_QUEUE.into(),
            error_queue: DEFAULT_ERROR_QUEUE.into(),
        }
    }

    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = node.into();
        self
    }

    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.gateway.clone(), self.node.clone())
    }

    /// Token text for the WebSocket query string, if any.
    pub(crate) fn token_str(&self) -> Option<&str> {
        self.token
            .as_ref()
            .map(|t| t.expose_secret())
            .filter(|t| !t.is_empty())
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig::new(tls_to_transport(&self.tls), self.http_timeout)
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_console() {
        let config = SessionConfig::new("https://gw.example.net".parse().unwrap());
        assert_eq!(config.node, "node-a");
        assert_eq!(config.region, "RU-MOW");
        assert_eq!(config.heartbeat, Duration::from_secs(20));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.reply_queue, "/user/queue/reply");
        assert!(config.token_str().is_none());
    }

    #[test]
    fn empty_token_is_treated_as_absent() {
        let config = SessionConfig::new("https://gw.example.net".parse().unwrap())
            .with_token(SecretString::from(String::new()));
        assert!(config.token_str().is_none());
    }

    #[test]
    fn endpoint_uses_node() {
        let config =
            SessionConfig::new("https://gw.example.net/".parse().unwrap()).with_node("node-b");
        assert_eq!(config.endpoint().node_base(), "https://gw.example.net/node-b");
    }
}
