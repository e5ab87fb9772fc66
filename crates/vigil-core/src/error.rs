// ── Core error types ──
//
// User-facing errors from vigil-core. Consumers never see raw WebSocket
// or reqwest failures; the `From<vigil_api::Error>` impl translates them
// into domain-appropriate variants.

use thiserror::Error;

use crate::rpc::RpcError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to gateway at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Not connected to the gateway")]
    NotConnected,

    #[error("Gateway request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Request failed: {0}")]
    Rpc(#[from] RpcError),

    #[error("Operation rejected by gateway: {message}")]
    Rejected { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Not found: {identifier}")]
    NotFound { identifier: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<vigil_api::Error> for CoreError {
    fn from(err: vigil_api::Error) -> Self {
        match err {
            vigil_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            vigil_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            vigil_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            vigil_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            vigil_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            vigil_api::Error::Http { status: 401 | 403, message } => {
                CoreError::AuthenticationFailed { message }
            }
            vigil_api::Error::Http { status: 404, message } => CoreError::NotFound {
                identifier: message,
            },
            vigil_api::Error::Http { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            vigil_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            vigil_api::Error::WebSocket(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket error: {reason}"),
            },
            vigil_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            vigil_api::Error::Stomp { message } => CoreError::Rejected { message },
            vigil_api::Error::Protocol(msg) => {
                CoreError::Internal(format!("STOMP protocol error: {msg}"))
            }
            vigil_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
