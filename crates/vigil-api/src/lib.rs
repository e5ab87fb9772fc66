// vigil-api: wire-level access to the monitoring gateway (STOMP over WebSocket + HTTP)

pub mod endpoint;
pub mod error;
pub mod http;
pub mod sse;
pub mod stomp;
pub mod transport;
pub mod websocket;

pub use endpoint::{ApiScope, DEFAULT_NODE, Endpoint};
pub use error::Error;
pub use http::{HttpClient, HttpRequest};
pub use reqwest::Method;
pub use sse::{EventStream, SseDecoder, SseEvent};
pub use stomp::{Command, Frame, Headers};
pub use transport::{TlsMode, TransportConfig};
