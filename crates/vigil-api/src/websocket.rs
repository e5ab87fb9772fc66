//! STOMP session over a WebSocket transport.
//!
//! [`open`] performs the WebSocket upgrade and the STOMP CONNECT handshake,
//! then hands back the two halves of the socket. The caller owns both and
//! decides how to drive them (`vigil-core` runs them in one session task).
//!
//! ```no_run
//! use vigil_api::websocket::{self, SessionOptions};
//! use url::Url;
//!
//! # async fn example() -> Result<(), vigil_api::Error> {
//! let url = Url::parse("ws://localhost:8080/node-a/ws")?;
//! let options = SessionOptions::new("localhost");
//! let (mut writer, mut reader, _connected) = websocket::open(&url, &options).await?;
//! while let Some(frame) = reader.next_frame().await {
//!     println!("{:?}", frame?);
//! }
//! writer.close().await;
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;
use crate::stomp::{self, Command, Frame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Parameters of the STOMP CONNECT handshake.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Value of the `host` header.
    pub host: String,
    pub token: Option<SecretString>,
    /// How often we promise to send heart-beats (`0` = never).
    pub heartbeat_outgoing: Duration,
    /// How often we want the broker to send them (`0` = never).
    pub heartbeat_incoming: Duration,
    /// Upper bound for upgrade + CONNECT/CONNECTED.
    pub connect_timeout: Duration,
}

impl SessionOptions {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token: None,
            heartbeat_outgoing: Duration::from_secs(20),
            heartbeat_incoming: Duration::ZERO,
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_token(mut self, token: Option<SecretString>) -> Self {
        self.token = token;
        self
    }
}

/// Write half of an open STOMP session.
pub struct StompWriter {
    sink: SplitSink<WsStream, Message>,
}

/// Read half of an open STOMP session.
pub struct StompReader {
    stream: SplitStream<WsStream>,
    backlog: VecDeque<Frame>,
}

/// Open the transport and complete the STOMP handshake.
///
/// Returns the writer, the reader, and the broker's CONNECTED frame.
pub async fn open(
    url: &Url,
    options: &SessionOptions,
) -> Result<(StompWriter, StompReader, Frame), Error> {
    let timeout = options.connect_timeout;
    tokio::time::timeout(timeout, handshake(url, options))
        .await
        .map_err(|_| Error::Timeout {
            timeout_secs: timeout.as_secs(),
        })?
}

async fn handshake(
    url: &Url,
    options: &SessionOptions,
) -> Result<(StompWriter, StompReader, Frame), Error> {
    tracing::info!(url = %redacted(url), "Connecting to gateway");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let (ws_stream, _response) = tokio_tungstenite::connect_async(ClientRequestBuilder::new(uri))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    let (sink, stream) = ws_stream.split();
    let mut writer = StompWriter { sink };
    let mut reader = StompReader {
        stream,
        backlog: VecDeque::new(),
    };

    let heart_beat = (
        millis(options.heartbeat_outgoing),
        millis(options.heartbeat_incoming),
    );
    let bearer = options.token.as_ref().map(|t| t.expose_secret());
    writer
        .send(&Frame::connect(&options.host, heart_beat, bearer))
        .await?;

    match reader.next_frame().await {
        Some(Ok(frame)) if frame.command == Command::Connected => {
            tracing::info!(
                version = frame.get("version").unwrap_or("?"),
                server = frame.get("server").unwrap_or("?"),
                "STOMP session established"
            );
            Ok((writer, reader, frame))
        }
        Some(Ok(frame)) if frame.command == Command::Error => {
            let message = error_message(&frame);
            writer.close().await;
            if message.to_ascii_lowercase().contains("unauthorized")
                || message.to_ascii_lowercase().contains("forbidden")
            {
                Err(Error::Authentication { message })
            } else {
                Err(Error::Stomp { message })
            }
        }
        Some(Ok(frame)) => {
            writer.close().await;
            Err(Error::Protocol(format!(
                "expected CONNECTED, got {}",
                frame.command
            )))
        }
        Some(Err(e)) => Err(e),
        None => Err(Error::WebSocketClosed {
            code: 1006,
            reason: "closed during handshake".into(),
        }),
    }
}

impl StompWriter {
    pub async fn send(&mut self, frame: &Frame) -> Result<(), Error> {
        tracing::trace!(command = %frame.command, destination = ?frame.destination(), "-> frame");
        self.sink
            .send(Message::text(frame.encode()))
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))
    }

    pub async fn heartbeat(&mut self) -> Result<(), Error> {
        tracing::trace!("-> heart-beat");
        self.sink
            .send(Message::text(stomp::HEARTBEAT))
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))
    }

    /// Close the transport. Errors are swallowed: closing twice is fine.
    pub async fn close(&mut self) {
        if let Err(e) = self.sink.send(Message::Close(None)).await {
            tracing::trace!(error = %e, "close frame not sent");
        }
        if let Err(e) = self.sink.close().await {
            tracing::trace!(error = %e, "sink already closed");
        }
    }
}

impl StompReader {
    /// Next STOMP frame, skipping heart-beats and WebSocket control frames.
    ///
    /// `None` means the stream ended without a close frame. A close frame
    /// surfaces as [`Error::WebSocketClosed`]. Cancel-safe: frames already
    /// decoded are kept for the next call.
    pub async fn next_frame(&mut self) -> Option<Result<Frame, Error>> {
        loop {
            if let Some(frame) = self.backlog.pop_front() {
                return Some(Ok(frame));
            }
            match self.stream.next().await? {
                Ok(Message::Text(text)) => {
                    if let Err(e) = self.ingest(text.as_str()) {
                        return Some(Err(e));
                    }
                }
                Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                    Ok(text) => {
                        if let Err(e) = self.ingest(text) {
                            return Some(Err(e));
                        }
                    }
                    Err(e) => {
                        return Some(Err(Error::Protocol(format!("non UTF-8 frame: {e}"))));
                    }
                },
                Ok(Message::Close(frame)) => {
                    let (code, reason) = frame.map_or((1005, String::new()), |cf| {
                        (u16::from(cf.code), cf.reason.to_string())
                    });
                    tracing::info!(code, reason = %reason, "WebSocket close frame received");
                    return Some(Err(Error::WebSocketClosed { code, reason }));
                }
                Ok(_) => {
                    // ping/pong are answered by tungstenite
                    tracing::trace!("WebSocket control frame");
                }
                Err(e) => return Some(Err(Error::WebSocket(e.to_string()))),
            }
        }
    }

    fn ingest(&mut self, text: &str) -> Result<(), Error> {
        let frames = stomp::decode_all(text)?;
        if frames.is_empty() {
            tracing::trace!("<- heart-beat");
        }
        for frame in &frames {
            tracing::trace!(command = %frame.command, destination = ?frame.destination(), "<- frame");
        }
        self.backlog.extend(frames);
        Ok(())
    }
}

/// Message text of an ERROR frame: the `message` header, else the body.
pub fn error_message(frame: &Frame) -> String {
    frame
        .get("message")
        .map(str::to_owned)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| frame.body.trim().to_owned())
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// URL with the `token` query parameter masked, for logs.
fn redacted(url: &Url) -> Url {
    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "token" { "***".to_owned() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    if pairs.is_empty() {
        return masked;
    }
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn token_is_masked_in_logged_url() {
        let url = Url::parse("wss://gw/node-a/ws?token=secret&x=1").unwrap();
        let masked = redacted(&url);
        assert!(!masked.as_str().contains("secret"));
        assert!(masked.as_str().contains("x=1"));
    }

    #[test]
    fn error_message_prefers_header() {
        let frame = Frame::new(Command::Error)
            .header("message", "bad auth")
            .with_body("details");
        assert_eq!(error_message(&frame), "bad auth");
        let bare = Frame::new(Command::Error).with_body(" boom \n");
        assert_eq!(error_message(&bare), "boom");
    }

    #[test]
    fn default_options_match_gateway_expectations() {
        let options = SessionOptions::new("gw");
        assert_eq!(millis(options.heartbeat_outgoing), 20_000);
        assert_eq!(millis(options.heartbeat_incoming), 0);
        assert_eq!(options.connect_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        let url = Url::parse("ws://127.0.0.1:9/node-a/ws").unwrap();
        let mut options = SessionOptions::new("127.0.0.1");
        options.connect_timeout = Duration::from_secs(5);
        let result = open(&url, &options).await;
        assert!(matches!(
            result,
            Err(Error::WebSocketConnect(_) | Error::Timeout { .. })
        ));
    }
}
