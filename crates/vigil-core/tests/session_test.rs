#![allow(clippy::unwrap_used)]

// End-to-end tests against an in-process STOMP broker.
//
// The broker accepts one WebSocket connection, answers CONNECT with
// CONNECTED, records every frame the client sends, and pushes whatever
// text the test hands it.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use vigil_api::stomp::decode_all;
use vigil_api::{Command, Endpoint, Frame, HttpClient, HttpRequest, Method, TransportConfig};
use vigil_core::{
    ConnectionState, CoreError, ReconnectConfig, RpcError, RpcRequest, Session, SessionConfig, Via,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(5);

struct FakeBroker {
    port: u16,
    received: mpsc::UnboundedReceiver<Frame>,
    push: mpsc::UnboundedSender<String>,
}

impl FakeBroker {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (received_tx, received) = mpsc::unbounded_channel();
        let (push, mut push_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let (mut sink, mut source) = ws.split();
            loop {
                tokio::select! {
                    msg = source.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            for frame in decode_all(text.as_str()).unwrap() {
                                if frame.command == Command::Connect {
                                    let connected = "CONNECTED\nversion:1.2\nheart-beat:0,0\n\n\0";
                                    let _ = sink.send(Message::text(connected)).await;
                                }
                                let _ = received_tx.send(frame);
                            }
                        }
                        Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    },
                    text = push_rx.recv() => match text {
                        Some(text) => {
                            let _ = sink.send(Message::text(text)).await;
                        }
                        None => break,
                    },
                }
            }
        });

        Self {
            port,
            received,
            push,
        }
    }

    fn config(&self) -> SessionConfig {
        let mut config = SessionConfig::new(format!("http://127.0.0.1:{}", self.port).parse().unwrap())
            .with_token("t0k".to_owned().into());
        config.reconnect = ReconnectConfig {
            initial_delay: Duration::from_secs(60),
            ..ReconnectConfig::default()
        };
        config
    }

    /// Next frame with the given command, skipping others.
    async fn expect(&mut self, command: Command) -> Frame {
        tokio::time::timeout(WAIT, async {
            loop {
                let frame = self.received.recv().await.unwrap();
                if frame.command == command {
                    return frame;
                }
            }
        })
        .await
        .unwrap()
    }

    fn message(&self, subscription: &str, destination: &str, headers: &[(&str, &str)], body: &str) {
        let mut text = format!("MESSAGE\nsubscription:{subscription}\ndestination:{destination}\nmessage-id:m\n");
        for (name, value) in headers {
            text.push_str(&format!("{name}:{value}\n"));
        }
        text.push('\n');
        text.push_str(body);
        text.push('\0');
        self.push.send(text).unwrap();
    }
}

#[tokio::test]
async fn connect_subscribes_and_routes_messages() {
    let mut broker = FakeBroker::start().await;
    let session = Session::new(broker.config()).unwrap();

    session.connect().await.unwrap();
    assert!(session.is_connected());
    assert_eq!(
        session.connection().current_state(),
        ConnectionState::Connected
    );

    let connect = broker.expect(Command::Connect).await;
    assert_eq!(connect.get("accept-version"), Some("1.2"));
    assert_eq!(connect.get("heart-beat"), Some("20000,0"));
    assert_eq!(connect.get("Authorization"), Some("Bearer t0k"));

    let mut destinations = Vec::new();
    for _ in 0..11 {
        let sub = broker.expect(Command::Subscribe).await;
        assert_eq!(sub.get("ack"), Some("auto"));
        destinations.push(sub.destination().unwrap().to_owned());
    }
    assert!(destinations.contains(&"/topic/all".to_owned()));
    assert!(destinations.contains(&"/user/queue/reply".to_owned()));

    let mut incidents = session.incidents();
    broker.message(
        "sub-0",
        "/topic/incidents",
        &[],
        r#"{"incidents":[{"id":"i1","kind":"FIRE"},{"id":"i1","kind":"FIRE"}]}"#,
    );
    let snapshot = tokio::time::timeout(WAIT, incidents.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.len(), 1);

    session.disconnect().await;
    broker.expect(Command::Disconnect).await;
    assert!(!session.is_connected());
}

#[tokio::test]
async fn oneshot_connects_runs_and_disconnects() {
    let mut broker = FakeBroker::start().await;
    let was_connected = Session::oneshot(broker.config(), |session| async move {
        Ok::<_, CoreError>(session.is_connected())
    })
    .await
    .unwrap();

    assert!(was_connected);
    broker.expect(Command::Connect).await;
    broker.expect(Command::Disconnect).await;
}

#[tokio::test]
async fn rpc_round_trip_over_the_reply_queue() {
    let mut broker = FakeBroker::start().await;
    let session = Session::new(broker.config()).unwrap();
    session.connect().await.unwrap();

    let manager = session.connection().clone();
    let call = tokio::spawn(async move {
        manager
            .request(RpcRequest::new("/app/admin/sensors/policy/get", json!({"sensorId": 7})))
            .await
    });

    let send = broker.expect(Command::Send).await;
    assert_eq!(send.destination(), Some("/app/admin/sensors/policy/get"));
    assert_eq!(send.get("content-type"), Some("application/json"));
    let id = send.get("x-correlation-id").unwrap().to_owned();

    broker.message(
        "sub-4",
        "/user/queue/reply",
        &[("x-correlation-id", &id)],
        r#"{"sensorId":7,"mode":"AUTO"}"#,
    );
    let reply = tokio::time::timeout(WAIT, call).await.unwrap().unwrap().unwrap();
    assert_eq!(reply, json!({"sensorId": 7, "mode": "AUTO"}));
    assert_eq!(session.connection().correlator().pending(), 0);

    session.disconnect().await;
}

#[tokio::test]
async fn disconnect_drains_outstanding_requests() {
    let mut broker = FakeBroker::start().await;
    let session = Session::new(broker.config()).unwrap();
    session.connect().await.unwrap();

    let spawn_call = |destination: &'static str| {
        let manager = session.connection().clone();
        tokio::spawn(async move {
            manager
                .request(RpcRequest::new(destination, json!({})).timeout(Duration::from_secs(60)))
                .await
        })
    };
    let first = spawn_call("/app/admin/a");
    let second = spawn_call("/app/admin/b");
    broker.expect(Command::Send).await;
    broker.expect(Command::Send).await;

    session.disconnect().await;
    assert_eq!(first.await.unwrap().unwrap_err(), RpcError::Disconnected);
    assert_eq!(second.await.unwrap().unwrap_err(), RpcError::Disconnected);
}

#[tokio::test]
async fn broker_error_schedules_a_reconnect() {
    let mut broker = FakeBroker::start().await;
    let session = Session::new(broker.config()).unwrap();
    session.connect().await.unwrap();
    broker.expect(Command::Connect).await;

    let mut connected = session.connected();
    broker
        .push
        .send("ERROR\nmessage:session expired\n\n\0".to_owned())
        .unwrap();

    tokio::time::timeout(WAIT, connected.wait_for(|c| !*c))
        .await
        .unwrap()
        .unwrap();
    let mut state = session.connection_state();
    let reconnecting = *tokio::time::timeout(
        WAIT,
        state.wait_for(|s| matches!(s, ConnectionState::Reconnecting { .. })),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(reconnecting, ConnectionState::Reconnecting { attempt: 1 });

    session.disconnect().await;
    assert_eq!(session.connection().current_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn silent_rpc_falls_back_to_http() {
    let broker = FakeBroker::start().await;
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/node-a/api/admin/camera/scan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"queued": 3})))
        .expect(1)
        .mount(&mock)
        .await;

    let http = HttpClient::new(
        Endpoint::new(mock.uri().parse().unwrap(), "node-a"),
        None,
        &TransportConfig::default(),
    )
    .unwrap();
    let session = Session::with_http(broker.config(), http);
    session.connect().await.unwrap();

    let outcome = session
        .perform(
            RpcRequest::new("/app/admin/camera/scan", json!({})).timeout(Duration::from_millis(200)),
            HttpRequest::admin(Method::POST, "/camera/scan"),
            |reply| reply,
        )
        .await
        .unwrap();
    assert_eq!(outcome.via, Via::Http);
    assert_eq!(outcome.data, json!({"queued": 3}));

    session.disconnect().await;
}
