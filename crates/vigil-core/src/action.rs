// ── Dual-path action policy ──
//
// Every state-changing operation is attempted over the realtime session
// first and, when that yields nothing, repeated over HTTP. Both paths feed
// the same normalizer so callers get one result type either way.

use std::future::Future;

use serde_json::Value;
use vigil_api::{HttpClient, HttpRequest};

use crate::connection::ConnectionManager;
use crate::error::CoreError;
use crate::rpc::{RpcError, RpcRequest};

/// The realtime half: correlated requests over the live session.
pub trait RpcChannel: Send + Sync {
    fn is_connected(&self) -> bool;

    fn request(&self, request: RpcRequest) -> impl Future<Output = Result<Value, RpcError>> + Send;
}

/// The request/response half: one HTTP call against the gateway.
pub trait HttpCall: Send + Sync {
    fn call(&self, request: HttpRequest) -> impl Future<Output = Result<Value, vigil_api::Error>> + Send;
}

impl RpcChannel for ConnectionManager {
    fn is_connected(&self) -> bool {
        ConnectionManager::is_connected(self)
    }

    fn request(&self, request: RpcRequest) -> impl Future<Output = Result<Value, RpcError>> + Send {
        ConnectionManager::request(self, request)
    }
}

impl HttpCall for HttpClient {
    fn call(&self, request: HttpRequest) -> impl Future<Output = Result<Value, vigil_api::Error>> + Send {
        async move { HttpClient::call(self, &request).await }
    }
}

/// Which path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, serde::Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Via {
    Rpc,
    Http,
}

/// A successful action and the path that served it.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ActionOutcome<T> {
    pub via: Via,
    pub data: T,
}

impl<T> ActionOutcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ActionOutcome<U> {
        ActionOutcome {
            via: self.via,
            data: f(self.data),
        }
    }
}

/// RPC first, HTTP on any RPC failure, a null reply, or no connection.
#[derive(Debug, Clone)]
pub struct ActionPolicy<R, H> {
    rpc: R,
    http: H,
}

impl<R: RpcChannel, H: HttpCall> ActionPolicy<R, H> {
    pub fn new(rpc: R, http: H) -> Self {
        Self { rpc, http }
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    pub fn http(&self) -> &H {
        &self.http
    }

    /// Run one action. Only an HTTP failure is an error.
    pub async fn perform<T>(
        &self,
        rpc: RpcRequest,
        http: HttpRequest,
        normalize: impl Fn(Value) -> T,
    ) -> Result<ActionOutcome<T>, CoreError> {
        let destination = rpc.destination.clone();

        if self.rpc.is_connected() {
            match self.rpc.request(rpc).await {
                Ok(Value::Null) => {
                    tracing::warn!(destination = %destination, "empty rpc reply, falling back to HTTP");
                }
                Ok(reply) => {
                    return Ok(ActionOutcome {
                        via: Via::Rpc,
                        data: normalize(reply),
                    });
                }
                Err(e) => {
                    tracing::warn!(destination = %destination, error = %e, "rpc failed, falling back to HTTP");
                }
            }
        } else {
            tracing::debug!(destination = %destination, "not connected, using HTTP");
        }

        let reply = self.http.call(http).await?;
        Ok(ActionOutcome {
            via: Via::Http,
            data: normalize(reply),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use vigil_api::Method;

    use super::*;

    struct FakeRpc {
        connected: bool,
        reply: Result<Value, RpcError>,
        calls: AtomicUsize,
    }

    impl FakeRpc {
        fn new(connected: bool, reply: Result<Value, RpcError>) -> Self {
            Self {
                connected,
                reply,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl RpcChannel for FakeRpc {
        fn is_connected(&self) -> bool {
            self.connected
        }

        fn request(&self, _request: RpcRequest) -> impl Future<Output = Result<Value, RpcError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self.reply.clone();
            async move { reply }
        }
    }

    #[derive(Default)]
    struct FakeHttp {
        fail: bool,
        seen: Mutex<Vec<String>>,
    }

    impl HttpCall for FakeHttp {
        fn call(&self, request: HttpRequest) -> impl Future<Output = Result<Value, vigil_api::Error>> + Send {
            self.seen.lock().unwrap().push(request.path.clone());
            let fail = self.fail;
            async move {
                if fail {
                    Err(vigil_api::Error::Http {
                        status: 500,
                        message: "down".into(),
                    })
                } else {
                    Ok(json!({"from": "http"}))
                }
            }
        }
    }

    fn specs() -> (RpcRequest, HttpRequest) {
        (
            RpcRequest::new("/app/admin/camera/scan", json!({})),
            HttpRequest::admin(Method::POST, "/camera/scan"),
        )
    }

    #[tokio::test]
    async fn timed_out_rpc_falls_back_to_http() {
        let policy = ActionPolicy::new(
            FakeRpc::new(
                true,
                Err(RpcError::Timeout {
                    destination: "/app/admin/camera/scan".into(),
                    timeout_ms: 6000,
                }),
            ),
            FakeHttp::default(),
        );
        let (rpc, http) = specs();
        let outcome = policy.perform(rpc, http, |v| v).await.unwrap();
        assert_eq!(outcome.via, Via::Http);
        assert_eq!(outcome.data, json!({"from": "http"}));
        assert_eq!(policy.rpc().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rpc_reply_wins() {
        let policy = ActionPolicy::new(FakeRpc::new(true, Ok(json!({"ok": 1}))), FakeHttp::default());
        let (rpc, http) = specs();
        let outcome = policy.perform(rpc, http, |v| v["ok"].as_i64()).await.unwrap();
        assert_eq!(outcome, ActionOutcome { via: Via::Rpc, data: Some(1) });
        assert!(policy.http().seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn null_reply_counts_as_no_reply() {
        let policy = ActionPolicy::new(FakeRpc::new(true, Ok(Value::Null)), FakeHttp::default());
        let (rpc, http) = specs();
        assert_eq!(policy.perform(rpc, http, |v| v).await.unwrap().via, Via::Http);
    }

    #[tokio::test]
    async fn disconnected_skips_rpc() {
        let policy = ActionPolicy::new(FakeRpc::new(false, Ok(json!(1))), FakeHttp::default());
        let (rpc, http) = specs();
        assert_eq!(policy.perform(rpc, http, |v| v).await.unwrap().via, Via::Http);
        assert_eq!(policy.rpc().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn http_failure_is_an_error() {
        let policy = ActionPolicy::new(
            FakeRpc::new(false, Ok(Value::Null)),
            FakeHttp {
                fail: true,
                ..FakeHttp::default()
            },
        );
        let (rpc, http) = specs();
        let err = policy.perform(rpc, http, |v| v).await.unwrap_err();
        assert!(matches!(err, CoreError::Api { status: Some(500), .. }));
    }
}
