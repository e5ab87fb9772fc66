// Gateway HTTP client
//
// Wraps `reqwest::Client` with node-scoped URL construction and bearer
// auth for `/api/admin`. This is the fallback path for admin actions and
// the source of the initial public loads; every call returns raw JSON and
// the caller decides how to interpret it.

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::endpoint::{ApiScope, Endpoint};
use crate::error::Error;
use crate::sse::EventStream;
use crate::transport::TransportConfig;

/// One HTTP call against the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub scope: ApiScope,
    pub method: Method,
    /// Path below the scope prefix, e.g. `/sensors/42/policy`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(scope: ApiScope, method: Method, path: impl Into<String>) -> Self {
        Self {
            scope,
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn admin(method: Method, path: impl Into<String>) -> Self {
        Self::new(ApiScope::Admin, method, path)
    }

    pub fn public(method: Method, path: impl Into<String>) -> Self {
        Self::new(ApiScope::Public, method, path)
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Error payload shape the gateway uses for non-2xx responses.
#[derive(serde::Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// HTTP client bound to one gateway node.
#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    endpoint: Endpoint,
    token: Option<SecretString>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("endpoint", &self.endpoint)
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    pub fn new(
        endpoint: Endpoint,
        token: Option<SecretString>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, endpoint, token))
    }

    /// Wrap an existing `reqwest::Client` (tests, shared pools).
    pub fn with_client(http: reqwest::Client, endpoint: Endpoint, token: Option<SecretString>) -> Self {
        Self {
            http,
            endpoint,
            token,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn url(&self, request: &HttpRequest) -> Result<Url, Error> {
        self.endpoint.api_url(request.scope, &request.path)
    }

    /// Perform the call and return the JSON body.
    ///
    /// An empty 2xx body yields `Value::Null`; a 2xx body that is not JSON
    /// is returned as `Value::String`.
    pub async fn call(&self, request: &HttpRequest) -> Result<Value, Error> {
        let url = self.url(request)?;
        debug!(method = %request.method, url = %url, "gateway request");

        let mut builder = self.http.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if request.scope == ApiScope::Admin {
            if let Some(token) = &self.token {
                builder = builder.bearer_auth(token.expose_secret());
            }
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(Error::Transport)?;
        parse_response(resp).await
    }

    /// Open a `text/event-stream` GET and hand back the live body.
    ///
    /// The client's whole-request timeout still applies, so streams opened
    /// through a client built with [`TransportConfig::build_stream_client`]
    /// are the ones that stay up.
    pub async fn events(&self, request: &HttpRequest) -> Result<EventStream, Error> {
        let url = self.url(request)?;
        debug!(url = %url, "opening event stream");

        let resp = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("event stream refused")
                    .to_owned(),
            });
        }
        Ok(EventStream::new(resp))
    }
}

async fn parse_response(resp: reqwest::Response) -> Result<Value, Error> {
    let status = resp.status();
    let body = resp.text().await.map_err(Error::Transport)?;
    trace!(status = status.as_u16(), len = body.len(), "gateway response");

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::Authentication {
            message: error_text(&body).unwrap_or_else(|| "token rejected by gateway".into()),
        });
    }

    if !status.is_success() {
        let message = error_text(&body).unwrap_or_else(|| {
            let snippet: String = body.chars().take(200).collect();
            if snippet.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_owned()
            } else {
                snippet
            }
        });
        return Err(Error::Http {
            status: status.as_u16(),
            message,
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
}

/// `message` (or `error`) from a JSON error body.
fn error_text(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed.message.or(parsed.error).filter(|m| !m.is_empty())
}
