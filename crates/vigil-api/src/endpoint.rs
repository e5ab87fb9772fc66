// Gateway addressing.
//
// Every session talks to one routing node behind the gateway:
//   realtime  {gateway}/{node}/ws[?token=...]
//   admin     {gateway}/{node}/api/admin/...
//   public    {gateway}/{node}/api/public/...

use url::Url;

use crate::error::Error;

/// Routing node used when a profile does not name one.
pub const DEFAULT_NODE: &str = "node-a";

/// Which half of the HTTP surface a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ApiScope {
    /// `/api/admin`, bearer-authenticated.
    Admin,
    /// `/api/public`, anonymous.
    Public,
}

impl ApiScope {
    fn prefix(self) -> &'static str {
        match self {
            Self::Admin => "api/admin",
            Self::Public => "api/public",
        }
    }
}

/// A gateway base URL plus the routing node behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    gateway: Url,
    node: String,
}

impl Endpoint {
    pub fn new(gateway: Url, node: impl Into<String>) -> Self {
        let node = node.into();
        let node = node.trim_matches('/');
        let node = if node.is_empty() { DEFAULT_NODE } else { node };
        Self {
            gateway,
            node: node.to_owned(),
        }
    }

    pub fn gateway(&self) -> &Url {
        &self.gateway
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    /// `{gateway}/{node}` without a trailing slash.
    pub fn node_base(&self) -> String {
        format!("{}/{}", self.gateway.as_str().trim_end_matches('/'), self.node)
    }

    /// Realtime endpoint, with the http(s) scheme mapped to ws(s).
    ///
    /// The token, when present, rides along as a `token` query parameter
    /// for gateways that cannot read headers on the upgrade request.
    pub fn websocket_url(&self, token: Option<&str>) -> Result<Url, Error> {
        let base = self.node_base();
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base
        };

        let mut url = Url::parse(&format!("{base}/ws"))?;
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url)
    }

    /// HTTP URL for `path` under the given scope. `path` may start with `/`.
    pub fn api_url(&self, scope: ApiScope, path: &str) -> Result<Url, Error> {
        let path = path.trim_start_matches('/');
        let url = format!("{}/{}/{path}", self.node_base(), scope.prefix());
        Ok(Url::parse(&url)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn endpoint(gateway: &str, node: &str) -> Endpoint {
        Endpoint::new(Url::parse(gateway).unwrap(), node)
    }

    #[test]
    fn https_gateway_maps_to_wss() {
        let ep = endpoint("https://gw.example.com", "node-b");
        let url = ep.websocket_url(None).unwrap();
        assert_eq!(url.as_str(), "wss://gw.example.com/node-b/ws");
    }

    #[test]
    fn token_is_percent_encoded_in_query() {
        let ep = endpoint("http://localhost:8080/", "node-a");
        let url = ep.websocket_url(Some("a b+c")).unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8080/node-a/ws?token=a+b%2Bc");
    }

    #[test]
    fn empty_token_is_omitted() {
        let ep = endpoint("http://localhost:8080", "node-a");
        assert_eq!(ep.websocket_url(Some("")).unwrap().query(), None);
    }

    #[test]
    fn gateway_path_prefix_is_preserved() {
        let ep = endpoint("https://example.com/console/", "/node-c/");
        let url = ep.api_url(ApiScope::Admin, "/sensors/42/policy").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/console/node-c/api/admin/sensors/42/policy"
        );
    }

    #[test]
    fn blank_node_falls_back_to_default() {
        let ep = endpoint("https://example.com", "");
        assert_eq!(ep.node(), DEFAULT_NODE);
        let url = ep.api_url(ApiScope::Public, "cameras/status").unwrap();
        assert_eq!(url.as_str(), "https://example.com/node-a/api/public/cameras/status");
    }
}
