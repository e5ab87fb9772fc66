// AI digests: the public AI news page and the digest trigger.

use std::time::Duration;

use serde_json::Value;
use vigil_api::{HttpRequest, Method};

use super::merge_loaded;
use super::requests::timestamp_body;
use crate::action::ActionOutcome;
use crate::error::CoreError;
use crate::rpc::RpcRequest;
use crate::session::Session;
use crate::store::MergeStats;

const RUN_DIGEST: &str = "/app/admin/ai/run-digest";
const RPC_TIMEOUT: Duration = Duration::from_secs(4);

impl Session {
    /// Load one page of AI-sourced news into the digest cache.
    pub async fn load_digests(&self, page: u32, size: u32) -> Result<MergeStats, CoreError> {
        let request = HttpRequest::public(Method::GET, "/news")
            .query("page", page.to_string())
            .query("size", size.to_string())
            .query("source", "AI");
        let payload = self.http().call(&request).await?;
        Ok(merge_loaded(self.caches().digests(), payload, "news"))
    }

    /// Trigger digest generation.
    pub async fn run_digest(&self) -> Result<ActionOutcome<Value>, CoreError> {
        self.perform(
            RpcRequest::new(RUN_DIGEST, timestamp_body()).timeout(RPC_TIMEOUT),
            HttpRequest::admin(Method::POST, "/ai/run-digest"),
            |reply| reply,
        )
        .await
    }
}
