// Camera scans, snapshot detection, analytics policy, and camera status.

use std::time::Duration;

use serde_json::{Value, json};
use vigil_api::{HttpRequest, Method};

use super::merge_loaded;
use super::requests::{CameraPolicyUpdate, DetectRequest, timestamp_body};
use crate::action::ActionOutcome;
use crate::error::CoreError;
use crate::model::{CameraPolicy, RecordId};
use crate::rpc::RpcRequest;
use crate::session::Session;
use crate::store::MergeStats;

const SCAN_ALL: &str = "/app/admin/camera/scan";
const SCAN_NOW: &str = "/app/admin/camera-ai/scan-now";
const DETECT: &str = "/app/admin/camera/detect";
const POLICY_GET: &str = "/app/admin/camera-policy/get";
const POLICY_SET: &str = "/app/admin/camera-policy/set";
const SHORT_TIMEOUT: Duration = Duration::from_secs(6);
const LONG_TIMEOUT: Duration = Duration::from_secs(8);
const ID_FIELDS: &[&str] = &["cameraId", "id"];

impl Session {
    /// Load camera status over public HTTP.
    pub async fn load_cameras(&self) -> Result<MergeStats, CoreError> {
        let request = HttpRequest::public(Method::GET, "/cameras/status");
        let payload = self.http().call(&request).await?;
        Ok(merge_loaded(self.caches().cameras(), payload, "cameras"))
    }

    /// Ask the gateway to scan every camera.
    pub async fn scan_all_cameras(&self) -> Result<ActionOutcome<Value>, CoreError> {
        self.perform(
            RpcRequest::new(SCAN_ALL, timestamp_body()).timeout(SHORT_TIMEOUT),
            HttpRequest::admin(Method::POST, "/camera/scan"),
            |reply| reply,
        )
        .await
    }

    /// Scan one camera immediately.
    pub async fn scan_camera_now(
        &self,
        camera_id: &RecordId,
    ) -> Result<ActionOutcome<Value>, CoreError> {
        self.perform(
            RpcRequest::new(SCAN_NOW, json!({ "cameraId": camera_id }))
                .timeout(SHORT_TIMEOUT)
                .matching_id(ID_FIELDS, camera_id.clone()),
            HttpRequest::admin(Method::POST, format!("/camera-ai/scan-now/{camera_id}")),
            |reply| reply,
        )
        .await
    }

    /// Run detection on a camera snapshot.
    pub async fn detect(&self, request: &DetectRequest) -> Result<ActionOutcome<Value>, CoreError> {
        let http = request.query_pairs().into_iter().fold(
            HttpRequest::admin(Method::POST, "/camera/detect"),
            |http, (name, value)| http.query(name, value),
        );
        self.perform(
            RpcRequest::new(DETECT, request.body()?).timeout(LONG_TIMEOUT),
            http,
            |reply| reply,
        )
        .await
    }

    /// Fetch a camera's analytics policy and remember it.
    pub async fn camera_policy(
        &self,
        camera_id: &RecordId,
    ) -> Result<ActionOutcome<Option<CameraPolicy>>, CoreError> {
        let rpc = RpcRequest::new(POLICY_GET, json!({ "cameraId": camera_id }))
            .timeout(SHORT_TIMEOUT)
            .matching_id(ID_FIELDS, camera_id.clone());
        let http = HttpRequest::admin(Method::GET, format!("/camera-policy/{camera_id}"));

        let outcome = self
            .perform(rpc, http, |reply| CameraPolicy::normalize(&reply))
            .await?;
        self.remember_camera_policy(camera_id, outcome.data.as_ref());
        Ok(outcome)
    }

    pub async fn save_camera_policy(
        &self,
        camera_id: &RecordId,
        update: &CameraPolicyUpdate,
    ) -> Result<ActionOutcome<Option<CameraPolicy>>, CoreError> {
        let body = update.body(camera_id)?;
        let rpc = RpcRequest::new(POLICY_SET, body.clone())
            .timeout(LONG_TIMEOUT)
            .matching_id(ID_FIELDS, camera_id.clone());
        let http = HttpRequest::admin(Method::POST, format!("/camera-policy/{camera_id}")).json(body);

        let outcome = self
            .perform(rpc, http, |reply| CameraPolicy::normalize(&reply))
            .await?;
        self.remember_camera_policy(camera_id, outcome.data.as_ref());
        Ok(outcome)
    }

    fn remember_camera_policy(&self, camera_id: &RecordId, policy: Option<&CameraPolicy>) {
        if let Some(policy) = policy {
            self.caches()
                .camera_policies()
                .insert(camera_id.to_string(), policy.clone());
        }
    }
}
