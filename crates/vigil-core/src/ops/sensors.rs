// Sensor registration, thresholds, and the public sensor list.

use std::time::Duration;

use serde_json::{Value, json};
use vigil_api::{HttpRequest, Method};

use super::requests::{RegisterSensorRequest, SensorPolicyUpdate};
use super::replace_loaded;
use crate::action::ActionOutcome;
use crate::error::CoreError;
use crate::model::{RecordId, SensorPolicy};
use crate::rpc::RpcRequest;
use crate::session::Session;
use crate::store::MergeStats;

const REGISTER: &str = "/app/admin/sensors/register";
const POLICY_GET: &str = "/app/admin/sensors/policy/get";
const POLICY_SET: &str = "/app/admin/sensors/policy/set";
const RPC_TIMEOUT: Duration = Duration::from_secs(6);
const ID_FIELDS: &[&str] = &["sensorId", "id"];

impl Session {
    /// Load the configured region's sensors over public HTTP.
    ///
    /// The response is the whole registry: sensors it no longer lists are
    /// dropped from the cache.
    pub async fn load_sensors(&self) -> Result<MergeStats, CoreError> {
        let request = HttpRequest::public(Method::GET, "/sensors")
            .query("region", self.config().region.as_str());
        let payload = self.http().call(&request).await?;
        Ok(replace_loaded(self.caches().sensors(), payload, "sensors"))
    }

    pub async fn register_sensor(
        &self,
        request: &RegisterSensorRequest,
    ) -> Result<ActionOutcome<Value>, CoreError> {
        let body = request.body()?;
        self.perform(
            RpcRequest::new(REGISTER, body.clone()).timeout(RPC_TIMEOUT),
            HttpRequest::admin(Method::POST, "/sensors").json(body),
            |reply| reply,
        )
        .await
    }

    /// Fetch a sensor's policy and remember it in the policy book.
    pub async fn sensor_policy(
        &self,
        sensor_id: &RecordId,
    ) -> Result<ActionOutcome<Option<SensorPolicy>>, CoreError> {
        let rpc = RpcRequest::new(POLICY_GET, json!({ "sensorId": sensor_id }))
            .timeout(RPC_TIMEOUT)
            .matching_id(ID_FIELDS, sensor_id.clone());
        let http = HttpRequest::admin(Method::GET, format!("/sensors/{sensor_id}/policy"));

        let outcome = self
            .perform(rpc, http, |reply| SensorPolicy::normalize(&reply))
            .await?;
        self.remember_sensor_policy(sensor_id, outcome.data.as_ref());
        Ok(outcome)
    }

    pub async fn save_sensor_policy(
        &self,
        sensor_id: &RecordId,
        update: &SensorPolicyUpdate,
    ) -> Result<ActionOutcome<Option<SensorPolicy>>, CoreError> {
        let body = update.body(sensor_id)?;
        let rpc = RpcRequest::new(POLICY_SET, body.clone())
            .timeout(RPC_TIMEOUT)
            .matching_id(ID_FIELDS, sensor_id.clone());
        let http =
            HttpRequest::admin(Method::POST, format!("/sensors/{sensor_id}/policy")).json(body);

        let outcome = self
            .perform(rpc, http, |reply| SensorPolicy::normalize(&reply))
            .await?;
        self.remember_sensor_policy(sensor_id, outcome.data.as_ref());
        Ok(outcome)
    }

    fn remember_sensor_policy(&self, sensor_id: &RecordId, policy: Option<&SensorPolicy>) {
        if let Some(policy) = policy {
            self.caches()
                .sensor_policies()
                .insert(sensor_id.to_string(), policy.clone());
        }
    }
}
