// Operator incident reports.

use std::time::Duration;

use serde_json::Value;
use vigil_api::{HttpRequest, Method};

use super::requests::IncidentReport;
use crate::action::ActionOutcome;
use crate::error::CoreError;
use crate::rpc::RpcRequest;
use crate::session::Session;

const REPORT: &str = "/app/incidents/report";
const RPC_TIMEOUT: Duration = Duration::from_secs(6);

impl Session {
    /// Report an incident; the HTTP path files it as an admin news entry.
    pub async fn report_incident(
        &self,
        report: &IncidentReport,
    ) -> Result<ActionOutcome<Value>, CoreError> {
        let body = report.body()?;
        self.perform(
            RpcRequest::new(REPORT, body.clone()).timeout(RPC_TIMEOUT),
            HttpRequest::admin(Method::POST, "/news").json(body),
            |reply| reply,
        )
        .await
    }
}
