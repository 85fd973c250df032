//! Status reporter — posts resolved deployment outcomes upstream.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use gatesync_core::{HttpClient, HttpResult};
use gatesync_state::{DataDeployment, DeployStatus};

use crate::error::{ListenerError, ListenerResult};

/// One entry of the status report body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatusRecord {
    pub id: String,
    pub status: DeployStatus,
    pub error_code: i32,
    pub message: String,
}

impl From<&DataDeployment> for DeploymentStatusRecord {
    fn from(dep: &DataDeployment) -> Self {
        Self {
            id: dep.id.clone(),
            status: dep.deploy_status,
            error_code: dep.deploy_error_code,
            message: dep.deploy_error_message.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusReporter {
    client: HttpClient,
    endpoint: String,
    bearer_token: Option<String>,
}

impl StatusReporter {
    /// Reports go to `<api_server_base>/deployments`.
    pub fn new(
        api_server_base: &str,
        timeout: Duration,
        bearer_token: Option<String>,
    ) -> HttpResult<Self> {
        Ok(Self {
            client: HttpClient::new(timeout)?,
            endpoint: format!("{}/deployments", api_server_base.trim_end_matches('/')),
            bearer_token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Records for every deployment with a Success or Fail status.
    pub fn records(deployments: &[DataDeployment]) -> Vec<DeploymentStatusRecord> {
        deployments
            .iter()
            .filter(|dep| dep.is_ready())
            .map(DeploymentStatusRecord::from)
            .collect()
    }

    /// POST the records for `deployments`. Returns how many were sent;
    /// nothing is sent when no deployment has a terminal status.
    pub async fn report(&self, deployments: &[DataDeployment]) -> ListenerResult<usize> {
        let records = Self::records(deployments);
        if records.is_empty() {
            debug!("no resolved deployments to report");
            return Ok(0);
        }

        let body = serde_json::to_vec(&records)
            .map_err(|e| ListenerError::Report(format!("encode: {e}")))?;
        let resp = self
            .client
            .post_json(&self.endpoint, body, self.bearer_token.as_deref())
            .await
            .map_err(|e| ListenerError::Report(format!("{}: {e}", self.endpoint)))?;
        if !resp.status.is_success() {
            return Err(ListenerError::Report(format!(
                "{} responded {}",
                self.endpoint, resp.status
            )));
        }

        info!(endpoint = %self.endpoint, count = records.len(), "deployment statuses reported");
        Ok(records.len())
    }

    /// Report in the background. Failures are logged and dropped.
    pub fn spawn_report(&self, deployments: Vec<DataDeployment>) -> JoinHandle<()> {
        let reporter = self.clone();
        tokio::spawn(async move {
            if let Err(e) = reporter.report(&deployments).await {
                warn!(error = %e, "deployment status report dropped");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(id: &str, status: DeployStatus, code: i32, message: &str) -> DataDeployment {
        DataDeployment {
            id: id.to_string(),
            local_bundle_uri: "x".to_string(),
            deploy_status: status,
            deploy_error_code: code,
            deploy_error_message: message.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn records_skip_unresolved_deployments() {
        let records = StatusReporter::records(&[
            dep("success", DeployStatus::Success, 1, "message"),
            dep("blank", DeployStatus::Unset, 0, ""),
            dep("fail", DeployStatus::Fail, 1, "message"),
        ]);
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["success", "fail"]);
    }

    #[test]
    fn record_wire_format() {
        let record = DeploymentStatusRecord::from(&dep("d1", DeployStatus::Fail, 2, "bad checksum"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "d1",
                "status": "fail",
                "errorCode": 2,
                "message": "bad checksum"
            })
        );
    }

    #[test]
    fn endpoint_joins_base_without_double_slash() {
        let a = StatusReporter::new("http://api.local/", Duration::from_secs(1), None).unwrap();
        let b = StatusReporter::new("http://api.local", Duration::from_secs(1), None).unwrap();
        assert_eq!(a.endpoint(), "http://api.local/deployments");
        assert_eq!(a.endpoint(), b.endpoint());
    }

    #[tokio::test]
    async fn nothing_to_report_sends_nothing() {
        // Unroutable endpoint: any request would fail.
        let reporter = StatusReporter::new("http://127.0.0.1:9", Duration::from_millis(200), None).unwrap();
        let sent = reporter
            .report(&[dep("blank", DeployStatus::Unset, 0, "")])
            .await
            .unwrap();
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_report_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let reporter = StatusReporter::new(&format!("http://{addr}"), Duration::from_secs(2), None).unwrap();
        let err = reporter
            .report(&[dep("ok", DeployStatus::Success, 0, "")])
            .await
            .unwrap_err();
        assert!(matches!(err, ListenerError::Report(_)));
    }
}
