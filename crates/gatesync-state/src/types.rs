//! Domain types for the deployment record store.

use serde::{Deserialize, Serialize};

/// Unique identifier for a deployment.
pub type DeploymentId = String;

/// Outcome of bundle resolution for a deployment.
///
/// `Unset` means resolution has not completed yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    #[default]
    #[serde(rename = "")]
    Unset,
    Success,
    Fail,
}

impl DeployStatus {
    /// Success or Fail.
    pub fn is_terminal(self) -> bool {
        !matches!(self, DeployStatus::Unset)
    }

    /// Wire form used in status reports; blank for `Unset`.
    pub fn as_str(self) -> &'static str {
        match self {
            DeployStatus::Unset => "",
            DeployStatus::Success => "success",
            DeployStatus::Fail => "fail",
        }
    }
}

/// Bundle descriptor embedded as JSON in the feed's deployment row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub checksum_type: String,
    #[serde(default)]
    pub checksum: String,
}

/// One deployment row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDeployment {
    pub id: DeploymentId,
    pub data_scope_id: String,
    pub bundle_name: String,
    pub bundle_uri: String,
    pub bundle_checksum: String,
    pub bundle_checksum_type: String,
    /// Local reference to the verified bundle; empty until resolution succeeds.
    pub local_bundle_uri: String,
    pub deploy_status: DeployStatus,
    pub deploy_error_code: i32,
    pub deploy_error_message: String,
}

impl DataDeployment {
    /// A fresh, unresolved deployment for `id` described by `bundle`.
    pub fn new(id: &str, data_scope_id: &str, bundle: BundleDescriptor) -> Self {
        Self {
            id: id.to_string(),
            data_scope_id: data_scope_id.to_string(),
            bundle_name: bundle.name,
            bundle_uri: bundle.uri,
            bundle_checksum: bundle.checksum,
            bundle_checksum_type: bundle.checksum_type,
            ..Default::default()
        }
    }

    /// Resolution finished (either way).
    pub fn is_ready(&self) -> bool {
        self.deploy_status.is_terminal()
    }

    pub fn descriptor(&self) -> BundleDescriptor {
        BundleDescriptor {
            name: self.bundle_name.clone(),
            uri: self.bundle_uri.clone(),
            checksum_type: self.bundle_checksum_type.clone(),
            checksum: self.bundle_checksum.clone(),
        }
    }

    pub fn mark_success(&mut self, local_bundle_uri: String) {
        self.local_bundle_uri = local_bundle_uri;
        self.deploy_status = DeployStatus::Success;
        self.deploy_error_code = 0;
        self.deploy_error_message.clear();
    }

    pub fn mark_failed(&mut self, code: i32, message: String) {
        self.local_bundle_uri.clear();
        self.deploy_status = DeployStatus::Fail;
        self.deploy_error_code = code;
        self.deploy_error_message = message;
    }

    /// Drop any previous resolution outcome so the row is resolved afresh.
    pub fn reset_resolution(&mut self) {
        self.local_bundle_uri.clear();
        self.deploy_status = DeployStatus::Unset;
        self.deploy_error_code = 0;
        self.deploy_error_message.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_forms() {
        assert_eq!(DeployStatus::Unset.as_str(), "");
        assert_eq!(DeployStatus::Success.as_str(), "success");
        assert_eq!(DeployStatus::Fail.as_str(), "fail");
        assert!(!DeployStatus::Unset.is_terminal());
        assert!(DeployStatus::Fail.is_terminal());
        for status in [DeployStatus::Unset, DeployStatus::Success, DeployStatus::Fail] {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, serde_json::json!(status.as_str()));
        }
    }

    #[test]
    fn mark_failed_clears_local_reference() {
        let mut dep = DataDeployment::new("d", "scope", BundleDescriptor::default());
        dep.mark_success("file:///tmp/b.zip".to_string());
        assert!(dep.is_ready());
        assert_eq!(dep.deploy_error_code, 0);

        dep.mark_failed(2, "checksum mismatch".to_string());
        assert_eq!(dep.deploy_status, DeployStatus::Fail);
        assert!(dep.local_bundle_uri.is_empty());
        assert_eq!(dep.deploy_error_code, 2);

        dep.reset_resolution();
        assert!(!dep.is_ready());
        assert!(dep.deploy_error_message.is_empty());
    }

    #[test]
    fn descriptor_uses_camel_case_keys() {
        let json = r#"{"name":"b","uri":"http://x/b","checksumType":"crc32","checksum":"abcd"}"#;
        let bundle: BundleDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(bundle.checksum_type, "crc32");

        let dep = DataDeployment::new("d", "", bundle.clone());
        assert_eq!(dep.descriptor(), bundle);
    }
}
