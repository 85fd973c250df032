//! Decoding of change-feed rows into deployment entities.

use gatesync_core::Row;

use crate::error::{StateError, StateResult};
use crate::types::{BundleDescriptor, DataDeployment};

/// Feed table carrying deployment rows.
pub const DEPLOYMENT_TABLE: &str = "deployment";

const COL_ID: &str = "id";
const COL_DATA_SCOPE_ID: &str = "data_scope_id";
const COL_BUNDLE_CONFIG: &str = "bundle_config_json";

/// The `id` column of a deployment row.
pub fn deployment_id_from_row(row: &Row) -> StateResult<String> {
    match row.get_string(COL_ID) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(StateError::MissingColumn(COL_ID.to_string())),
    }
}

/// Map a feed row into an unresolved [`DataDeployment`].
///
/// The bundle descriptor is decoded from the JSON string in
/// `bundle_config_json`. A missing descriptor yields empty bundle fields,
/// which bundle resolution later records as a failure; a malformed one
/// is an error.
pub fn deployment_from_row(row: &Row) -> StateResult<DataDeployment> {
    let id = deployment_id_from_row(row)?;
    let data_scope_id = row.get_string(COL_DATA_SCOPE_ID).unwrap_or_default();

    let bundle = match row.get(COL_BUNDLE_CONFIG).map(|c| &c.value) {
        None | Some(serde_json::Value::Null) => BundleDescriptor::default(),
        Some(serde_json::Value::String(raw)) => serde_json::from_str(raw).map_err(|e| {
            StateError::Deserialize(format!("{COL_BUNDLE_CONFIG} for {id}: {e}"))
        })?,
        // Tolerate feeds that deliver the payload already decoded.
        Some(value @ serde_json::Value::Object(_)) => serde_json::from_value(value.clone())
            .map_err(|e| StateError::Deserialize(format!("{COL_BUNDLE_CONFIG} for {id}: {e}")))?,
        Some(other) => {
            return Err(StateError::InvalidRow(format!(
                "{COL_BUNDLE_CONFIG} for {id} has unexpected type: {other}"
            )));
        }
    };

    Ok(DataDeployment::new(&id, &data_scope_id, bundle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeployStatus;

    fn bundle_json() -> String {
        r#"{"name":"/bundles/1","uri":"http://host/bundles/1","checksumType":"crc32","checksum":"0badf00d"}"#
            .to_string()
    }

    #[test]
    fn decodes_bundle_descriptor_payload() {
        let row = Row::new()
            .with("id", "add_test_1")
            .with("data_scope_id", "scope-a")
            .with("bundle_config_json", bundle_json());

        let dep = deployment_from_row(&row).unwrap();
        assert_eq!(dep.id, "add_test_1");
        assert_eq!(dep.data_scope_id, "scope-a");
        assert_eq!(dep.bundle_name, "/bundles/1");
        assert_eq!(dep.bundle_uri, "http://host/bundles/1");
        assert_eq!(dep.bundle_checksum_type, "crc32");
        assert_eq!(dep.bundle_checksum, "0badf00d");
        assert_eq!(dep.deploy_status, DeployStatus::Unset);
    }

    #[test]
    fn accepts_pre_decoded_payload() {
        let value: serde_json::Value = serde_json::from_str(&bundle_json()).unwrap();
        let row = Row::new().with("id", "d").with("bundle_config_json", value);
        assert_eq!(deployment_from_row(&row).unwrap().bundle_name, "/bundles/1");
    }

    #[test]
    fn missing_payload_leaves_bundle_blank() {
        let dep = deployment_from_row(&Row::new().with("id", "d")).unwrap();
        assert!(dep.bundle_uri.is_empty());
        assert!(dep.data_scope_id.is_empty());
    }

    #[test]
    fn missing_id_is_an_error() {
        let err = deployment_from_row(&Row::new().with("bundle_config_json", bundle_json()))
            .unwrap_err();
        assert_eq!(err, StateError::MissingColumn("id".to_string()));

        let err = deployment_id_from_row(&Row::new().with("id", "")).unwrap_err();
        assert!(matches!(err, StateError::MissingColumn(_)));
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let row = Row::new().with("id", "d").with("bundle_config_json", "{not json");
        assert!(matches!(
            deployment_from_row(&row).unwrap_err(),
            StateError::Deserialize(_)
        ));

        let row = Row::new().with("id", "d").with("bundle_config_json", 7);
        assert!(matches!(
            deployment_from_row(&row).unwrap_err(),
            StateError::InvalidRow(_)
        ));
    }
}
