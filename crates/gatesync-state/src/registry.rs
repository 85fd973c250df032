//! StoreRegistry — maps feed markers to deployment stores.
//!
//! Each marker gets its own database file under the registry root,
//! named after a digest of the marker so arbitrary marker strings are
//! safe on disk. Handles are cached: asking twice for the same marker
//! returns the same store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::store::DeploymentStore;

#[derive(Clone)]
pub struct StoreRegistry {
    /// `None` keeps every store in memory (for testing).
    root: Option<PathBuf>,
    stores: Arc<Mutex<HashMap<String, DeploymentStore>>>,
}

impl StoreRegistry {
    /// Registry keeping one redb file per marker under `root`.
    pub fn on_disk(root: &Path) -> StateResult<Self> {
        std::fs::create_dir_all(root)
            .map_err(|e| StateError::Open(format!("{}: {e}", root.display())))?;
        Ok(Self {
            root: Some(root.to_path_buf()),
            stores: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Registry of ephemeral in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            root: None,
            stores: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The store for `marker`, opening it on first use.
    ///
    /// The returned store is not necessarily initialized; check
    /// [`DeploymentStore::is_initialized`].
    pub fn version_for(&self, marker: &str) -> StateResult<DeploymentStore> {
        let mut stores = self
            .stores
            .lock()
            .map_err(|_| StateError::Open("store registry lock poisoned".to_string()))?;
        if let Some(store) = stores.get(marker) {
            return Ok(store.clone());
        }

        let store = match &self.root {
            Some(root) => DeploymentStore::open(&root.join(file_name_for(marker)), marker)?,
            None => DeploymentStore::open_in_memory(marker)?,
        };
        stores.insert(marker.to_string(), store.clone());
        debug!(%marker, "deployment store registered");
        Ok(store)
    }

    /// Drop cached handles for every marker except `marker`.
    ///
    /// A released on-disk store is closed once its last handle is dropped
    /// and reopened by a later [`version_for`](Self::version_for).
    pub fn retain_only(&self, marker: &str) -> StateResult<()> {
        let mut stores = self
            .stores
            .lock()
            .map_err(|_| StateError::Open("store registry lock poisoned".to_string()))?;
        let before = stores.len();
        stores.retain(|cached, _| cached == marker);
        if stores.len() < before {
            debug!(%marker, released = before - stores.len(), "inactive deployment stores released");
        }
        Ok(())
    }
}

/// Deterministic, filesystem-safe file name for a marker.
fn file_name_for(marker: &str) -> String {
    let digest = hex::encode(Sha256::digest(marker.as_bytes()));
    format!("deployments-{}.redb", &digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_marker_yields_same_store() {
        let registry = StoreRegistry::in_memory();
        let a = registry.version_for("snap-1").unwrap();
        let b = registry.version_for("snap-1").unwrap();
        let c = registry.version_for("snap-2").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(c.version(), "snap-2");
    }

    #[test]
    fn clones_share_the_cache() {
        let registry = StoreRegistry::in_memory();
        let a = registry.version_for("m").unwrap();
        let b = registry.clone().version_for("m").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn file_names_are_stable_and_safe() {
        assert_eq!(file_name_for("a/b:c"), file_name_for("a/b:c"));
        assert_ne!(file_name_for("a"), file_name_for("b"));
        let name = file_name_for("../../etc/passwd");
        assert!(name.starts_with("deployments-"));
        assert!(!name.contains('/'));
    }

    #[test]
    fn retain_only_releases_other_markers() {
        let registry = StoreRegistry::in_memory();
        let old = registry.version_for("old").unwrap();
        let active = registry.version_for("active").unwrap();

        registry.retain_only("active").unwrap();

        assert_eq!(registry.stores.lock().unwrap().len(), 1);
        assert_eq!(registry.version_for("active").unwrap(), active);
        assert_ne!(registry.version_for("old").unwrap(), old);
    }

    #[test]
    fn released_on_disk_store_can_be_reopened() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::on_disk(dir.path()).unwrap();
        registry.version_for("old").unwrap().initialize().unwrap();
        registry.version_for("active").unwrap();

        registry.retain_only("active").unwrap();

        let reopened = registry.version_for("old").unwrap();
        assert!(reopened.is_initialized().unwrap());
    }

    #[test]
    fn on_disk_store_is_reused_after_registry_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let registry = StoreRegistry::on_disk(dir.path()).unwrap();
            let store = registry.version_for("snap-7").unwrap();
            store.initialize().unwrap();
        }

        let registry = StoreRegistry::on_disk(dir.path()).unwrap();
        let store = registry.version_for("snap-7").unwrap();
        assert!(store.is_initialized().unwrap());
        assert!(!registry.version_for("snap-8").unwrap().is_initialized().unwrap());
    }
}
