//! DeploymentStore — redb-backed persistence for deployment rows.
//!
//! Reads go through [`DeploymentStore`], each in its own read transaction.
//! Writes are staged on a [`StoreTx`] and become visible only on
//! [`StoreTx::commit`]; [`StoreTx::rollback`] (or dropping the
//! transaction) discards them.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};
use tracing::{debug, info};

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Deployment store for one feed marker.
///
/// Clones share the same underlying database; equality is handle identity.
#[derive(Clone)]
pub struct DeploymentStore {
    db: Arc<Database>,
    version: Arc<str>,
}

impl DeploymentStore {
    /// Open (or create) the store file at `path` for feed marker `version`.
    pub fn open(path: &Path, version: &str) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        debug!(?path, %version, "deployment store opened");
        Ok(Self {
            db: Arc::new(db),
            version: Arc::from(version),
        })
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory(version: &str) -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        debug!(%version, "in-memory deployment store opened");
        Ok(Self {
            db: Arc::new(db),
            version: Arc::from(version),
        })
    }

    /// Feed marker this handle was opened for.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Create the schema and stamp the version marker.
    pub fn initialize(&self) -> StateResult<()> {
        let tx = self.begin()?;
        tx.create_schema()?;
        tx.commit()?;
        info!(version = %self.version, "deployment store initialized");
        Ok(())
    }

    /// Marker recorded by a previous initialization, if any.
    pub fn recorded_version(&self) -> StateResult<Option<String>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = match txn.open_table(META) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(StateError::Table(e.to_string())),
        };
        let recorded = table
            .get(VERSION_KEY)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value().to_string());
        Ok(recorded)
    }

    /// Whether this store already reflects its feed marker.
    pub fn is_initialized(&self) -> StateResult<bool> {
        Ok(self
            .recorded_version()?
            .is_some_and(|v| v == *self.version))
    }

    /// Begin a write transaction. Only one can be open at a time; a second
    /// caller blocks until the first commits or rolls back.
    pub fn begin(&self) -> StateResult<StoreTx> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        Ok(StoreTx {
            txn,
            version: self.version.clone(),
        })
    }

    /// Get a deployment by ID.
    pub fn get(&self, id: &str) -> StateResult<Option<DataDeployment>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        let found = match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => Some(
                serde_json::from_slice::<DataDeployment>(guard.value())
                    .map_err(map_err!(Deserialize))?,
            ),
            None => None,
        };
        Ok(found)
    }

    /// Deployments whose bundle resolution has finished (Success or Fail).
    pub fn ready_deployments(&self) -> StateResult<Vec<DataDeployment>> {
        self.scan(DataDeployment::is_ready)
    }

    /// Deployments still waiting on bundle resolution.
    pub fn unready_deployments(&self) -> StateResult<Vec<DataDeployment>> {
        self.scan(|dep| !dep.is_ready())
    }

    /// Every deployment, in ID order.
    pub fn all_deployments(&self) -> StateResult<Vec<DataDeployment>> {
        self.scan(|_| true)
    }

    fn scan(&self, keep: impl Fn(&DataDeployment) -> bool) -> StateResult<Vec<DataDeployment>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let dep: DataDeployment =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if keep(&dep) {
                results.push(dep);
            }
        }
        Ok(results)
    }
}

impl PartialEq for DeploymentStore {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.db, &other.db)
    }
}

impl fmt::Debug for DeploymentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentStore")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// An open write transaction on a [`DeploymentStore`].
///
/// Dropping it without committing discards every staged write.
pub struct StoreTx {
    txn: WriteTransaction,
    version: Arc<str>,
}

impl StoreTx {
    /// Create the deployment and metadata tables and record the marker.
    pub fn create_schema(&self) -> StateResult<()> {
        // Opening a table in a write transaction creates it if absent.
        self.txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        let mut meta = self.txn.open_table(META).map_err(map_err!(Table))?;
        meta.insert(VERSION_KEY, &*self.version)
            .map_err(map_err!(Write))?;
        Ok(())
    }

    /// Insert a deployment, replacing any existing row with the same ID.
    pub fn insert(&self, dep: &DataDeployment) -> StateResult<()> {
        if dep.id.is_empty() {
            return Err(StateError::InvalidRow("deployment id is empty".to_string()));
        }
        let value = serde_json::to_vec(dep).map_err(map_err!(Serialize))?;
        let mut table = self.txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        table
            .insert(dep.id.as_str(), value.as_slice())
            .map_err(map_err!(Write))?;
        debug!(deployment = %dep.id, status = dep.deploy_status.as_str(), "deployment staged");
        Ok(())
    }

    /// Delete a deployment by ID. Returns true if it existed.
    pub fn delete(&self, id: &str) -> StateResult<bool> {
        let mut table = self.txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        let existed = table.remove(id).map_err(map_err!(Write))?.is_some();
        debug!(deployment = %id, existed, "deployment delete staged");
        Ok(existed)
    }

    pub fn commit(self) -> StateResult<()> {
        self.txn.commit().map_err(map_err!(Transaction))
    }

    pub fn rollback(self) -> StateResult<()> {
        self.txn.abort().map_err(map_err!(Transaction))
    }
}
