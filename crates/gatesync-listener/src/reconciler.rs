//! Reconciler — applies one feed event to the deployment store.
//!
//! Each event runs Idle → Processing → Committed | Aborted. Bundle
//! resolution for every affected row happens first (it does not touch the
//! store), then all writes for the event are applied in a single store
//! transaction. Any error rolls the transaction back and becomes the
//! event's result; the store is left exactly as before the event.

use std::collections::HashSet;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use gatesync_bundle::BundleResolver;
use gatesync_core::{ChangeList, FeedEvent, Operation, Snapshot};
use gatesync_state::{
    DEPLOYMENT_TABLE, DataDeployment, DeploymentStore, StateResult, StoreRegistry, StoreTx,
    deployment_from_row, deployment_id_from_row,
};

use crate::error::{ListenerError, ListenerResult};
use crate::reporter::StatusReporter;

/// A write staged for the event's transaction.
#[derive(Debug)]
enum StagedWrite {
    Upsert(DataDeployment),
    Remove(String),
}

pub struct Reconciler {
    registry: StoreRegistry,
    resolver: BundleResolver,
    reporter: Option<StatusReporter>,
    /// Store matching the last applied snapshot.
    current: watch::Sender<Option<DeploymentStore>>,
}

impl Reconciler {
    pub fn new(registry: StoreRegistry, resolver: BundleResolver) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            registry,
            resolver,
            reporter: None,
            current,
        }
    }

    /// Report deployment outcomes through `reporter` on cold start.
    pub fn with_reporter(mut self, reporter: StatusReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn current_store(&self) -> Option<DeploymentStore> {
        self.current.borrow().clone()
    }

    /// Observe which store is active.
    pub fn watch_store(&self) -> watch::Receiver<Option<DeploymentStore>> {
        self.current.subscribe()
    }

    /// Apply one event; returns the deployments it inserted or touched.
    pub async fn apply(&mut self, event: &FeedEvent) -> ListenerResult<Vec<DataDeployment>> {
        let result = match event {
            FeedEvent::Snapshot(snapshot) => self.apply_snapshot(snapshot).await,
            FeedEvent::ChangeList(list) => self.apply_change_list(list).await,
        };
        match &result {
            Ok(deployments) => {
                info!(kind = event.kind(), deployments = deployments.len(), "feed event committed")
            }
            Err(e) => error!(kind = event.kind(), error = %e, "feed event aborted"),
        }
        result
    }

    async fn apply_snapshot(&mut self, snapshot: &Snapshot) -> ListenerResult<Vec<DataDeployment>> {
        let marker = snapshot.snapshot_info.as_str();
        let store = self.registry.version_for(marker)?;

        if store.is_initialized()? {
            info!(%marker, "store already at snapshot marker, cold-start reconciliation");
            self.activate(store.clone());
            return self.cold_start(&store).await;
        }

        info!(%marker, tables = snapshot.tables.len(), "initializing store from snapshot");
        for table in snapshot.tables.iter().filter(|t| t.name != DEPLOYMENT_TABLE) {
            debug!(table = %table.name, "ignoring snapshot table");
        }

        let mut inserted = Vec::new();
        for row in snapshot.rows_for(DEPLOYMENT_TABLE) {
            inserted.push(deployment_from_row(row)?);
        }
        for dep in &mut inserted {
            self.resolver.resolve(dep).await;
        }

        in_transaction(&store, |tx| {
            tx.create_schema()?;
            for dep in &inserted {
                tx.insert(dep)?;
            }
            Ok(())
        })?;

        self.activate(store);
        Ok(inserted)
    }

    /// Report what the store already knows and resume unfinished rows.
    async fn cold_start(&self, store: &DeploymentStore) -> ListenerResult<Vec<DataDeployment>> {
        let existing = store.all_deployments()?;

        if let Some(reporter) = &self.reporter {
            reporter.spawn_report(existing.clone());
        }

        let mut pending: Vec<DataDeployment> =
            existing.into_iter().filter(|dep| !dep.is_ready()).collect();
        if !pending.is_empty() {
            info!(count = pending.len(), "resuming unresolved deployments");
            for dep in &mut pending {
                self.resolver.resolve(dep).await;
            }
            in_transaction(store, |tx| {
                for dep in &pending {
                    tx.insert(dep)?;
                }
                Ok(())
            })?;
        }

        Ok(store.all_deployments()?)
    }

    async fn apply_change_list(&mut self, list: &ChangeList) -> ListenerResult<Vec<DataDeployment>> {
        let store = self.current_store().ok_or(ListenerError::NoActiveStore)?;

        let mut staged = Vec::new();
        for change in &list.changes {
            if change.table != DEPLOYMENT_TABLE {
                debug!(table = %change.table, "ignoring change for other table");
                continue;
            }
            match change.operation {
                Operation::Insert => {
                    let row = change.new_row.as_ref().ok_or_else(|| {
                        ListenerError::MalformedChange("insert without new row".to_string())
                    })?;
                    let mut dep = deployment_from_row(row)?;
                    self.resolver.resolve(&mut dep).await;
                    staged.push(StagedWrite::Upsert(dep));
                }
                Operation::Delete => {
                    let row = change.old_row.as_ref().ok_or_else(|| {
                        ListenerError::MalformedChange("delete without old row".to_string())
                    })?;
                    staged.push(StagedWrite::Remove(deployment_id_from_row(row)?));
                }
                Operation::Update => {
                    let new_row = change.new_row.as_ref().ok_or_else(|| {
                        ListenerError::MalformedChange("update without new row".to_string())
                    })?;
                    let mut dep = deployment_from_row(new_row)?;
                    let old_id = match &change.old_row {
                        Some(old_row) => deployment_id_from_row(old_row)?,
                        None => dep.id.clone(),
                    };
                    self.resolver.resolve(&mut dep).await;
                    staged.push(StagedWrite::Remove(old_id));
                    staged.push(StagedWrite::Upsert(dep));
                }
            }
        }

        let displaced = displaced_bundles(&store, &staged)?;

        debug!(sequence = %list.last_sequence, writes = staged.len(), "applying change list");
        in_transaction(&store, |tx| apply_staged(tx, &staged))?;

        self.release_bundles(&store, displaced).await;
        Ok(surviving_upserts(staged))
    }

    /// Evict cached bundles that no committed row references any more.
    ///
    /// Runs after commit; failures here leave files behind but never fail
    /// the event.
    async fn release_bundles(&self, store: &DeploymentStore, displaced: HashSet<String>) {
        if displaced.is_empty() {
            return;
        }
        let referenced: HashSet<String> = match store.all_deployments() {
            Ok(rows) => rows.into_iter().map(|dep| dep.local_bundle_uri).collect(),
            Err(e) => {
                warn!(error = %e, "skipping bundle eviction, store unreadable");
                return;
            }
        };
        for uri in displaced.difference(&referenced) {
            self.resolver.evict(uri).await;
        }
    }

    fn activate(&self, store: DeploymentStore) {
        let changed = self
            .current
            .borrow()
            .as_ref()
            .is_none_or(|active| *active != store);
        if changed {
            info!(version = %store.version(), "switching active deployment store");
            if let Err(e) = self.registry.retain_only(store.version()) {
                warn!(error = %e, "failed to release inactive deployment stores");
            }
            self.current.send_replace(Some(store));
        }
    }
}

/// Run `writes` in one transaction: commit on success, roll back on error.
fn in_transaction(
    store: &DeploymentStore,
    writes: impl FnOnce(&StoreTx) -> StateResult<()>,
) -> ListenerResult<()> {
    let tx = store.begin()?;
    match writes(&tx) {
        Ok(()) => {
            tx.commit()?;
            Ok(())
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback() {
                warn!(error = %rollback, "rollback failed");
            }
            Err(e.into())
        }
    }
}

fn apply_staged(tx: &StoreTx, staged: &[StagedWrite]) -> StateResult<()> {
    for write in staged {
        match write {
            StagedWrite::Upsert(dep) => tx.insert(dep)?,
            StagedWrite::Remove(id) => {
                tx.delete(id)?;
            }
        }
    }
    Ok(())
}

/// Local bundles of the committed rows that `staged` removes or replaces.
fn displaced_bundles(
    store: &DeploymentStore,
    staged: &[StagedWrite],
) -> ListenerResult<HashSet<String>> {
    let mut displaced = HashSet::new();
    for write in staged {
        let id = match write {
            StagedWrite::Upsert(dep) => dep.id.as_str(),
            StagedWrite::Remove(id) => id.as_str(),
        };
        if let Some(previous) = store.get(id)?.filter(|p| !p.local_bundle_uri.is_empty()) {
            displaced.insert(previous.local_bundle_uri);
        }
    }
    Ok(displaced)
}

/// Upserted rows still present once the whole list has applied, in
/// application order.
fn surviving_upserts(staged: Vec<StagedWrite>) -> Vec<DataDeployment> {
    let mut result: Vec<DataDeployment> = Vec::new();
    for write in staged {
        match write {
            StagedWrite::Upsert(dep) => {
                result.retain(|d| d.id != dep.id);
                result.push(dep);
            }
            StagedWrite::Remove(id) => result.retain(|d| d.id != id),
        }
    }
    result
}
