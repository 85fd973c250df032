//! Notification hub — the single worker that owns event processing.
//!
//! Feed events and subscriber registrations share one FIFO intake, so a
//! subscription sent before an event is always seen by the worker before
//! that event. When an event finishes (committed or aborted) its result is
//! delivered to every subscription registered so far, and those
//! subscriptions are then spent.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use gatesync_core::FeedEvent;
use gatesync_state::{DataDeployment, DeploymentStore};

use crate::error::{ListenerError, ListenerResult};
use crate::reconciler::Reconciler;

/// Result of one processed event, shared by every subscriber.
pub type DeploymentsResult = Arc<ListenerResult<Vec<DataDeployment>>>;

enum Intake {
    Event(FeedEvent),
    Subscribe(oneshot::Sender<DeploymentsResult>),
}

/// One-shot receiver for the result of the next processed event.
#[derive(Debug)]
pub struct Subscription {
    rx: oneshot::Receiver<DeploymentsResult>,
}

impl Subscription {
    /// Wait for the result. Fails only if the worker stopped first.
    pub async fn recv(self) -> ListenerResult<DeploymentsResult> {
        self.rx.await.map_err(|_| ListenerError::WorkerClosed)
    }
}

/// Cloneable front door to the listener worker.
#[derive(Clone)]
pub struct ListenerHandle {
    intake: mpsc::UnboundedSender<Intake>,
    current: watch::Receiver<Option<DeploymentStore>>,
}

impl ListenerHandle {
    /// Register for the result of the next event the worker processes.
    pub fn subscribe(&self) -> ListenerResult<Subscription> {
        let (tx, rx) = oneshot::channel();
        self.intake
            .send(Intake::Subscribe(tx))
            .map_err(|_| ListenerError::WorkerClosed)?;
        Ok(Subscription { rx })
    }

    /// Queue a feed event for processing.
    pub fn emit(&self, event: FeedEvent) -> ListenerResult<()> {
        self.intake
            .send(Intake::Event(event))
            .map_err(|_| ListenerError::WorkerClosed)
    }

    /// Subscribe, emit, and wait for that event's result.
    pub async fn apply(&self, event: FeedEvent) -> ListenerResult<DeploymentsResult> {
        let subscription = self.subscribe()?;
        self.emit(event)?;
        subscription.recv().await
    }

    /// Store matching the last applied snapshot.
    pub fn current_store(&self) -> Option<DeploymentStore> {
        self.current.borrow().clone()
    }

    /// Resolved deployments in the active store.
    pub fn ready_deployments(&self) -> ListenerResult<Vec<DataDeployment>> {
        let store = self.current_store().ok_or(ListenerError::NoActiveStore)?;
        Ok(store.ready_deployments()?)
    }
}

/// The worker. Owns the reconciler and, through it, the store's only writer.
pub struct Listener {
    reconciler: Reconciler,
    intake: mpsc::UnboundedReceiver<Intake>,
    subscribers: Vec<oneshot::Sender<DeploymentsResult>>,
}

impl Listener {
    pub fn new(reconciler: Reconciler) -> (Self, ListenerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ListenerHandle {
            intake: tx,
            current: reconciler.watch_store(),
        };
        let listener = Self {
            reconciler,
            intake: rx,
            subscribers: Vec::new(),
        };
        (listener, handle)
    }

    /// Start the worker on the current runtime.
    pub fn spawn(reconciler: Reconciler) -> (ListenerHandle, JoinHandle<()>) {
        let (listener, handle) = Self::new(reconciler);
        let task = tokio::spawn(listener.run());
        (handle, task)
    }

    /// Process intake until every handle has been dropped.
    pub async fn run(mut self) {
        info!("listener worker started");
        while let Some(msg) = self.intake.recv().await {
            match msg {
                Intake::Subscribe(tx) => self.subscribers.push(tx),
                Intake::Event(event) => {
                    let result = Arc::new(self.reconciler.apply(&event).await);
                    self.notify(result);
                }
            }
        }
        info!("listener intake closed, worker stopping");
    }

    fn notify(&mut self, result: DeploymentsResult) {
        let count = self.subscribers.len();
        for tx in self.subscribers.drain(..) {
            if tx.send(result.clone()).is_err() {
                debug!("subscriber went away before delivery");
            }
        }
        debug!(subscribers = count, "event result delivered");
    }
}
