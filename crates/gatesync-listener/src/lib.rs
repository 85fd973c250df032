//! gatesync-listener — applies the change feed to the deployment store.
//!
//! # Components
//!
//! - **`reconciler`** — turns one feed event into one store transaction
//! - **`hub`** — single worker task that serializes events and delivers
//!   each result to the subscribers registered before it
//! - **`reporter`** — posts deployment outcomes upstream on cold start
//!
//! # Flow
//!
//! ```text
//! ListenerHandle::emit ──┐
//!                        ├─► intake (mpsc) ─► worker ─► Reconciler::apply
//! ListenerHandle::subscribe ┘                    │          ├─ BundleResolver (per row)
//!                                                │          ├─ StoreTx commit / rollback
//!                                                │          └─ StatusReporter (cold start)
//!                                                └─► oneshot result to every pending subscriber
//! ```

pub mod error;
pub mod hub;
pub mod reconciler;
pub mod reporter;

pub use error::{ListenerError, ListenerResult};
pub use hub::{DeploymentsResult, Listener, ListenerHandle, Subscription};
pub use reconciler::Reconciler;
pub use reporter::{DeploymentStatusRecord, StatusReporter};
