//! gatesync-state — deployment record store for the gatesync agent.
//!
//! Backed by [redb](https://docs.rs/redb). Each feed position marker maps
//! to its own database (see [`StoreRegistry::version_for`]), holding one
//! deployment table keyed by deployment ID and a metadata table carrying
//! the marker the store was initialized for.
//!
//! # Transactions
//!
//! Mutations go through a [`StoreTx`] obtained from
//! [`DeploymentStore::begin`]; the caller decides whether to commit or roll
//! back. Queries on [`DeploymentStore`] open their own read transaction and
//! never observe uncommitted writes.
//!
//! `DeploymentStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod registry;
pub mod row;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use registry::StoreRegistry;
pub use row::{DEPLOYMENT_TABLE, deployment_from_row, deployment_id_from_row};
pub use store::{DeploymentStore, StoreTx};
pub use types::*;
