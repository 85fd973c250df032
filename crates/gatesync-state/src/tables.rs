//! redb table definitions for the deployment record store.

use redb::TableDefinition;

/// Deployment rows keyed by deployment ID; values are JSON `DataDeployment`.
pub const DEPLOYMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("deployments");

/// Store metadata; holds [`VERSION_KEY`].
pub const META: TableDefinition<&str, &str> = TableDefinition::new("meta");

/// Key under which the feed marker the store was initialized for is kept.
pub const VERSION_KEY: &str = "version";
