//! gatesync-core — shared building blocks for the gatesync agent.
//!
//! - **`config`** — `gatesync.toml` parsing (`AgentConfig`)
//! - **`feed`** — change-feed event model (snapshots and change lists)
//! - **`http`** — HTTP(S) client used for bundle fetches and status reports

pub mod config;
pub mod feed;
pub mod http;

pub use config::{AgentConfig, parse_duration};
pub use feed::{Change, ChangeList, ColumnVal, FeedEvent, Operation, Row, Snapshot, Table};
pub use http::{HttpClient, HttpError, HttpResponse, HttpResult};
