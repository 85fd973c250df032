//! Change-feed event model.
//!
//! The upstream change-data-capture source delivers either a full
//! [`Snapshot`] of its tables or an ordered [`ChangeList`]. Rows are
//! column-name → [`ColumnVal`] maps; values keep their JSON shape so that
//! table-specific decoding happens in the consumer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single column value as delivered by the feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnVal {
    pub value: serde_json::Value,
    /// Source column type identifier, opaque to the agent.
    #[serde(default, rename = "type")]
    pub column_type: i32,
}

impl ColumnVal {
    pub fn new(value: impl Into<serde_json::Value>) -> Self {
        Self {
            value: value.into(),
            column_type: 0,
        }
    }
}

/// One table row: column name → value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Row(HashMap<String, ColumnVal>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column insert.
    pub fn with(mut self, column: &str, value: impl Into<serde_json::Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: &str, value: impl Into<serde_json::Value>) {
        self.0.insert(column.to_string(), ColumnVal::new(value));
    }

    pub fn get(&self, column: &str) -> Option<&ColumnVal> {
        self.0.get(column)
    }

    /// Column rendered as a string. Strings are returned as-is, numbers
    /// and booleans are formatted, null and absent columns yield `None`.
    pub fn get_string(&self, column: &str) -> Option<String> {
        match &self.get(column)?.value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// A full table dump inside a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Table {
    pub name: String,
    #[serde(default)]
    pub rows: Vec<Row>,
}

/// Full state of the feed as of `snapshot_info`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Position marker identifying this snapshot.
    pub snapshot_info: String,
    #[serde(default)]
    pub tables: Vec<Table>,
}

impl Snapshot {
    /// Rows of the named table; empty if the table is absent.
    pub fn rows_for<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Row> + 'a {
        self.tables
            .iter()
            .filter(move |t| t.name == table)
            .flat_map(|t| t.rows.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

/// A single row-level change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub operation: Operation,
    pub table: String,
    #[serde(default)]
    pub new_row: Option<Row>,
    #[serde(default)]
    pub old_row: Option<Row>,
}

impl Change {
    pub fn insert(table: &str, new_row: Row) -> Self {
        Self {
            operation: Operation::Insert,
            table: table.to_string(),
            new_row: Some(new_row),
            old_row: None,
        }
    }

    pub fn update(table: &str, old_row: Row, new_row: Row) -> Self {
        Self {
            operation: Operation::Update,
            table: table.to_string(),
            new_row: Some(new_row),
            old_row: Some(old_row),
        }
    }

    pub fn delete(table: &str, old_row: Row) -> Self {
        Self {
            operation: Operation::Delete,
            table: table.to_string(),
            new_row: None,
            old_row: Some(old_row),
        }
    }
}

/// Ordered changes committed upstream since the previous list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeList {
    #[serde(default)]
    pub last_sequence: String,
    pub changes: Vec<Change>,
}

impl ChangeList {
    pub fn new(changes: Vec<Change>) -> Self {
        Self {
            last_sequence: String::new(),
            changes,
        }
    }
}

/// An event delivered by the change feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum FeedEvent {
    Snapshot(Snapshot),
    ChangeList(ChangeList),
}

impl FeedEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            FeedEvent::Snapshot(_) => "snapshot",
            FeedEvent::ChangeList(_) => "change_list",
        }
    }
}
