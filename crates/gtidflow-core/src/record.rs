use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::RowMap;

/// Row mutation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Insert,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Insert => "INSERT",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A schema-aware change built from one rows event.
///
/// Update events carry before and after images as consecutive rows, in
/// the order the stream delivered them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    #[serde(rename = "Schema")]
    pub schema: String,
    #[serde(rename = "Table")]
    pub table: String,
    #[serde(rename = "Action")]
    pub action: Action,
    #[serde(rename = "Rows")]
    pub rows: Vec<RowMap>,
}

impl ChangeRecord {
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        action: Action,
        rows: Vec<RowMap>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            action,
            rows,
        }
    }

    /// Serialize to the JSON payload published to the broker.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Broker topic for this record: the originating database.
    pub fn topic(&self) -> &str {
        &self.schema
    }
}
