use thiserror::Error;

/// Errors that can occur in gtidflow-core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid GTID '{input}': {reason}")]
    InvalidGtid { input: String, reason: String },

    #[error("table not found: {database}.{table}")]
    TableNotFound { database: String, table: String },

    #[error("no column at position {index} in {database}.{table}")]
    ColumnLookup {
        database: String,
        table: String,
        index: usize,
    },

    #[error("update event has a before image without an after image")]
    UnpairedUpdateRow,

    #[error("unknown event type")]
    UnknownEventType,

    #[error("table {database}.{table} has no columns")]
    EmptyTable { database: String, table: String },

    #[error("invalid column positions in {database}.{table}: {reason}")]
    InvalidSchema {
        database: String,
        table: String,
        reason: String,
    },

    #[error("catalog query failed: {0}")]
    Catalog(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid_gtid(input: &str, reason: impl Into<String>) -> Self {
        Error::InvalidGtid {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the control loop should skip the event quietly.
    pub fn is_table_not_found(&self) -> bool {
        matches!(self, Error::TableNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
