use thiserror::Error;

/// Errors from talking to the MySQL server.
#[derive(Debug, Error)]
pub enum MysqlError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("binlog request failed: {0}")]
    Replication(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("server returned an invalid GTID set: {0}")]
    Gtid(#[from] gtidflow_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MysqlResult<T> = Result<T, MysqlError>;
