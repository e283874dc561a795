use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("invalid GTID set: {0}")]
    Parse(#[from] gtidflow_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint file {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        source: gtidflow_core::Error,
    },

    #[error("no checkpoint at {0} and no initial GTID set configured")]
    NoInitialPosition(String),

    #[error("checkpoint write failed: {0}")]
    WriteFailed(String),
}

pub type StateResult<T> = Result<T, StateError>;
