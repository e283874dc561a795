use thiserror::Error;

/// Errors from publishing to nsqd.
#[derive(Debug, Error)]
pub enum NsqError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("publish rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid topic '{topic}': {reason}")]
    InvalidTopic { topic: String, reason: String },

    #[error("message body is empty")]
    EmptyMessage,
}

impl NsqError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NsqError::Network(_)
                | NsqError::ServerError {
                    status: 500..=599,
                    ..
                }
        )
    }

    /// Check if this error is permanent.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            NsqError::Rejected { .. } | NsqError::InvalidTopic { .. } | NsqError::EmptyMessage
        )
    }
}

pub type NsqResult<T> = Result<T, NsqError>;
