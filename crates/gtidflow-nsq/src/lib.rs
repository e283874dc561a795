mod error;
mod http;
mod mock;
mod retry;
mod topic;

use std::future::Future;

pub use error::{NsqError, NsqResult};
pub use http::NsqHttpPublisher;
pub use mock::MockPublisher;
pub use retry::RetryingPublisher;
pub use topic::validate_topic;

/// Trait for broker publish operations.
pub trait Publisher: Send + Sync {
    /// Publish one message to a topic.
    fn publish(&self, topic: &str, payload: Vec<u8>) -> impl Future<Output = NsqResult<()>> + Send;
}
