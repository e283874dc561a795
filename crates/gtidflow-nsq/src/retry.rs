use std::time::Duration;

use tracing::warn;

use crate::error::NsqResult;
use crate::Publisher;

/// Publishes with exponential backoff over retryable errors.
pub struct RetryingPublisher<P> {
    inner: P,
    max_retries: u32,
    base_delay: Duration,
}

impl<P: Publisher> RetryingPublisher<P> {
    pub fn new(inner: P, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            base_delay: Duration::from_millis(100),
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: Publisher> Publisher for RetryingPublisher<P> {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> NsqResult<()> {
        let mut attempt = 0;
        loop {
            match self.inner.publish(topic, payload.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.base_delay * (1 << attempt.min(16));
                    attempt += 1;
                    warn!(
                        topic,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Publish failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
