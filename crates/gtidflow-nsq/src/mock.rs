use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{NsqError, NsqResult};
use crate::topic::validate_topic;
use crate::Publisher;

/// A mock publisher for testing.
#[derive(Clone, Default)]
pub struct MockPublisher {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Recorded messages by topic, in publish order.
    published: HashMap<String, Vec<Vec<u8>>>,
    /// Publish calls, successful or not.
    attempts: usize,
    /// If set, all publishes fail with this error.
    fail_with: Option<String>,
    /// Fail this many upcoming publishes.
    fail_next: usize,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock publisher that simulates a broker outage.
    pub fn failing(error_message: impl Into<String>) -> Self {
        let publisher = Self::new();
        publisher.lock().fail_with = Some(error_message.into());
        publisher
    }

    /// Fail the next `count` publishes with a network error.
    pub fn fail_next(&self, count: usize) {
        self.lock().fail_next = count;
    }

    /// Messages published to a topic.
    pub fn published(&self, topic: &str) -> Vec<Vec<u8>> {
        self.lock().published.get(topic).cloned().unwrap_or_default()
    }

    pub fn total_published(&self) -> usize {
        self.lock().published.values().map(Vec::len).sum()
    }

    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.published.clear();
        state.attempts = 0;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Publisher for MockPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> NsqResult<()> {
        let mut state = self.lock();
        state.attempts += 1;

        validate_topic(topic)?;

        if let Some(ref error) = state.fail_with {
            return Err(NsqError::Network(error.clone()));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(NsqError::Network("simulated failure".into()));
        }

        state
            .published
            .entry(topic.to_string())
            .or_default()
            .push(payload);
        Ok(())
    }
}
