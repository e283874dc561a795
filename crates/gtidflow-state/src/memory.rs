use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use gtidflow_core::GtidSet;

use crate::error::{StateError, StateResult};
use crate::CheckpointStore;

/// In-memory checkpoint store (for testing and dry runs).
#[derive(Default)]
pub struct MemoryCheckpointStore {
    current: Mutex<GtidSet>,
    fail_writes: AtomicBool,
    writes: Mutex<Vec<String>>,
}

impl MemoryCheckpointStore {
    pub fn new(initial: GtidSet) -> Self {
        Self {
            current: Mutex::new(initial),
            ..Default::default()
        }
    }

    /// A store whose updates always fail.
    pub fn failing() -> Self {
        let store = Self::default();
        store.set_fail_writes(true);
        store
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Every transaction id successfully applied, in order.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn update(&self, transaction_id: &str) -> StateResult<()> {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());

        let mut next = current.clone();
        next.update(transaction_id)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StateError::WriteFailed("simulated failure".into()));
        }

        *current = next;
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(transaction_id.to_string());
        Ok(())
    }

    fn read(&self) -> StateResult<GtidSet> {
        Ok(self.current.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }
}
