mod error;
mod file;
mod memory;

use std::sync::Arc;

use gtidflow_core::GtidSet;

pub use error::{StateError, StateResult};
pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;

/// Durable holder of the replication position.
pub trait CheckpointStore: Send + Sync {
    /// Merge a GTID (or GTID set) into the position and persist it.
    fn update(&self, transaction_id: &str) -> StateResult<()>;

    /// The current persisted position.
    fn read(&self) -> StateResult<GtidSet>;
}

impl<T: CheckpointStore + ?Sized> CheckpointStore for Arc<T> {
    fn update(&self, transaction_id: &str) -> StateResult<()> {
        (**self).update(transaction_id)
    }

    fn read(&self) -> StateResult<GtidSet> {
        (**self).read()
    }
}
