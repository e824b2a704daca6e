//! A published "current" snapshot with single-writer updates.

use std::sync::Arc;

use parking_lot::Mutex;
use parking_lot::RwLock;

use crate::error::ReadError;
use crate::error::WriteError;
use crate::json_ext::Value;
use crate::plan::QueryPlan;
use crate::read::read;
use crate::snapshot::Snapshot;
use crate::write::write;

/// Holds the current [`Snapshot`] shared by many callers.
///
/// Writes are serialized: each one computes the next snapshot from the current
/// one and publishes it only if it succeeds. Readers never wait on a write in
/// progress and always see a fully published snapshot.
#[derive(Debug, Default)]
pub struct Store {
    current: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
        }
    }

    /// The currently published snapshot. It stays valid after later writes.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    /// Writes `data` on top of the current snapshot and publishes the result.
    pub fn write(&self, plan: &QueryPlan, data: &Value) -> Result<Arc<Snapshot>, WriteError> {
        let _writer = self.writer.lock();
        let current = self.snapshot();
        let next = Arc::new(write(plan, data, &current)?);
        *self.current.write() = next.clone();
        tracing::trace!(records = next.len(), "published snapshot");
        Ok(next)
    }

    /// Reads `plan` from the current snapshot.
    pub fn read(&self, plan: &QueryPlan) -> Result<Value, ReadError> {
        read(plan, &self.snapshot())
    }
}
