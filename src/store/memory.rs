//! In-process recorder, used where no storage backend is wanted.

use super::{MetricStore, StoreError};
use crate::record::HostMetricRecord;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Keeps every committed batch in memory, in commit order
#[derive(Debug, Default)]
pub struct MemoryStore {
    batches: Mutex<Vec<Vec<HostMetricRecord>>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent commits fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Committed batches, oldest first
    pub fn batches(&self) -> Vec<Vec<HostMetricRecord>> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// All committed rows, flattened
    pub fn rows(&self) -> Vec<HostMetricRecord> {
        self.batches().into_iter().flatten().collect()
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn commit(&self, batch: &[HostMetricRecord]) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to fail".to_string()));
        }
        let mut batches = self
            .batches
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        batches.push(batch.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn failing_commit_records_nothing() {
        let store = MemoryStore::new();
        let batch = vec![HostMetricRecord::unreachable("10.0.0.1", Utc::now(), "down")];

        store.set_failing(true);
        assert!(store.commit(&batch).await.is_err());
        assert!(store.rows().is_empty());

        store.set_failing(false);
        store.commit(&batch).await.unwrap();
        assert_eq!(store.batches().len(), 1);
    }
}
