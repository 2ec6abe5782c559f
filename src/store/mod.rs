//! Persistence boundary for collected batches.
//!
//! Every backend is insert-only and commits a batch all-or-nothing.

pub mod jsonl;
pub mod memory;
pub mod sqlite;

use crate::record::HostMetricRecord;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use jsonl::JsonLinesStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Append-only sink for collection batches
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Persist the whole batch, or none of it
    async fn commit(&self, batch: &[HostMetricRecord]) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: MetricStore + ?Sized> MetricStore for Arc<T> {
    async fn commit(&self, batch: &[HostMetricRecord]) -> Result<(), StoreError> {
        (**self).commit(batch).await
    }
}

#[async_trait]
impl<T: MetricStore + ?Sized> MetricStore for Box<T> {
    async fn commit(&self, batch: &[HostMetricRecord]) -> Result<(), StoreError> {
        (**self).commit(batch).await
    }
}
