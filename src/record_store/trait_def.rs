//! RecordStore trait definition.
//!
//! The record store is the single source of truth: the search index and the
//! asset directories are derived from it and can be rebuilt from a full scan.

use super::models::{Record, RecordKey};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use thiserror::Error;

/// Page size used by [`RecordStore::scan_all`] unless a store overrides it.
pub const DEFAULT_SCAN_PAGE_SIZE: usize = 500;

/// Errors raised by a record store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Corrupted record {key}: {source}")]
    Corrupted {
        key: RecordKey,
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store connection poisoned")]
    Poisoned,

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value persistence for records, keyed by `(author, title)`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Point lookup. A missing key is `Ok(None)`.
    async fn get(&self, key: &RecordKey) -> Result<Option<Record>, StoreError>;

    /// Insert or replace the record stored under `record.key()`.
    ///
    /// Empty fields are not persisted.
    async fn put(&self, record: &Record) -> Result<(), StoreError>;

    /// Remove a record. Deleting a missing key is not an error.
    async fn delete(&self, key: &RecordKey) -> Result<(), StoreError>;

    /// Up to `limit` records ordered by key, strictly after `after`.
    async fn scan_page(
        &self,
        after: Option<RecordKey>,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize, StoreError>;

    fn scan_page_size(&self) -> usize {
        DEFAULT_SCAN_PAGE_SIZE
    }

    /// Every stored record as one logical sequence, ordered by key.
    ///
    /// Pages are fetched lazily from the last key seen, so records deleted
    /// while the scan is in progress do not shift the cursor.
    fn scan_all(&self) -> BoxStream<'_, Result<Record, StoreError>> {
        let page_size = self.scan_page_size().max(1);
        stream::try_unfold(Some(None::<RecordKey>), move |cursor| async move {
            let Some(after) = cursor else {
                return Ok::<_, StoreError>(None);
            };
            let page = self.scan_page(after, page_size).await?;
            let next = if page.len() < page_size {
                None
            } else {
                page.last().map(|r| Some(r.key()))
            };
            Ok(Some((page, next)))
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, StoreError>)))
        .try_flatten()
        .boxed()
    }
}
