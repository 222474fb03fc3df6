//! Search index trait and result types

use crate::record_store::{Record, RecordKey, StoreError};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Opening marker around highlighted terms.
pub const HIGHLIGHT_OPEN: &str = "<em>";
/// Closing marker around highlighted terms.
pub const HIGHLIGHT_CLOSE: &str = "</em>";

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Index database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Index document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Index rebuild could not scan the record store: {0}")]
    Scan(#[from] StoreError),

    #[error("Index connection poisoned")]
    Poisoned,

    #[error("Index unavailable: {0}")]
    Unavailable(String),
}

/// One matching record.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub record: Record,
    /// Higher is more relevant. Always 0 for the recency listing.
    pub score: f64,
    /// Field name to highlighted fragment. Absent fields are omitted.
    pub highlight: BTreeMap<String, String>,
}

/// Derived full-text index over the record store.
///
/// Every document can be re-derived from the records it was built from, so
/// the index is never the only copy of anything.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Create the index if it does not exist yet.
    async fn initialize(&self) -> Result<(), IndexError>;

    /// Insert or replace the document for `record`. Visible to the next query.
    async fn index_document(&self, record: &Record) -> Result<(), IndexError>;

    /// Remove the document for `key`. A missing document is not an error.
    async fn delete_document(&self, key: &RecordKey) -> Result<(), IndexError>;

    async fn delete_all(&self) -> Result<(), IndexError>;

    /// Ranked multi-field match, or the full listing by recency for a blank term.
    async fn query(&self, term: &str) -> Result<Vec<SearchHit>, IndexError>;

    /// Replace the whole index with documents derived from a full store scan.
    ///
    /// Returns the number of indexed documents.
    async fn rebuild_all(&self) -> Result<usize, IndexError>;

    async fn document_count(&self) -> Result<usize, IndexError>;
}
