//! Songbook catalog library
//!
//! Keeps a record store, per-record asset files and a full-text search index
//! consistent with each other, and reconciles spreadsheets against the record
//! store.

pub mod app;
pub mod assets;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod reconcile;
pub mod record_store;
pub mod search;
pub mod sqlite_persistence;

#[cfg(test)]
mod testing;

// Re-export commonly used types for convenience
pub use app::Services;
pub use coordinator::{Coordinator, MutationError, MutationReport, SaveRequest};
pub use reconcile::{ReconciliationStats, Reconciler};
pub use record_store::{Record, RecordKey, RecordStore, SqliteRecordStore};
pub use search::{Fts5SearchIndex, SearchIndex};
