mod models;
mod schema;
mod store;
mod trait_def;

pub use models::{normalize_author, Record, RecordField, RecordKey, UNKNOWN_AUTHOR};
pub use schema::RECORD_VERSIONED_SCHEMAS;
pub use store::SqliteRecordStore;
pub use trait_def::{RecordStore, StoreError, DEFAULT_SCAN_PAGE_SIZE};
