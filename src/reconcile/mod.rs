//! Bulk reconciliation between spreadsheets and the record store.

mod engine;
mod headers;
mod stats;
mod tabular;

pub use engine::{ExportSettings, ExportedFile, ReconcileError, Reconciler, EXPORT_COLUMNS};
pub use headers::{canonical_field, ColumnMap};
pub use stats::{ReconciliationStats, RowOutcome};
pub use tabular::{read_rows, write_rows, TabularError, TabularFormat};
