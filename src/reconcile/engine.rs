//! Bulk import and export against the record store.
//!
//! Import runs in two phases. The whole sheet is parsed and validated before
//! the store is touched; rows are then applied one at a time, and the first
//! store or index failure aborts the run.

use super::headers::ColumnMap;
use super::stats::{ReconciliationStats, RowOutcome};
use super::tabular::{self, TabularError, TabularFormat};
use crate::clock::ModificationClock;
use crate::record_store::{Record, RecordField, RecordStore, StoreError};
use crate::search::{IndexError, SearchIndex};
use futures::TryStreamExt;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};

/// Exported columns, in order.
pub const EXPORT_COLUMNS: [RecordField; 10] = [
    RecordField::Author,
    RecordField::Title,
    RecordField::Chords,
    RecordField::Text,
    RecordField::Translation,
    RecordField::Options,
    RecordField::Review,
    RecordField::Lessons,
    RecordField::AudioPath,
    RecordField::DocumentPath,
];

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Invalid sheet: {0}")]
    Validation(String),

    #[error("Spreadsheet error: {0}")]
    Tabular(#[from] TabularError),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("Search index error: {0}")]
    Index(#[from] IndexError),

    #[error("Failed to access {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Where exports are written and how they are exposed.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub dir: PathBuf,
    pub public_prefix: String,
    pub format: TabularFormat,
}

/// A written export file.
#[derive(Debug, Clone, Serialize)]
pub struct ExportedFile {
    pub path: PathBuf,
    pub public_path: String,
    pub rows: usize,
}

pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    index: Arc<dyn SearchIndex>,
    clock: Arc<ModificationClock>,
    export: ExportSettings,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        index: Arc<dyn SearchIndex>,
        clock: Arc<ModificationClock>,
        export: ExportSettings,
    ) -> Self {
        Self {
            store,
            index,
            clock,
            export,
        }
    }

    /// Reconcile a sheet (XLSX or CSV, detected from content) against the
    /// record store.
    pub async fn import(&self, bytes: Vec<u8>) -> Result<ReconciliationStats, ReconcileError> {
        let rows = tokio::task::spawn_blocking(move || tabular::read_rows(&bytes)).await??;
        let (columns, candidates) = parse_sheet(rows)?;
        info!("Importing {} rows", candidates.len());

        let mut stats = ReconciliationStats::default();
        for candidate in candidates {
            let outcome = self.apply_row(&columns, candidate).await?;
            stats.record(outcome);
        }
        info!("Import finished: {}", stats);
        Ok(stats)
    }

    pub async fn import_reader<R>(
        &self,
        mut reader: R,
    ) -> Result<ReconciliationStats, ReconcileError>
    where
        R: AsyncRead + Unpin,
    {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .await
            .map_err(|source| ReconcileError::Io {
                path: PathBuf::from("<input>"),
                source,
            })?;
        self.import(bytes).await
    }

    pub async fn import_file(&self, path: &Path) -> Result<ReconciliationStats, ReconcileError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ReconcileError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        self.import(bytes).await
    }

    async fn apply_row(
        &self,
        columns: &ColumnMap,
        mut candidate: Record,
    ) -> Result<RowOutcome, ReconcileError> {
        let key = candidate.key();
        let outcome = match self.store.get(&key).await? {
            None => RowOutcome::Added,
            Some(stored) => {
                // Asset paths are not spreadsheet data unless the sheet has them.
                for field in RecordField::ALL.into_iter().filter(|f| f.is_derived()) {
                    if !columns.contains(field) {
                        if let Some(path) = field.get(&stored) {
                            field.set(&mut candidate, path.to_string());
                        }
                    }
                }
                if stored.same_content(&candidate) {
                    debug!("Skipping unchanged record '{}'", key);
                    return Ok(RowOutcome::Skipped);
                }
                RowOutcome::Replaced
            }
        };

        candidate.last_modified = Some(self.clock.now_millis());
        self.store.put(&candidate).await?;
        self.index.index_document(&candidate).await?;
        debug!("{:?} record '{}'", outcome, key);
        Ok(outcome)
    }

    /// Write every stored record to a new timestamped file in the export
    /// directory.
    pub async fn export(&self) -> Result<ExportedFile, ReconcileError> {
        let records: Vec<Record> = self.store.scan_all().try_collect().await?;
        let row_count = records.len();

        let mut rows = Vec::with_capacity(row_count + 1);
        rows.push(
            EXPORT_COLUMNS
                .iter()
                .map(|f| f.name().to_string())
                .collect::<Vec<_>>(),
        );
        rows.extend(records.iter().map(|record| {
            EXPORT_COLUMNS
                .iter()
                .map(|f| f.get(record).unwrap_or_default().to_string())
                .collect::<Vec<_>>()
        }));

        let format = self.export.format;
        let bytes = tokio::task::spawn_blocking(move || tabular::write_rows(format, &rows)).await??;

        let dir = &self.export.dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| ReconcileError::Io {
                path: dir.clone(),
                source,
            })?;
        let file_name = format!(
            "export_{}.{}",
            self.clock.now_millis(),
            format.extension()
        );
        let path = dir.join(&file_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| ReconcileError::Io {
                path: path.clone(),
                source,
            })?;

        info!("Exported {} records to {:?}", row_count, path);
        Ok(ExportedFile {
            public_path: format!(
                "{}/{}",
                self.export.public_prefix.trim_end_matches('/'),
                file_name
            ),
            path,
            rows: row_count,
        })
    }
}

/// Validation phase: header mapping and per-row checks, no store access.
fn parse_sheet(rows: Vec<Vec<String>>) -> Result<(ColumnMap, Vec<Record>), ReconcileError> {
    let mut rows = rows.into_iter();
    let headers = rows
        .next()
        .ok_or_else(|| ReconcileError::Validation("the sheet has no header row".to_string()))?;
    let columns = ColumnMap::from_headers(&headers);
    if !columns.contains(RecordField::Title) {
        return Err(ReconcileError::Validation(
            "the sheet has no title column".to_string(),
        ));
    }

    let mut candidates = Vec::new();
    // Sheet row numbers are 1-based and the header is row 1.
    for (row_number, row) in (2..).zip(rows) {
        if columns.is_blank(&row) {
            continue;
        }
        let record = columns.record_from_row(&row);
        if record.title.trim().is_empty() {
            return Err(ReconcileError::Validation(format!(
                "row {} has no title",
                row_number
            )));
        }
        candidates.push(record);
    }
    Ok((columns, candidates))
}
