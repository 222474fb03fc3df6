//! SQLite-backed record store.

use super::models::{Record, RecordKey};
use super::schema::RECORD_VERSIONED_SCHEMAS;
use super::trait_def::{RecordStore, StoreError, DEFAULT_SCAN_PAGE_SIZE};
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
    scan_page_size: usize,
}

impl SqliteRecordStore {
    /// Open (or create) the record database at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let mut conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open record database {:?}", db_path))?;
        Self::from_connection(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            scan_page_size: DEFAULT_SCAN_PAGE_SIZE,
        })
    }

    /// In-memory store, mostly useful for tests and dry runs.
    pub fn in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        Self::from_connection(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            scan_page_size: DEFAULT_SCAN_PAGE_SIZE,
        })
    }

    pub fn with_scan_page_size(mut self, scan_page_size: usize) -> Self {
        self.scan_page_size = scan_page_size.max(1);
        self
    }

    fn from_connection(conn: &mut Connection) -> Result<()> {
        migrate_if_needed(conn, RECORD_VERSIONED_SCHEMAS, "record")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |r| r.get(0))?;
        info!("Opened record store: {} records", count);
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn parse_row(
        author: String,
        title: String,
        fields: String,
        last_modified: Option<i64>,
    ) -> Result<Record, StoreError> {
        let mut record: Record =
            serde_json::from_str(&fields).map_err(|source| StoreError::Corrupted {
                key: RecordKey::new(author.clone(), title.clone()),
                source,
            })?;
        // The key columns and the timestamp column are authoritative.
        record.author = author;
        record.title = title;
        record.last_modified = last_modified;
        Ok(record)
    }
}

type RawRow = (String, String, String, Option<i64>);

fn read_raw_row(row: &rusqlite::Row) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<Record>, StoreError> {
        let raw = {
            let conn = self.conn()?;
            conn.query_row(
                "SELECT author, title, fields, last_modified FROM records
                 WHERE author = ?1 AND title = ?2",
                params![key.author, key.title],
                read_raw_row,
            )
            .optional()?
        };
        raw.map(|(author, title, fields, last_modified)| {
            Self::parse_row(author, title, fields, last_modified)
        })
        .transpose()
    }

    async fn put(&self, record: &Record) -> Result<(), StoreError> {
        let record = record.clone().normalized();
        let fields = serde_json::to_string(&record)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO records (author, title, fields, last_modified)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(author, title) DO UPDATE SET
                fields = excluded.fields,
                last_modified = excluded.last_modified",
            params![record.author, record.title, fields, record.last_modified],
        )?;
        Ok(())
    }

    async fn delete(&self, key: &RecordKey) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM records WHERE author = ?1 AND title = ?2",
            params![key.author, key.title],
        )?;
        Ok(())
    }

    async fn scan_page(
        &self,
        after: Option<RecordKey>,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError> {
        let rows = {
            let conn = self.conn()?;
            match after {
                Some(after) => {
                    let mut stmt = conn.prepare_cached(
                        "SELECT author, title, fields, last_modified FROM records
                         WHERE (author, title) > (?1, ?2)
                         ORDER BY author, title
                         LIMIT ?3",
                    )?;
                    let rows = stmt
                        .query_map(
                            params![after.author, after.title, limit as i64],
                            read_raw_row,
                        )?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows
                }
                None => {
                    let mut stmt = conn.prepare_cached(
                        "SELECT author, title, fields, last_modified FROM records
                         ORDER BY author, title
                         LIMIT ?1",
                    )?;
                    let rows = stmt
                        .query_map(params![limit as i64], read_raw_row)?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows
                }
            }
        };
        rows.into_iter()
            .map(|(author, title, fields, last_modified)| {
                Self::parse_row(author, title, fields, last_modified)
            })
            .collect()
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    fn scan_page_size(&self) -> usize {
        self.scan_page_size
    }
}
