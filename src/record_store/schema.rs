//! SQLite schema for the record store.
//!
//! Records are stored as a JSON document keyed by `(author, title)`. The
//! document only contains the fields that are set, so a record that went
//! through any write path serializes identically.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

const RECORDS_TABLE: Table = Table {
    name: "records",
    columns: &[
        sqlite_column!("rowid", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("author", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("fields", &SqlType::Text, non_null = true), // JSON document
        sqlite_column!("last_modified", &SqlType::Integer),
    ],
    indices: &[("idx_records_last_modified", "last_modified")],
    unique_constraints: &[&["author", "title"]],
};

pub const RECORD_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[RECORDS_TABLE],
    migration: None,
}];
