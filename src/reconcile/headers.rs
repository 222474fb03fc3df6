//! Header row to record field mapping.

use crate::record_store::{Record, RecordField};
use tracing::warn;

/// Matches a header cell to a field name, ignoring case and anything that is
/// not alphanumeric ("Audio Path", "audio_path" and "audioPath" all match).
pub fn canonical_field(header: &str) -> Option<RecordField> {
    let compact: String = header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    if compact.is_empty() {
        return None;
    }
    RecordField::ALL
        .into_iter()
        .find(|field| field.name().eq_ignore_ascii_case(&compact))
}

/// Recognized columns of a sheet, by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    columns: Vec<(usize, RecordField)>,
}

impl ColumnMap {
    /// Unknown headers are dropped with a warning; a repeated header keeps its
    /// first column.
    pub fn from_headers(headers: &[String]) -> Self {
        let mut columns: Vec<(usize, RecordField)> = Vec::new();
        for (position, header) in headers.iter().enumerate() {
            match canonical_field(header) {
                Some(field) if columns.iter().any(|(_, f)| *f == field) => {
                    warn!("Ignoring duplicate column '{}'", header);
                }
                Some(field) => columns.push((position, field)),
                None if header.trim().is_empty() => {}
                None => warn!("Ignoring unknown column '{}'", header),
            }
        }
        Self { columns }
    }

    pub fn contains(&self, field: RecordField) -> bool {
        self.columns.iter().any(|(_, f)| *f == field)
    }

    /// Candidate record from the recognized cells of `row`, normalized.
    pub fn record_from_row(&self, row: &[String]) -> Record {
        let mut record = Record::default();
        for (position, field) in &self.columns {
            if let Some(value) = row.get(*position) {
                field.set(&mut record, value.clone());
            }
        }
        record.normalized()
    }

    /// True when every recognized cell of `row` is blank.
    pub fn is_blank(&self, row: &[String]) -> bool {
        self.columns
            .iter()
            .all(|(position, _)| row.get(*position).map_or(true, |v| v.trim().is_empty()))
    }
}
