//! Spreadsheet codec: rows of string cells in and out of XLSX or CSV.
//!
//! These functions are blocking; callers run them on the blocking pool.

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Cursor};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TabularError {
    #[error("Failed to read XLSX: {0}")]
    XlsxRead(#[from] calamine::XlsxError),

    #[error("Failed to write XLSX: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("Workbook has no worksheet")]
    NoWorksheet,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabularFormat {
    #[default]
    Xlsx,
    Csv,
}

impl TabularFormat {
    /// XLSX files are ZIP containers; anything else is read as CSV.
    pub fn detect(bytes: &[u8]) -> Self {
        if infer::doc::is_xlsx(bytes) || infer::archive::is_zip(bytes) {
            TabularFormat::Xlsx
        } else {
            TabularFormat::Csv
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            TabularFormat::Xlsx => "xlsx",
            TabularFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for TabularFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TabularFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xlsx" => Ok(TabularFormat::Xlsx),
            "csv" => Ok(TabularFormat::Csv),
            other => Err(format!("unknown export format '{}' (expected xlsx or csv)", other)),
        }
    }
}

/// Every row of the first worksheet (XLSX) or of the file (CSV), cells
/// coerced to strings. The header row is included.
pub fn read_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, TabularError> {
    match TabularFormat::detect(bytes) {
        TabularFormat::Xlsx => read_xlsx(bytes),
        TabularFormat::Csv => read_csv(bytes),
    }
}

fn read_xlsx(bytes: &[u8]) -> Result<Vec<Vec<String>>, TabularError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(TabularError::NoWorksheet)??;
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

fn read_csv(bytes: &[u8]) -> Result<Vec<Vec<String>>, TabularError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        // Integral numbers print without a fractional part.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            (*f as i64).to_string()
        }
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Serializes `rows` (header row first) into a workbook or a CSV document.
pub fn write_rows(format: TabularFormat, rows: &[Vec<String>]) -> Result<Vec<u8>, TabularError> {
    match format {
        TabularFormat::Xlsx => write_xlsx(rows),
        TabularFormat::Csv => write_csv(rows),
    }
}

fn write_xlsx(rows: &[Vec<String>]) -> Result<Vec<u8>, TabularError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            if r == 0 {
                worksheet.write_string_with_format(r as u32, c as u16, value, &header_format)?;
            } else {
                worksheet.write_string(r as u32, c as u16, value)?;
            }
        }
    }
    Ok(workbook.save_to_buffer()?)
}

fn write_csv(rows: &[Vec<String>]) -> Result<Vec<u8>, TabularError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| TabularError::Io(e.into_error()))
}
