//! Tab-delimited table reading.
//!
//! ALPINE writes every statistics and metadata file as a headed TSV. These
//! helpers open a file, read it through `csv`, and release the handle
//! before returning.

use crate::error::{SummaryError, SummaryResult};
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::path::Path;

/// A headed table of string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<StringRecord>,
}

impl Table {
    /// Index of a named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

fn tsv_reader(path: &Path) -> SummaryResult<csv::Reader<File>> {
    ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)
        .map_err(|source| table_error(path, source))
}

fn table_error(path: &Path, source: csv::Error) -> SummaryError {
    SummaryError::Table {
        path: path.to_path_buf(),
        source,
    }
}

/// Read an entire TSV file into memory.
pub fn read_table(path: &Path) -> SummaryResult<Table> {
    let mut reader = tsv_reader(path)?;
    let columns = reader
        .headers()
        .map_err(|source| table_error(path, source))?
        .iter()
        .map(String::from)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record.map_err(|source| table_error(path, source))?);
    }

    Ok(Table { columns, rows })
}

/// Count data rows without keeping them.
pub fn count_rows(path: &Path) -> SummaryResult<u64> {
    let mut reader = tsv_reader(path)?;
    let mut record = StringRecord::new();
    let mut count = 0;

    while reader
        .read_record(&mut record)
        .map_err(|source| table_error(path, source))?
    {
        count += 1;
    }

    Ok(count)
}

/// Outcome of looking up the first value of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirstValue {
    Value(String),
    /// The header was present but no data rows followed.
    NoRows,
    /// The column does not exist; carries the columns that do.
    MissingColumn(Vec<String>),
}

/// First value of a named column.
pub fn first_value(path: &Path, column: &str) -> SummaryResult<FirstValue> {
    let mut reader = tsv_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|source| table_error(path, source))?
        .clone();

    let Some(index) = headers.iter().position(|name| name == column) else {
        return Ok(FirstValue::MissingColumn(
            headers.iter().map(String::from).collect(),
        ));
    };

    let mut record = StringRecord::new();
    if !reader
        .read_record(&mut record)
        .map_err(|source| table_error(path, source))?
    {
        return Ok(FirstValue::NoRows);
    }

    Ok(record
        .get(index)
        .map(|value| FirstValue::Value(value.to_string()))
        .unwrap_or(FirstValue::NoRows))
}
