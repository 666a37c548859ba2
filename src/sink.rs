//! Persistence for flattened rows: CSV append with a growing header, Parquet
//! export, and the processed-match lookup used for dedup across runs.

use crate::error::SinkError;
use crate::metrics::{FieldValue, Record};
use crate::rows::TEXT_FIELDS;
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::path::Path;

pub const MATCH_ID_COLUMN: &str = "Match ID";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvFormat {
    pub delimiter: u8,
    /// Write `3,5` instead of `3.5`.
    pub decimal_comma: bool,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            delimiter: b';',
            decimal_comma: true,
        }
    }
}

impl CsvFormat {
    pub fn plain() -> Self {
        Self {
            delimiter: b',',
            decimal_comma: false,
        }
    }
}

fn format_cell(value: &FieldValue, format: CsvFormat) -> String {
    match value {
        FieldValue::Float(v) if format.decimal_comma => v.to_string().replace('.', ","),
        other => other.to_string(),
    }
}

fn parse_cell(column: &str, raw: &str, format: CsvFormat) -> Option<FieldValue> {
    if raw.is_empty() {
        return None;
    }

    if TEXT_FIELDS.contains(&column) {
        return Some(FieldValue::Text(raw.to_string()));
    }

    if let Ok(v) = raw.parse::<i64>() {
        return Some(FieldValue::Int(v));
    }

    let normalized = if format.decimal_comma {
        raw.replace(',', ".")
    } else {
        raw.to_string()
    };

    match normalized.parse::<f64>() {
        Ok(v) => Some(FieldValue::Float(v)),
        Err(_) => Some(FieldValue::Text(raw.to_string())),
    }
}

/// Column order: `existing` first, then keys in the order rows introduce them.
fn union_headers(existing: &[String], rows: &[Record]) -> Vec<String> {
    let mut headers: Vec<String> = existing.to_vec();
    let mut seen: HashSet<String> = existing.iter().cloned().collect();

    for row in rows {
        for key in row.keys() {
            if seen.insert(key.to_string()) {
                headers.push(key.to_string());
            }
        }
    }

    headers
}

fn ensure_parent(path: &Path) -> Result<(), SinkError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn read_headers(path: &Path, format: CsvFormat) -> Result<Vec<String>, SinkError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(format.delimiter)
        .from_path(path)?;
    Ok(reader.headers()?.iter().map(|h| h.to_string()).collect())
}

pub fn read_csv_records(path: &Path, format: CsvFormat) -> Result<Vec<Record>, SinkError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(format.delimiter)
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        let mut record = Record::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            if let Some(value) = parse_cell(header, cell, format) {
                record.push(header, value);
            }
        }
        records.push(record);
    }

    Ok(records)
}

fn write_rows<W: std::io::Write>(
    writer: &mut csv::Writer<W>,
    headers: &[String],
    rows: &[Record],
    format: CsvFormat,
) -> Result<(), SinkError> {
    for row in rows {
        let cells: Vec<String> = headers
            .iter()
            .map(|h| {
                row.get(h)
                    .map(|v| format_cell(v, format))
                    .unwrap_or_default()
            })
            .collect();
        writer.write_record(&cells)?;
    }
    Ok(())
}

/// Appends `rows` to the CSV at `path`. If the batch brings columns the file
/// does not have yet, the file is rewritten under the merged header and old
/// rows get blank cells. Returns the number of rows appended.
pub fn append_csv(path: &Path, rows: &[Record], format: CsvFormat) -> Result<usize, SinkError> {
    if rows.is_empty() {
        return Ok(0);
    }

    ensure_parent(path)?;

    let existing_headers = if path.exists() {
        read_headers(path, format)?
    } else {
        Vec::new()
    };
    let headers = union_headers(&existing_headers, rows);

    if !existing_headers.is_empty() && headers == existing_headers {
        let file = OpenOptions::new().append(true).open(path)?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(format.delimiter)
            .has_headers(false)
            .from_writer(file);
        write_rows(&mut writer, &headers, rows, format)?;
        writer.flush()?;
        return Ok(rows.len());
    }

    let previous = if existing_headers.is_empty() {
        Vec::new()
    } else {
        read_csv_records(path, format)?
    };

    let mut writer = csv::WriterBuilder::new()
        .delimiter(format.delimiter)
        .from_path(path)?;
    writer.write_record(&headers)?;
    write_rows(&mut writer, &headers, &previous, format)?;
    write_rows(&mut writer, &headers, rows, format)?;
    writer.flush()?;

    Ok(rows.len())
}

/// Match ids already present in the CSV at `path`; empty when it does not exist.
pub fn load_processed_ids(path: &Path, format: CsvFormat) -> Result<HashSet<String>, SinkError> {
    if !path.exists() {
        return Ok(HashSet::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(format.delimiter)
        .flexible(true)
        .from_path(path)?;

    let Some(index) = reader
        .headers()?
        .iter()
        .position(|h| h == MATCH_ID_COLUMN)
    else {
        return Ok(HashSet::new());
    };

    let mut ids = HashSet::new();
    for result in reader.records() {
        let row = result?;
        if let Some(id) = row.get(index).filter(|id| !id.is_empty()) {
            ids.insert(id.to_string());
        }
    }

    Ok(ids)
}

/// One column per key; integers stay integers unless a float shares the column.
pub fn records_to_dataframe(rows: &[Record]) -> PolarsResult<DataFrame> {
    let headers = union_headers(&[], rows);
    let mut columns: Vec<Series> = Vec::with_capacity(headers.len());

    for name in &headers {
        let values: Vec<Option<&FieldValue>> = rows.iter().map(|r| r.get(name)).collect();
        let present = || values.iter().flatten();

        let series = if present().all(|v| matches!(v, FieldValue::Int(_))) {
            let ints: Vec<Option<i64>> = values
                .iter()
                .map(|v| match v {
                    Some(FieldValue::Int(i)) => Some(*i),
                    _ => None,
                })
                .collect();
            Series::new(name.as_str(), ints)
        } else if present().all(|v| v.as_f64().is_some()) {
            let floats: Vec<Option<f64>> = values
                .iter()
                .map(|v| v.and_then(|v| v.as_f64()))
                .collect();
            Series::new(name.as_str(), floats)
        } else {
            let texts: Vec<Option<String>> = values
                .iter()
                .map(|v| v.map(|v| v.to_string()))
                .collect();
            Series::new(name.as_str(), texts)
        };

        columns.push(series);
    }

    DataFrame::new(columns)
}

pub fn write_parquet(path: &Path, rows: &[Record]) -> Result<(), SinkError> {
    ensure_parent(path)?;

    let mut df = records_to_dataframe(rows)?;
    let mut file = File::create(path)?;
    ParquetWriter::new(&mut file).finish(&mut df)?;

    Ok(())
}
