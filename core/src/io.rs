//! File adapters at the pipeline boundary: CSV tables and the JSON report.
//!
//! RULE: Only io.rs and store.rs touch durable storage.
//! Stages never read or write files.

use crate::{
    dates::parse_date,
    error::{PipelineError, PipelineResult},
    report::RunReport,
    table::{Column, FieldKind, RawTable, Table, Value},
};
use csv::{ReaderBuilder, WriterBuilder};
use std::path::Path;

/// Read a CSV file with a header row into an untyped table.
/// Empty fields become Missing; everything else stays text.
pub fn read_raw_csv(path: impl AsRef<Path>, name: &str) -> PipelineResult<RawTable> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path.as_ref())?;
    let headers = rdr.headers()?.iter().map(str::to_string).collect();
    let mut raw = RawTable::new(name, headers);
    for record in rdr.records() {
        let record = record?;
        raw.push_row(
            record
                .iter()
                .map(|f| if f.is_empty() { Value::Missing } else { Value::text(f) })
                .collect(),
        );
    }
    log::debug!("read {} rows from {}", raw.len(), path.as_ref().display());
    Ok(raw)
}

/// Write a header row and records to `path` through a temporary sibling
/// renamed into place, so a failed write never leaves a truncated file.
fn write_records<'a>(
    path: &Path,
    header: impl IntoIterator<Item = &'a str>,
    rows: impl IntoIterator<Item = &'a [Value]>,
) -> PipelineResult<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let mut written = 0;
    {
        let mut wtr = WriterBuilder::new().from_path(&tmp)?;
        wtr.write_record(header)?;
        for row in rows {
            wtr.write_record(row.iter().map(Value::render))?;
            written += 1;
        }
        wtr.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(written)
}

/// Write a table as CSV: header row, one line per record, no index.
pub fn write_csv(path: impl AsRef<Path>, table: &Table) -> PipelineResult<()> {
    let path = path.as_ref();
    let written = write_records(path, table.column_names(), table.rows().iter().map(Vec::as_slice))?;
    log::info!("wrote {written} rows to {}", path.display());
    Ok(())
}

/// Write a raw dataset back out with its original headers.
pub fn write_raw_csv(path: impl AsRef<Path>, raw: &RawTable) -> PipelineResult<()> {
    let path = path.as_ref();
    let written = write_records(
        path,
        raw.headers.iter().map(String::as_str),
        raw.rows.iter().map(Vec::as_slice),
    )?;
    log::debug!("wrote {written} raw rows to {}", path.display());
    Ok(())
}

/// Write the run report as pretty JSON, temp file first.
pub fn write_report(path: impl AsRef<Path>, report: &RunReport) -> PipelineResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, report.to_json()?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn parse_cell(field: &str, kind: FieldKind) -> Value {
    if field.is_empty() {
        return Value::Missing;
    }
    match kind {
        FieldKind::Numeric => field
            .parse::<f64>()
            .map(Value::Number)
            .unwrap_or(Value::Missing),
        FieldKind::Date => parse_date(field).map(Value::Date).unwrap_or(Value::Missing),
        FieldKind::Key | FieldKind::Categorical => Value::text(field),
    }
}

/// Reload a previously written artifact using its known column kinds.
/// The header must match `columns` exactly.
pub fn read_table_csv(path: impl AsRef<Path>, name: &str, columns: &[Column]) -> PipelineResult<Table> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path.as_ref())?;
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let expected: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    if headers != expected {
        return Err(PipelineError::SchemaDrift {
            dataset:    name.to_string(),
            missing:    expected
                .iter()
                .filter(|e| !headers.iter().any(|h| h == *e))
                .map(|e| e.to_string())
                .collect(),
            unexpected: headers
                .iter()
                .filter(|h| !expected.contains(&h.as_str()))
                .cloned()
                .collect(),
        });
    }

    let mut table = Table::new(name, columns.to_vec());
    for record in rdr.records() {
        let record = record?;
        let row = columns
            .iter()
            .enumerate()
            .map(|(i, c)| parse_cell(record.get(i).unwrap_or_default(), c.kind))
            .collect();
        table.push_row(row);
    }
    Ok(table)
}
