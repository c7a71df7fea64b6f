//! In-memory table model shared by every stage.
//!
//! RULE: Stages take a Table by value and return a new Table.
//! Nothing holds a table by shared mutable reference across stages.

use crate::error::{PipelineError, PipelineResult};
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Number(f64),
    Text(String),
    Date(NaiveDateTime),
}

/// Hashable identity of a cell, used for exact-duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellKey {
    Missing,
    Number(u64),
    Text(String),
    Date(i64, u32),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Render for CSV output. Missing renders as an empty field.
    pub fn render(&self) -> String {
        match self {
            Value::Missing => String::new(),
            Value::Number(n) => n.to_string(),
            Value::Text(s) => s.clone(),
            Value::Date(d) => render_date(d),
        }
    }

    pub fn key(&self) -> CellKey {
        match self {
            Value::Missing => CellKey::Missing,
            // -0.0 and 0.0 are the same value.
            Value::Number(n) if *n == 0.0 => CellKey::Number(0.0f64.to_bits()),
            Value::Number(n) => CellKey::Number(n.to_bits()),
            Value::Text(s) => CellKey::Text(s.clone()),
            Value::Date(d) => {
                let utc = d.and_utc();
                CellKey::Date(utc.timestamp(), utc.timestamp_subsec_nanos())
            }
        }
    }
}

/// Dates at midnight render as a bare date, anything else with the time.
/// Sub-second parts are written out so the text parses back to the same
/// instant.
pub fn render_date(d: &NaiveDateTime) -> String {
    if d.nanosecond() != 0 {
        d.format("%Y-%m-%d %H:%M:%S%.f").to_string()
    } else if d.num_seconds_from_midnight() == 0 {
        d.format("%Y-%m-%d").to_string()
    } else {
        d.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Declared semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Key,
    Numeric,
    Categorical,
    Date,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: FieldKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self { name: name.into(), kind }
    }
}

/// A typed table: ordered columns plus row-major cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name:    String,
    columns: Vec<Column>,
    rows:    Vec<Vec<Value>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_rows(name: impl Into<String>, columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn into_parts(self) -> (String, Vec<Column>, Vec<Vec<Value>>) {
        (self.name, self.columns, self.rows)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn require_column(&self, name: &str) -> PipelineResult<usize> {
        self.column_index(name).ok_or_else(|| PipelineError::UnknownColumn {
            table:  self.name.clone(),
            column: name.to_string(),
        })
    }

    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |r| &r[idx])
    }

    /// Cell lookup by row number and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub fn missing_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|r| r.iter())
            .filter(|v| v.is_missing())
            .count()
    }

    /// Remove the named columns. Names not present are ignored.
    pub fn drop_columns(self, names: &[&str]) -> Table {
        let keep: Vec<bool> = self
            .columns
            .iter()
            .map(|c| !names.contains(&c.name.as_str()))
            .collect();
        let columns = self
            .columns
            .into_iter()
            .zip(&keep)
            .filter_map(|(c, k)| k.then_some(c))
            .collect();
        let rows = self
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(&keep)
                    .filter_map(|(v, k)| k.then_some(v))
                    .collect()
            })
            .collect();
        Table {
            name: self.name,
            columns,
            rows,
        }
    }

    /// Append a column. `values` must hold one cell per row.
    pub fn with_column(mut self, column: Column, values: Vec<Value>) -> Table {
        debug_assert_eq!(values.len(), self.rows.len());
        self.columns.push(column);
        for (row, v) in self.rows.iter_mut().zip(values) {
            row.push(v);
        }
        self
    }

    pub fn retain_rows(mut self, mut keep: impl FnMut(&[Value]) -> bool) -> Table {
        self.rows.retain(|r| keep(r));
        self
    }

    /// Rewrite every cell of one column.
    pub fn map_column(mut self, idx: usize, mut f: impl FnMut(Value) -> Value) -> Table {
        for row in &mut self.rows {
            let v = std::mem::replace(&mut row[idx], Value::Missing);
            row[idx] = f(v);
        }
        self
    }
}

/// Untyped table as delivered by a loader, before any coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub name:    String,
    pub headers: Vec<String>,
    pub rows:    Vec<Vec<Value>>,
}

impl RawTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn midnight_dates_render_without_time() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(Value::Date(d).render(), "2024-03-01");
        let t = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(9, 30, 0).unwrap();
        assert_eq!(Value::Date(t).render(), "2024-03-01 09:30:00");
    }

    #[test]
    fn fractional_seconds_are_rendered() {
        let d = NaiveDate::from_ymd_opt(2023, 6, 15).unwrap();
        let t = d.and_hms_milli_opt(13, 45, 0, 500).unwrap();
        assert_eq!(render_date(&t), "2023-06-15 13:45:00.500");
        let t = d.and_hms_milli_opt(0, 0, 0, 500).unwrap();
        assert_eq!(render_date(&t), "2023-06-15 00:00:00.500");
    }

    #[test]
    fn signed_zero_shares_a_key() {
        assert_eq!(Value::Number(0.0).key(), Value::Number(-0.0).key());
    }

    #[test]
    fn drop_columns_keeps_order() {
        let t = Table::from_rows(
            "t",
            vec![
                Column::new("a", FieldKind::Numeric),
                Column::new("b", FieldKind::Numeric),
                Column::new("c", FieldKind::Numeric),
            ],
            vec![vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]],
        );
        let t = t.drop_columns(&["b", "zzz"]);
        assert_eq!(t.column_names(), vec!["a", "c"]);
        assert_eq!(t.rows()[0], vec![Value::Number(1.0), Value::Number(3.0)]);
    }
}
