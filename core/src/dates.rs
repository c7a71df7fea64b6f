//! Date Normalizer — lossy calendar-date parsing with a sentinel.
//!
//! RULE: Date parsing never fails loudly. A value that cannot be read
//! as a date becomes Missing (coercion pass) or the sentinel (enforce
//! pass), never an error.

use crate::{
    error::PipelineResult,
    report::StageRecord,
    stage::TableStage,
    table::{FieldKind, Table, Value},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Default placeholder for absent dates. Far outside the loan data range.
pub fn default_sentinel() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).expect("1900-01-01 is a valid date")
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%b-%Y"];

/// Parse text as a calendar date or timestamp. Returns None on failure.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc())
}

/// Coerce a cell to a date, keeping Missing for anything unreadable.
pub fn coerce_date(value: Value) -> Value {
    match value {
        Value::Date(_) => value,
        Value::Text(s) => parse_date(&s).map(Value::Date).unwrap_or(Value::Missing),
        _ => Value::Missing,
    }
}

/// The sentinel-imposing pass over every Date column of a table.
///
/// Run on the status log after missing-value resolution: any cell in a
/// date column that is not already a genuine date (including a
/// placeholder left behind as text) is re-parsed, falling back to the
/// sentinel.
pub struct DateNormalizer {
    sentinel: NaiveDateTime,
}

impl DateNormalizer {
    pub fn new(sentinel: NaiveDate) -> Self {
        Self {
            sentinel: sentinel.and_hms_opt(0, 0, 0).unwrap_or_default(),
        }
    }

    /// Returns the normalized table and how many cells took the sentinel.
    pub fn enforce(&self, table: Table) -> (Table, usize) {
        let date_cols: Vec<usize> = table
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == FieldKind::Date)
            .map(|(i, _)| i)
            .collect();

        let mut replaced = 0;
        let mut table = table;
        for idx in date_cols {
            table = table.map_column(idx, |v| match coerce_date(v) {
                Value::Date(d) => Value::Date(d),
                _ => {
                    replaced += 1;
                    Value::Date(self.sentinel)
                }
            });
        }
        (table, replaced)
    }
}

impl TableStage for DateNormalizer {
    fn name(&self) -> &'static str {
        "date_normalizer"
    }

    fn apply(&self, table: Table) -> PipelineResult<(Table, StageRecord)> {
        let rows_in = table.len();
        let (table, replaced) = self.enforce(table);
        if replaced > 0 {
            log::debug!("{}: {replaced} date cells set to sentinel", table.name());
        }
        let record = StageRecord {
            stage: self.name().to_string(),
            rows_in,
            rows_out: table.len(),
            cells_filled: replaced,
            ..StageRecord::default()
        };
        Ok((table, record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn parses_common_formats() {
        assert_eq!(parse_date("2023-06-15"), Some(ymd(2023, 6, 15)));
        assert_eq!(parse_date("06/15/2023"), Some(ymd(2023, 6, 15)));
        assert_eq!(parse_date("2023/06/15"), Some(ymd(2023, 6, 15)));
        assert_eq!(parse_date("15-Jun-2023"), Some(ymd(2023, 6, 15)));
        assert_eq!(
            parse_date("2023-06-15 13:45:00"),
            NaiveDate::from_ymd_opt(2023, 6, 15).unwrap().and_hms_opt(13, 45, 0)
        );
        assert!(parse_date("2023-06-15T13:45:00Z").is_some());
    }

    #[test]
    fn garbage_is_none_not_panic() {
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("2023-02-30"), None);
        assert_eq!(parse_date("   "), None);
    }

    #[test]
    fn coerce_keeps_missing_for_numbers() {
        assert_eq!(coerce_date(Value::Number(45000.0)), Value::Missing);
        assert_eq!(coerce_date(Value::Missing), Value::Missing);
    }
}
