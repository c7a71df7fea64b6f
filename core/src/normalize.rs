//! Type Normalizer — raw loader output to a typed table.
//!
//! Headers are canonicalized (lowercase, spaces to underscores) and
//! checked against the dataset schema. Cells are coerced per declared
//! kind. Coercion is lossy: an unreadable numeric or date cell becomes
//! Missing and is counted, it is never an error.

use crate::{
    dates::coerce_date,
    error::{PipelineError, PipelineResult},
    report::StageRecord,
    schema::{canonical_name, DatasetSchema},
    table::{render_date, FieldKind, RawTable, Table, Value},
};
use std::collections::HashSet;

/// Tokens treated as "no value" in any column.
pub const MISSING_MARKERS: &[&str] = &["", "na", "n/a", "nan", "null", "none", "nat"];

pub fn is_missing_marker(s: &str) -> bool {
    let t = s.trim();
    MISSING_MARKERS.iter().any(|m| t.eq_ignore_ascii_case(m))
}

/// Render a number the way a categorical code should read:
/// integral values without a fractional part.
pub fn format_code(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Outcome of coercing a single cell.
enum Coerced {
    Ok(Value),
    Failed,
}

fn coerce_numeric(value: Value) -> Coerced {
    match value {
        Value::Missing => Coerced::Ok(Value::Missing),
        Value::Number(n) if n.is_nan() => Coerced::Ok(Value::Missing),
        Value::Number(n) if n.is_finite() => Coerced::Ok(Value::Number(n)),
        Value::Number(_) => Coerced::Failed,
        Value::Text(s) if is_missing_marker(&s) => Coerced::Ok(Value::Missing),
        Value::Text(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Coerced::Ok(Value::Number(n)),
            _ => Coerced::Failed,
        },
        Value::Date(_) => Coerced::Failed,
    }
}

fn coerce_categorical(value: Value) -> Value {
    match value {
        Value::Missing => Value::Missing,
        Value::Text(s) if is_missing_marker(&s) => Value::Missing,
        Value::Text(s) => Value::Text(s),
        Value::Number(n) if n.is_nan() => Value::Missing,
        Value::Number(n) => Value::Text(format_code(n)),
        Value::Date(d) => Value::Text(render_date(&d)),
    }
}

/// Keys are trimmed text. A numeric `1.0` (or text `"1.0"`) names the
/// same loan as `"1"`; `"007"` stays `"007"`.
fn coerce_key(value: Value) -> Value {
    match coerce_categorical(value) {
        Value::Text(s) => {
            let t = s.trim();
            match t.split_once('.') {
                Some((whole, zeros))
                    if !whole.is_empty()
                        && whole.bytes().all(|b| b.is_ascii_digit())
                        && !zeros.is_empty()
                        && zeros.bytes().all(|b| b == b'0') =>
                {
                    Value::Text(whole.to_string())
                }
                _ => Value::Text(t.to_string()),
            }
        }
        other => other,
    }
}

fn coerce_date_cell(value: Value) -> Coerced {
    let was_present = match &value {
        Value::Missing => false,
        Value::Text(s) => !is_missing_marker(s),
        _ => true,
    };
    match coerce_date(value) {
        Value::Missing if was_present => Coerced::Failed,
        v => Coerced::Ok(v),
    }
}

pub struct TypeNormalizer {
    schema: DatasetSchema,
}

impl TypeNormalizer {
    pub fn new(schema: DatasetSchema) -> Self {
        Self { schema }
    }

    /// Map each schema field to its position in the raw headers.
    /// Fails with SchemaDrift on any missing, unexpected or repeated column.
    fn header_positions(&self, raw: &RawTable) -> PipelineResult<Vec<usize>> {
        let canonical: Vec<String> = raw.headers.iter().map(|h| canonical_name(h)).collect();
        let declared = self.schema.field_names();

        let mut seen = HashSet::new();
        let mut unexpected: Vec<String> = Vec::new();
        for name in &canonical {
            if !seen.insert(name.as_str()) || !declared.iter().any(|d| *d == name.as_str()) {
                unexpected.push(name.clone());
            }
        }
        let missing: Vec<String> = declared
            .iter()
            .filter(|d| !seen.contains(**d))
            .map(|d| d.to_string())
            .collect();

        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(PipelineError::SchemaDrift {
                dataset: self.schema.dataset.name().to_string(),
                missing,
                unexpected,
            });
        }

        Ok(declared
            .iter()
            .map(|d| canonical.iter().position(|c| c.as_str() == *d).unwrap_or_default())
            .collect())
    }

    /// Produce a typed table in schema column order.
    pub fn apply(&self, raw: RawTable) -> PipelineResult<(Table, StageRecord)> {
        let positions = self.header_positions(&raw)?;
        let columns = self.schema.columns();
        let rows_in = raw.len();
        let mut failures = 0usize;

        let mut table = Table::new(self.schema.dataset.name(), columns.clone());
        for mut raw_row in raw.rows {
            let mut row = Vec::with_capacity(columns.len());
            for (col, &pos) in columns.iter().zip(&positions) {
                let cell = raw_row
                    .get_mut(pos)
                    .map(|v| std::mem::replace(v, Value::Missing))
                    .unwrap_or(Value::Missing);
                let value = match col.kind {
                    FieldKind::Key => coerce_key(cell),
                    FieldKind::Categorical => coerce_categorical(cell),
                    FieldKind::Numeric => match coerce_numeric(cell) {
                        Coerced::Ok(v) => v,
                        Coerced::Failed => {
                            failures += 1;
                            Value::Missing
                        }
                    },
                    FieldKind::Date => match coerce_date_cell(cell) {
                        Coerced::Ok(v) => v,
                        Coerced::Failed => {
                            failures += 1;
                            Value::Missing
                        }
                    },
                };
                row.push(value);
            }
            table.push_row(row);
        }

        if failures > 0 {
            log::warn!(
                "{}: {failures} cells could not be coerced to their declared type",
                table.name()
            );
        }

        let record = StageRecord {
            stage: "type_normalizer".to_string(),
            rows_in,
            rows_out: table.len(),
            coercion_failures: failures,
            ..StageRecord::default()
        };
        Ok((table, record))
    }
}
