//! Missing-Value Resolver — per-field drop/impute policy.
//!
//! Policies are applied in a fixed precedence:
//!   1. drop columns
//!   2. drop rows missing a drop-row field
//!   3. fill numeric fields with the column median
//!   4. fill categorical fields with the column mode
//!   5. fill sentinel date fields with the sentinel
//!
//! Keep fields pass through untouched, Missing included. That is the
//! one exception to "no Missing after resolution": a balance row whose
//! due date could not be read still gets classified.
//!
//! Statistics are computed over the rows that survive step 2, within
//! the one dataset being resolved. A column that needs filling but has
//! no values to compute a statistic from is a configuration error.

use crate::{
    error::{PipelineError, PipelineResult},
    report::StageRecord,
    schema::{DatasetSchema, MissingPolicy},
    stage::TableStage,
    table::{CellKey, Table, Value},
};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;

/// Median of the non-missing numbers, or None if there are none.
pub fn median<'a>(values: impl Iterator<Item = &'a Value>) -> Option<f64> {
    let mut nums: Vec<f64> = values.filter_map(Value::as_f64).collect();
    if nums.is_empty() {
        return None;
    }
    nums.sort_by(f64::total_cmp);
    let mid = nums.len() / 2;
    if nums.len() % 2 == 0 {
        Some((nums[mid - 1] + nums[mid]) / 2.0)
    } else {
        Some(nums[mid])
    }
}

/// Most frequent non-missing value. Ties go to the value seen first.
pub fn mode<'a>(values: impl Iterator<Item = &'a Value>) -> Option<Value> {
    // key -> (count, first position, value)
    let mut counts: HashMap<CellKey, (usize, usize, &Value)> = HashMap::new();
    for (pos, v) in values.enumerate().filter(|(_, v)| !v.is_missing()) {
        counts.entry(v.key()).or_insert((0, pos, v)).0 += 1;
    }
    counts
        .into_values()
        .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
        .map(|(_, _, v)| v.clone())
}

pub struct MissingValueResolver {
    schema:   DatasetSchema,
    sentinel: NaiveDateTime,
}

impl MissingValueResolver {
    pub fn new(schema: DatasetSchema, sentinel: NaiveDate) -> Self {
        Self {
            schema,
            sentinel: sentinel.and_hms_opt(0, 0, 0).unwrap_or_default(),
        }
    }

    fn columns_with_policy(&self, table: &Table, policy: MissingPolicy) -> Vec<(usize, &'static str)> {
        self.schema
            .fields
            .iter()
            .filter(|f| f.policy == policy)
            .filter_map(|f| table.column_index(f.name).map(|idx| (idx, f.name)))
            .collect()
    }

    fn empty_column(&self, column: &str) -> PipelineError {
        PipelineError::EmptyColumn {
            dataset: self.schema.dataset.name().to_string(),
            column:  column.to_string(),
        }
    }

    /// Fill every Missing cell of a column with `fill`. Returns the count.
    fn fill(table: Table, idx: usize, fill: &Value) -> (Table, usize) {
        let mut filled = 0;
        let table = table.map_column(idx, |v| {
            if v.is_missing() {
                filled += 1;
                fill.clone()
            } else {
                v
            }
        });
        (table, filled)
    }

    fn needs_fill(table: &Table, idx: usize) -> bool {
        table.column_values(idx).any(Value::is_missing)
    }
}

impl TableStage for MissingValueResolver {
    fn name(&self) -> &'static str {
        "missing_value_resolver"
    }

    fn apply(&self, table: Table) -> PipelineResult<(Table, StageRecord)> {
        let rows_in = table.len();
        let dataset = self.schema.dataset.name();

        // 1. Drop columns.
        let dropped: Vec<&str> = self
            .schema
            .fields
            .iter()
            .filter(|f| f.policy == MissingPolicy::DropColumn)
            .filter(|f| table.column_index(f.name).is_some())
            .map(|f| f.name)
            .collect();
        let mut table = table.drop_columns(&dropped);

        // 2. Drop rows.
        let row_guard: Vec<usize> = self
            .columns_with_policy(&table, MissingPolicy::DropRow)
            .into_iter()
            .map(|(idx, _)| idx)
            .collect();
        table = table.retain_rows(|row| row_guard.iter().all(|&i| !row[i].is_missing()));
        let rows_dropped = rows_in - table.len();
        if rows_dropped > 0 {
            log::info!("{dataset}: dropped {rows_dropped} rows with missing required-row fields");
        }

        let mut filled = 0usize;

        // 3. Median.
        for (idx, name) in self.columns_with_policy(&table, MissingPolicy::Median) {
            if !Self::needs_fill(&table, idx) {
                continue;
            }
            let m = median(table.column_values(idx)).ok_or_else(|| self.empty_column(name))?;
            let (t, n) = Self::fill(table, idx, &Value::Number(m));
            log::debug!("{dataset}.{name}: filled {n} cells with median {m}");
            table = t;
            filled += n;
        }

        // 4. Mode.
        for (idx, name) in self.columns_with_policy(&table, MissingPolicy::Mode) {
            if !Self::needs_fill(&table, idx) {
                continue;
            }
            let m = mode(table.column_values(idx)).ok_or_else(|| self.empty_column(name))?;
            let (t, n) = Self::fill(table, idx, &m);
            log::debug!("{dataset}.{name}: filled {n} cells with mode {}", m.render());
            table = t;
            filled += n;
        }

        // 5. Sentinel dates.
        for (idx, _) in self.columns_with_policy(&table, MissingPolicy::Sentinel) {
            let (t, n) = Self::fill(table, idx, &Value::Date(self.sentinel));
            table = t;
            filled += n;
        }

        // Keep fields are reported, never filled.
        for (idx, name) in self.columns_with_policy(&table, MissingPolicy::Keep) {
            let kept = table.column_values(idx).filter(|v| v.is_missing()).count();
            if kept > 0 {
                log::warn!("{dataset}.{name}: {kept} cells left missing");
            }
        }

        let record = StageRecord {
            stage: self.name().to_string(),
            rows_in,
            rows_out: table.len(),
            columns_dropped: dropped.iter().map(|s| s.to_string()).collect(),
            cells_filled: filled,
            ..StageRecord::default()
        };
        Ok((table, record))
    }
}
