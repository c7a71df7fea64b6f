//! Join Engine — left outer joins on a shared key column.
//!
//! Every row of the left (driving) table appears in the output at least
//! once. A right-side key with several rows fans the left row out; the
//! join does not guard against that. Call `ensure_unique_keys` first
//! when fan-out is not acceptable.
//!
//! Non-key columns present on both sides are kept twice, suffixed
//! `_x` (left) and `_y` (right).

use crate::{
    error::{PipelineError, PipelineResult},
    table::{CellKey, Column, Table, Value},
};
use std::collections::{HashMap, HashSet};

pub const LEFT_SUFFIX: &str = "_x";
pub const RIGHT_SUFFIX: &str = "_y";

/// Fail on the first key that appears more than once.
pub fn ensure_unique_keys(table: &Table, key: &str) -> PipelineResult<()> {
    let idx = table.require_column(key)?;
    let mut counts: HashMap<CellKey, usize> = HashMap::new();
    for v in table.column_values(idx) {
        *counts.entry(v.key()).or_default() += 1;
    }
    // Report in table order so the error is deterministic.
    for v in table.column_values(idx) {
        let count = counts.get(&v.key()).copied().unwrap_or_default();
        if count > 1 {
            return Err(PipelineError::JoinKeyCollision {
                dataset: table.name().to_string(),
                key: v.render(),
                count,
            });
        }
    }
    Ok(())
}

pub fn left_join(left: Table, right: &Table, key: &str) -> PipelineResult<Table> {
    let left_key = left.require_column(key)?;
    let right_key = right.require_column(key)?;

    let (table_name, mut left_cols, left_rows) = left.into_parts();

    let right_cols: Vec<(usize, Column)> = right
        .columns()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != right_key)
        .map(|(i, c)| (i, c.clone()))
        .collect();

    let overlap: HashSet<String> = right_cols
        .iter()
        .filter(|(_, rc)| left_cols.iter().any(|lc| lc.name == rc.name))
        .map(|(_, rc)| rc.name.clone())
        .collect();

    let mut out_cols = Vec::with_capacity(left_cols.len() + right_cols.len());
    for lc in &mut left_cols {
        if overlap.contains(&lc.name) {
            lc.name = format!("{}{LEFT_SUFFIX}", lc.name);
        }
    }
    out_cols.extend(left_cols);
    for (_, rc) in &right_cols {
        let name = if overlap.contains(&rc.name) {
            format!("{}{RIGHT_SUFFIX}", rc.name)
        } else {
            rc.name.clone()
        };
        out_cols.push(Column::new(name, rc.kind));
    }

    let mut index: HashMap<CellKey, Vec<usize>> = HashMap::new();
    for (i, row) in right.rows().iter().enumerate() {
        if !row[right_key].is_missing() {
            index.entry(row[right_key].key()).or_default().push(i);
        }
    }

    let mut out = Table::new(table_name, out_cols);
    let mut fanned_out = 0usize;
    for row in left_rows {
        let matches = if row[left_key].is_missing() {
            None
        } else {
            index.get(&row[left_key].key())
        };
        match matches {
            Some(hits) => {
                if hits.len() > 1 {
                    fanned_out += 1;
                }
                for &hit in hits {
                    let mut joined = row.clone();
                    let right_row = &right.rows()[hit];
                    joined.extend(right_cols.iter().map(|(i, _)| right_row[*i].clone()));
                    out.push_row(joined);
                }
            }
            None => {
                let mut joined = row;
                joined.extend(std::iter::repeat(Value::Missing).take(right_cols.len()));
                out.push_row(joined);
            }
        }
    }

    if fanned_out > 0 {
        log::warn!(
            "join {} <- {}: {fanned_out} rows matched more than one right-side row",
            out.name(),
            right.name()
        );
    }
    log::debug!(
        "join {} <- {}: {} rows, {} columns",
        out.name(),
        right.name(),
        out.len(),
        out.width()
    );
    Ok(out)
}

/// Left-join each right table onto the driving table in order.
pub fn join_chain<'a>(
    driving: Table,
    rights: impl IntoIterator<Item = &'a Table>,
    key: &str,
) -> PipelineResult<Table> {
    rights
        .into_iter()
        .try_fold(driving, |acc, right| left_join(acc, right, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::FieldKind;

    fn table(name: &str, cols: &[(&str, FieldKind)], rows: Vec<Vec<Value>>) -> Table {
        Table::from_rows(
            name,
            cols.iter().map(|(n, k)| Column::new(*n, *k)).collect(),
            rows,
        )
    }

    #[test]
    fn overlapping_columns_get_suffixes() {
        let left = table(
            "l",
            &[("loan_id", FieldKind::Key), ("aus_type", FieldKind::Categorical)],
            vec![vec![Value::text("1"), Value::text("DU")]],
        );
        let right = table(
            "r",
            &[("loan_id", FieldKind::Key), ("aus_type", FieldKind::Categorical)],
            vec![vec![Value::text("1"), Value::text("LP")]],
        );
        let out = left_join(left, &right, "loan_id").unwrap();
        assert_eq!(out.column_names(), vec!["loan_id", "aus_type_x", "aus_type_y"]);
        assert_eq!(out.rows()[0][2], Value::text("LP"));
    }

    #[test]
    fn unmatched_left_rows_get_missing_cells() {
        let left = table("l", &[("loan_id", FieldKind::Key)], vec![vec![Value::text("2")]]);
        let right = table(
            "r",
            &[("loan_id", FieldKind::Key), ("bid_price", FieldKind::Numeric)],
            vec![vec![Value::text("1"), Value::Number(101.5)]],
        );
        let out = left_join(left, &right, "loan_id").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.rows()[0][1], Value::Missing);
    }
}
