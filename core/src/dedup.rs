//! Deduplicator — drops exact full-row duplicates, keeping the first.

use crate::{
    error::PipelineResult,
    report::StageRecord,
    stage::TableStage,
    table::{CellKey, Table},
};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct Deduplicator;

impl Deduplicator {
    pub fn new() -> Self {
        Self
    }

    /// Order-preserving; idempotent.
    pub fn dedup(table: Table) -> Table {
        let mut seen: HashSet<Vec<CellKey>> = HashSet::with_capacity(table.len());
        table.retain_rows(|row| seen.insert(row.iter().map(|v| v.key()).collect()))
    }
}

impl TableStage for Deduplicator {
    fn name(&self) -> &'static str {
        "deduplicator"
    }

    fn apply(&self, table: Table) -> PipelineResult<(Table, StageRecord)> {
        let rows_in = table.len();
        let table = Self::dedup(table);
        let removed = rows_in - table.len();
        if removed > 0 {
            log::debug!("{}: removed {removed} duplicate rows", table.name());
        }
        let record = StageRecord {
            stage: self.name().to_string(),
            rows_in,
            rows_out: table.len(),
            duplicates_removed: removed,
            ..StageRecord::default()
        };
        Ok((table, record))
    }
}
