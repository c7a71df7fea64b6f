//! Stage trait.
//!
//! RULE: Every per-table cleaning step implements TableStage.
//! The pipeline applies the stages registered for a dataset in
//! registration order. The order is fixed and documented in pipeline.rs.

use crate::{error::PipelineResult, report::StageRecord, table::Table};

/// The contract every cleaning stage must fulfill.
pub trait TableStage: Send + Sync {
    /// Unique stable name for this stage.
    fn name(&self) -> &'static str;

    /// Consume a table and return the transformed table together with
    /// a record of what the stage did.
    fn apply(&self, table: Table) -> PipelineResult<(Table, StageRecord)>;
}
