//! Run report — what each stage did to each dataset.
//!
//! Serialized to JSON next to the output artifacts so a run can be
//! audited without re-reading the logs.

use crate::{schema::Dataset, types::RunId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage:              String,
    pub rows_in:            usize,
    pub rows_out:           usize,
    #[serde(default)]
    pub columns_dropped:    Vec<String>,
    #[serde(default)]
    pub cells_filled:       usize,
    #[serde(default)]
    pub coercion_failures:  usize,
    #[serde(default)]
    pub duplicates_removed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetReport {
    pub dataset: Dataset,
    pub stages:  Vec<StageRecord>,
}

impl DatasetReport {
    pub fn new(dataset: Dataset) -> Self {
        Self { dataset, stages: Vec::new() }
    }

    pub fn rows_out(&self) -> Option<usize> {
        self.stages.last().map(|s| s.rows_out)
    }

    pub fn total_filled(&self) -> usize {
        self.stages.iter().map(|s| s.cells_filled).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id:            RunId,
    pub reference_instant: NaiveDateTime,
    pub datasets:          Vec<DatasetReport>,
    pub balances_rows:     usize,
    pub merged_rows:       usize,
    pub merged_columns:    usize,
}

impl RunReport {
    pub fn dataset(&self, dataset: Dataset) -> Option<&DatasetReport> {
        self.datasets.iter().find(|d| d.dataset == dataset)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
