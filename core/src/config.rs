use crate::{dates::default_sentinel, schema::Dataset};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File names of the six raw datasets, relative to `data_dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputFiles {
    pub loan_balances: String,
    pub loan_bids:     String,
    pub loan_data:     String,
    pub loan_status:   String,
    pub target_profit: String,
    pub umbs_prices:   String,
}

impl Default for InputFiles {
    fn default() -> Self {
        Self {
            loan_balances: "loan_balances.csv".into(),
            loan_bids:     "loan_bids.csv".into(),
            loan_data:     "loan_data.csv".into(),
            loan_status:   "loan_status.csv".into(),
            target_profit: "target_profit.csv".into(),
            umbs_prices:   "umbs_prices.csv".into(),
        }
    }
}

impl InputFiles {
    pub fn file_for(&self, dataset: Dataset) -> &str {
        match dataset {
            Dataset::LoanBalances => &self.loan_balances,
            Dataset::LoanBids     => &self.loan_bids,
            Dataset::LoanData     => &self.loan_data,
            Dataset::LoanStatus   => &self.loan_status,
            Dataset::TargetProfit => &self.target_profit,
            Dataset::UmbsPrices   => &self.umbs_prices,
        }
    }
}

/// Artifact names, relative to `output_dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFiles {
    pub balances_with_status:       String,
    pub balances_with_amortization: String,
    pub merged:                     String,
    pub report:                     String,
}

impl Default for OutputFiles {
    fn default() -> Self {
        Self {
            balances_with_status:       "updated_loan_balances.csv".into(),
            balances_with_amortization: "updated_loan_balances_with_amortized_balance.csv".into(),
            merged:                     "final_merged_dataset.csv".into(),
            report:                     "run_report.json".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub inputs: InputFiles,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub outputs: OutputFiles,
    /// Placeholder for absent or unreadable status-log dates.
    #[serde(default = "default_sentinel")]
    pub sentinel_date: NaiveDate,
    /// Fixed "now" for the status classifier. When absent the runner
    /// supplies the wall-clock time at startup.
    #[serde(default)]
    pub reference_instant: Option<NaiveDateTime>,
    /// Reject right-side tables with duplicate loan ids before joining.
    #[serde(default = "default_true")]
    pub enforce_unique_join_keys: bool,
    /// SQLite database to record runs and artifacts in, if any.
    #[serde(default)]
    pub database: Option<String>,
}

fn default_data_dir() -> String {
    "./data".into()
}

fn default_output_dir() -> String {
    "./output".into()
}

fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir:                 default_data_dir(),
            inputs:                   InputFiles::default(),
            output_dir:               default_output_dir(),
            outputs:                  OutputFiles::default(),
            sentinel_date:            default_sentinel(),
            reference_instant:        None,
            enforce_unique_join_keys: true,
            database:                 None,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file. Absent keys take their defaults.
    /// In tests, use PipelineConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        Ok(config)
    }

    /// Config with a pinned reference instant for use in tests.
    pub fn default_test() -> Self {
        Self {
            reference_instant: NaiveDate::from_ymd_opt(2024, 6, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
            ..Self::default()
        }
    }

    pub fn input_path(&self, dataset: Dataset) -> PathBuf {
        PathBuf::from(&self.data_dir).join(self.inputs.file_for(dataset))
    }

    pub fn output_path(&self, file: &str) -> PathBuf {
        PathBuf::from(&self.output_dir).join(file)
    }
}
