//! The pipeline — one batch pass from six raw tables to the merged table.
//!
//! STAGE ORDER (fixed, documented, never reordered):
//!   per dataset:
//!     1. Type Normalizer
//!     2. Date Normalizer, coercing pass    (loan_status only)
//!     3. Missing-Value Resolver
//!     4. Deduplicator
//!     5. Date Normalizer, sentinel pass    (loan_status only)
//!   balances only:
//!     6. Loan Status Classifier
//!     7. Amortization Engine
//!   then:
//!     8. Join: balances ⟕ loan_data ⟕ loan_status ⟕ target_profit ⟕ loan_bids
//!
//! RULES:
//!   - Each stage takes ownership of a table and hands a new one on.
//!   - Datasets are cleaned independently; the join waits for all of them.
//!   - The reference instant is a parameter. The pipeline never reads a clock.
//!   - The price table is cleaned but never joined (it has no loan_id).

use crate::{
    amortization::add_amortized_balance,
    classifier::add_loan_status,
    config::PipelineConfig,
    dates::{coerce_date, DateNormalizer},
    dedup::Deduplicator,
    error::PipelineResult,
    io,
    join::{ensure_unique_keys, join_chain},
    normalize::TypeNormalizer,
    report::{DatasetReport, RunReport, StageRecord},
    resolver::MissingValueResolver,
    schema::{Dataset, LOAN_ID},
    stage::TableStage,
    store::TableStore,
    table::{FieldKind, RawTable, Table},
    types::RunId,
};
use chrono::{NaiveDate, NaiveDateTime};

/// The six raw tables as delivered by a loader.
#[derive(Debug, Clone)]
pub struct RawInputs {
    pub loan_balances: RawTable,
    pub loan_bids:     RawTable,
    pub loan_data:     RawTable,
    pub loan_status:   RawTable,
    pub target_profit: RawTable,
    pub umbs_prices:   RawTable,
}

impl RawInputs {
    /// Read every dataset from its CSV file under the configured data dir.
    pub fn from_csv(config: &PipelineConfig) -> PipelineResult<Self> {
        let read = |d: Dataset| io::read_raw_csv(config.input_path(d), d.name());
        Ok(Self {
            loan_balances: read(Dataset::LoanBalances)?,
            loan_bids:     read(Dataset::LoanBids)?,
            loan_data:     read(Dataset::LoanData)?,
            loan_status:   read(Dataset::LoanStatus)?,
            target_profit: read(Dataset::TargetProfit)?,
            umbs_prices:   read(Dataset::UmbsPrices)?,
        })
    }

    /// Read every dataset from a SQL table named after the dataset.
    pub fn from_store(store: &TableStore) -> PipelineResult<Self> {
        let read = |d: Dataset| store.load_raw(d.name());
        Ok(Self {
            loan_balances: read(Dataset::LoanBalances)?,
            loan_bids:     read(Dataset::LoanBids)?,
            loan_data:     read(Dataset::LoanData)?,
            loan_status:   read(Dataset::LoanStatus)?,
            target_profit: read(Dataset::TargetProfit)?,
            umbs_prices:   read(Dataset::UmbsPrices)?,
        })
    }

    pub fn get(&self, dataset: Dataset) -> &RawTable {
        match dataset {
            Dataset::LoanBalances => &self.loan_balances,
            Dataset::LoanBids     => &self.loan_bids,
            Dataset::LoanData     => &self.loan_data,
            Dataset::LoanStatus   => &self.loan_status,
            Dataset::TargetProfit => &self.target_profit,
            Dataset::UmbsPrices   => &self.umbs_prices,
        }
    }

    /// Write each dataset as CSV under the configured data dir.
    pub fn write_csv(&self, config: &PipelineConfig) -> PipelineResult<()> {
        for d in Dataset::ALL {
            io::write_raw_csv(config.input_path(d), self.get(d))?;
        }
        Ok(())
    }
}

/// The six cleaned tables. Balances here carry no derived columns.
#[derive(Debug, Clone)]
pub struct CleanedTables {
    pub loan_balances: Table,
    pub loan_bids:     Table,
    pub loan_data:     Table,
    pub loan_status:   Table,
    pub target_profit: Table,
    pub umbs_prices:   Table,
}

impl CleanedTables {
    pub fn get(&self, dataset: Dataset) -> &Table {
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

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub balances_with_status:       Table,
    pub balances_with_amortization: Table,
    pub merged:                     Table,
    pub cleaned:                    CleanedTables,
    pub report:                     RunReport,
}

pub struct Pipeline {
    run_id:                   RunId,
    sentinel:                 NaiveDate,
    enforce_unique_join_keys: bool,
}

impl Pipeline {
    pub fn new(run_id: RunId, config: &PipelineConfig) -> Self {
        Self {
            run_id,
            sentinel: config.sentinel_date,
            enforce_unique_join_keys: config.enforce_unique_join_keys,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Stages applied after type normalization, in execution order.
    pub fn stages_for(&self, dataset: Dataset) -> Vec<Box<dyn TableStage>> {
        let schema = dataset.schema();
        let mut stages: Vec<Box<dyn TableStage>> = Vec::new();
        if dataset == Dataset::LoanStatus {
            stages.push(Box::new(DateCoercion));
        }
        stages.push(Box::new(MissingValueResolver::new(schema, self.sentinel)));
        stages.push(Box::new(Deduplicator::new()));
        if dataset == Dataset::LoanStatus {
            stages.push(Box::new(DateNormalizer::new(self.sentinel)));
        }
        stages
    }

    /// Clean one dataset end to end.
    pub fn clean(&self, dataset: Dataset, raw: RawTable) -> PipelineResult<(Table, DatasetReport)> {
        let mut report = DatasetReport::new(dataset);
        let (mut table, record) = TypeNormalizer::new(dataset.schema()).apply(raw)?;
        report.stages.push(record);

        for stage in self.stages_for(dataset) {
            let (next, record) = stage.apply(table)?;
            log::debug!(
                "run={} {}: {} {} -> {} rows",
                self.run_id,
                dataset.name(),
                stage.name(),
                record.rows_in,
                record.rows_out
            );
            report.stages.push(record);
            table = next;
        }

        log::info!(
            "run={} {}: cleaned, {} rows x {} columns, {} cells filled",
            self.run_id,
            dataset.name(),
            table.len(),
            table.width(),
            report.total_filled()
        );
        Ok((table, report))
    }

    /// Add `loan_status`, then `amortized_balance`, to cleaned balances.
    /// Returns both intermediate tables.
    pub fn enrich(&self, balances: Table, now: NaiveDateTime) -> PipelineResult<(Table, Table)> {
        let with_status = add_loan_status(balances, now)?;
        let with_amortization = add_amortized_balance(with_status.clone())?;
        Ok((with_status, with_amortization))
    }

    /// Left-join the enriched balances with the other loan tables.
    pub fn merge(&self, balances: Table, cleaned: &CleanedTables) -> PipelineResult<Table> {
        let rights = [
            &cleaned.loan_data,
            &cleaned.loan_status,
            &cleaned.target_profit,
            &cleaned.loan_bids,
        ];
        if self.enforce_unique_join_keys {
            for right in rights {
                ensure_unique_keys(right, LOAN_ID)?;
            }
        }
        join_chain(balances, rights, LOAN_ID)
    }

    pub fn run(&self, inputs: RawInputs, now: NaiveDateTime) -> PipelineResult<PipelineOutput> {
        log::info!("run={} starting, reference instant {now}", self.run_id);
        let RawInputs {
            loan_balances,
            loan_bids,
            loan_data,
            loan_status,
            target_profit,
            umbs_prices,
        } = inputs;

        let mut reports = Vec::with_capacity(Dataset::ALL.len());
        let mut clean = |d: Dataset, raw: RawTable| -> PipelineResult<Table> {
            let (table, report) = self.clean(d, raw)?;
            reports.push(report);
            Ok(table)
        };
        let cleaned = CleanedTables {
            loan_balances: clean(Dataset::LoanBalances, loan_balances)?,
            loan_bids:     clean(Dataset::LoanBids, loan_bids)?,
            loan_data:     clean(Dataset::LoanData, loan_data)?,
            loan_status:   clean(Dataset::LoanStatus, loan_status)?,
            target_profit: clean(Dataset::TargetProfit, target_profit)?,
            umbs_prices:   clean(Dataset::UmbsPrices, umbs_prices)?,
        };

        let (balances_with_status, balances_with_amortization) =
            self.enrich(cleaned.loan_balances.clone(), now)?;
        let merged = self.merge(balances_with_amortization.clone(), &cleaned)?;

        let report = RunReport {
            run_id:            self.run_id.clone(),
            reference_instant: now,
            datasets:          reports,
            balances_rows:     balances_with_amortization.len(),
            merged_rows:       merged.len(),
            merged_columns:    merged.width(),
        };
        log::info!(
            "run={} complete: {} balances, merged {} rows x {} columns",
            self.run_id,
            report.balances_rows,
            report.merged_rows,
            report.merged_columns
        );

        Ok(PipelineOutput {
            balances_with_status,
            balances_with_amortization,
            merged,
            cleaned,
            report,
        })
    }
}

/// First Date Normalizer pass: every date column holds a `Date` or
/// Missing, nothing else.
///
/// After the Type Normalizer this changes nothing; it re-asserts the
/// representation so the status log's date columns are guaranteed
/// before the resolver fills them. A text cell that still reads as a
/// date is parsed; anything else is cleared and counted as a coercion
/// failure.
struct DateCoercion;

impl TableStage for DateCoercion {
    fn name(&self) -> &'static str {
        "date_coercion"
    }

    fn apply(&self, table: Table) -> PipelineResult<(Table, StageRecord)> {
        let rows_in = table.len();
        let date_cols: Vec<usize> = table
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == FieldKind::Date)
            .map(|(i, _)| i)
            .collect();
        let mut cleared = 0usize;
        let mut table = table;
        for idx in date_cols {
            table = table.map_column(idx, |v| {
                let present = !v.is_missing();
                let coerced = coerce_date(v);
                if present && coerced.is_missing() {
                    cleared += 1;
                }
                coerced
            });
        }
        if cleared > 0 {
            log::warn!("{}: {cleared} date cells could not be read", table.name());
        }
        let record = StageRecord {
            stage: self.name().to_string(),
            rows_in,
            rows_out: table.len(),
            coercion_failures: cleared,
            ..StageRecord::default()
        };
        Ok((table, record))
    }
}

/// Write the three artifacts and the run report; optionally record the
/// run and every table in SQLite.
pub fn persist(output: &PipelineOutput, config: &PipelineConfig) -> PipelineResult<()> {
    let outputs = &config.outputs;
    io::write_csv(config.output_path(&outputs.balances_with_status), &output.balances_with_status)?;
    io::write_csv(
        config.output_path(&outputs.balances_with_amortization),
        &output.balances_with_amortization,
    )?;
    io::write_csv(config.output_path(&outputs.merged), &output.merged)?;

    io::write_report(config.output_path(&outputs.report), &output.report)?;

    if let Some(db) = &config.database {
        let store = TableStore::open(db)?;
        store.migrate()?;
        let run_id = &output.report.run_id;
        store.insert_run(run_id, output.report.reference_instant, env!("CARGO_PKG_VERSION"))?;
        for d in Dataset::ALL {
            store.save_table(run_id, &format!("clean_{}", d.name()), output.cleaned.get(d))?;
        }
        store.save_table(run_id, "balances_with_status", &output.balances_with_status)?;
        store.save_table(run_id, "balances_with_amortization", &output.balances_with_amortization)?;
        store.save_table(run_id, "merged", &output.merged)?;
        store.complete_run(run_id, output.report.balances_rows, output.report.merged_rows)?;
    }
    Ok(())
}
