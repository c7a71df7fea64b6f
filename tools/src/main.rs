//! pipeline-runner: headless batch runner for the loan data pipeline.
//!
//! Usage:
//!   pipeline-runner --data-dir ./data --out-dir ./output
//!   pipeline-runner --config pipeline.json --now 2024-06-01
//!   pipeline-runner --generate-sample 500 --seed 42 --data-dir ./sample
//!   pipeline-runner --db loans.db --from-db --json

use anyhow::{Context, Result};
use loanprep_core::{
    classifier::{LoanStatus, LOAN_STATUS},
    config::PipelineConfig,
    dates::parse_date,
    pipeline::{persist, Pipeline, PipelineOutput, RawInputs},
    sample,
    store::TableStore,
    types::new_run_id,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut config = match flag_value(&args, "--config") {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = flag_value(&args, "--data-dir") {
        config.data_dir = dir.to_string();
    }
    if let Some(dir) = flag_value(&args, "--out-dir") {
        config.output_dir = dir.to_string();
    }
    if let Some(db) = flag_value(&args, "--db") {
        config.database = Some(db.to_string());
    }
    if args.iter().any(|a| a == "--allow-duplicate-keys") {
        config.enforce_unique_join_keys = false;
    }

    let now = match flag_value(&args, "--now") {
        Some(raw) => parse_date(raw).with_context(|| format!("--now: cannot read '{raw}' as a date"))?,
        None => config
            .reference_instant
            .unwrap_or_else(|| chrono::Local::now().naive_local()),
    };

    if let Some(rows) = flag_value(&args, "--generate-sample") {
        let rows: u64 = rows.parse().context("--generate-sample expects a row count")?;
        let seed = parse_arg(&args, "--seed", 42u64);
        sample::generate(rows, seed).write_csv(&config)?;
        log::info!("wrote sample datasets ({rows} loans, seed {seed}) to {}", config.data_dir);
    }

    let from_db = args.iter().any(|a| a == "--from-db");
    let inputs = if from_db {
        let db = config
            .database
            .as_deref()
            .context("--from-db requires --db or a database in the config")?;
        RawInputs::from_store(&TableStore::open(db)?)?
    } else {
        RawInputs::from_csv(&config)?
    };

    let json = args.iter().any(|a| a == "--json");
    let run_id = new_run_id();
    if !json {
        println!("loan data pipeline — pipeline-runner");
        println!("  run_id:    {run_id}");
        println!("  data_dir:  {}", if from_db { "(database)" } else { config.data_dir.as_str() });
        println!("  out_dir:   {}", config.output_dir);
        println!("  now:       {now}");
        println!();
    }

    let pipeline = Pipeline::new(run_id, &config);
    let output = pipeline.run(inputs, now)?;
    persist(&output, &config)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&output.report)?);
    } else {
        print_summary(&output);
    }
    Ok(())
}

fn print_summary(output: &PipelineOutput) {
    let report = &output.report;
    println!("=== CLEANING ===");
    for ds in &report.datasets {
        let rows_in = ds.stages.first().map(|s| s.rows_in).unwrap_or_default();
        let failures: usize = ds.stages.iter().map(|s| s.coercion_failures).sum();
        let dupes: usize = ds.stages.iter().map(|s| s.duplicates_removed).sum();
        println!(
            "  {:<14} {:>6} -> {:>6} rows | filled {:>5} | coercion failures {:>4} | duplicates {:>4}",
            ds.dataset.name(),
            rows_in,
            ds.rows_out().unwrap_or_default(),
            ds.total_filled(),
            failures,
            dupes
        );
    }

    println!();
    println!("=== LOAN STATUS ===");
    let table = &output.balances_with_status;
    for status in [LoanStatus::Active, LoanStatus::Delinquent, LoanStatus::Closed] {
        let count = table
            .column_index(LOAN_STATUS)
            .map(|idx| {
                table
                    .column_values(idx)
                    .filter(|v| v.as_text() == Some(status.as_str()))
                    .count()
            })
            .unwrap_or_default();
        println!("  {:<11} {count}", status.as_str());
    }

    println!();
    println!("=== MERGED ===");
    println!("  rows:     {}", report.merged_rows);
    println!("  columns:  {}", report.merged_columns);
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
