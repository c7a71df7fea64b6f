//! Artifacts written to CSV or SQLite read back unchanged.

use chrono::NaiveDate;
use loanprep_core::{
    config::PipelineConfig,
    io::{read_raw_csv, read_table_csv, write_csv},
    pipeline::{persist, Pipeline, RawInputs},
    sample,
    schema::Dataset,
    store::TableStore,
    table::{Column, FieldKind, Table, Value},
    types::new_run_id,
};
use std::path::PathBuf;

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("loanprep-{tag}-{}", new_run_id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn run_sample(run_id: &str) -> loanprep_core::pipeline::PipelineOutput {
    let now = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    Pipeline::new(run_id.into(), &PipelineConfig::default_test())
        .run(sample::generate(200, 21), now)
        .unwrap()
}

#[test]
fn merged_csv_reads_back_identical() {
    let dir = scratch_dir("csv");
    let out = run_sample("csv");
    let path = dir.join("final_merged_dataset.csv");

    write_csv(&path, &out.merged).unwrap();
    assert!(!path.with_extension("tmp").exists());

    let back = read_table_csv(&path, out.merged.name(), out.merged.columns()).unwrap();
    assert_eq!(back, out.merged);

    let raw = read_raw_csv(&path, "merged").unwrap();
    assert_eq!(raw.headers.len(), out.merged.width());
    assert_eq!(raw.len(), out.merged.len());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn timestamps_keep_their_fractional_seconds() {
    let dir = scratch_dir("fraction");
    let day = NaiveDate::from_ymd_opt(2023, 6, 15).unwrap();
    let columns = vec![
        Column::new("loan_id", FieldKind::Key),
        Column::new("file_in_audit", FieldKind::Date),
    ];
    let table = Table::from_rows(
        "loan_status",
        columns.clone(),
        vec![
            vec![Value::text("1"), Value::Date(day.and_hms_milli_opt(13, 45, 0, 500).unwrap())],
            vec![Value::text("2"), Value::Date(day.and_hms_milli_opt(0, 0, 0, 500).unwrap())],
            vec![Value::text("3"), Value::Date(day.and_hms_micro_opt(9, 0, 1, 250).unwrap())],
            vec![Value::text("4"), Value::Date(day.and_hms_opt(0, 0, 0).unwrap())],
        ],
    );
    let path = dir.join("status.csv");
    write_csv(&path, &table).unwrap();
    let back = read_table_csv(&path, "loan_status", &columns).unwrap();
    assert_eq!(back, table);

    let store = TableStore::in_memory().unwrap();
    store.migrate().unwrap();
    store.insert_run("fraction", day.and_hms_opt(0, 0, 0).unwrap(), "test").unwrap();
    store.save_table("fraction", "loan_status", &table).unwrap();
    assert_eq!(store.load_table("loan_status", &columns).unwrap(), table);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn raw_datasets_round_trip_through_csv() {
    let dir = scratch_dir("raw");
    let config = PipelineConfig {
        data_dir: dir.join("data").display().to_string(),
        ..PipelineConfig::default_test()
    };
    let inputs = sample::generate(120, 17);
    inputs.write_csv(&config).unwrap();

    let loaded = RawInputs::from_csv(&config).unwrap();
    for d in Dataset::ALL {
        assert!(!config.input_path(d).with_extension("tmp").exists());
        assert_eq!(loaded.get(d), inputs.get(d), "{} changed on disk", d.name());
    }
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn reading_with_the_wrong_columns_is_schema_drift() {
    let dir = scratch_dir("drift");
    let out = run_sample("drift");
    let path = dir.join("balances.csv");
    write_csv(&path, &out.balances_with_status).unwrap();

    let result = read_table_csv(&path, "balances", out.balances_with_amortization.columns());
    assert!(matches!(
        result,
        Err(loanprep_core::error::PipelineError::SchemaDrift { .. })
    ));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn sqlite_tables_read_back_identical() {
    let store = TableStore::in_memory().unwrap();
    store.migrate().unwrap();
    let out = run_sample("sqlite");
    let now = out.report.reference_instant;

    store.insert_run("sqlite", now, "test").unwrap();
    store.save_table("sqlite", "merged", &out.merged).unwrap();
    assert_eq!(
        store.artifact_row_count("sqlite", "merged").unwrap(),
        Some(out.merged.len())
    );
    assert!(!store.run_completed("sqlite").unwrap());
    store.complete_run("sqlite", out.report.balances_rows, out.report.merged_rows).unwrap();
    assert!(store.run_completed("sqlite").unwrap());

    let back = store.load_table("merged", out.merged.columns()).unwrap();
    assert_eq!(back, out.merged);

    // Saving again replaces the table rather than appending to it.
    store.save_table("sqlite", "merged", &out.merged).unwrap();
    let back = store.load_table("merged", out.merged.columns()).unwrap();
    assert_eq!(back.len(), out.merged.len());
}

#[test]
fn raw_inputs_load_from_database() {
    let store = TableStore::in_memory().unwrap();
    let inputs = sample::generate(200, 4);
    for d in Dataset::ALL {
        store.save_raw(inputs.get(d)).unwrap();
    }
    let loaded = RawInputs::from_store(&store).unwrap();
    for d in Dataset::ALL {
        assert_eq!(loaded.get(d), inputs.get(d), "{} changed in the store", d.name());
    }

    let now = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let pipeline = Pipeline::new("db".into(), &PipelineConfig::default_test());
    let from_db = pipeline.run(loaded, now).unwrap();
    let from_memory = pipeline.run(inputs, now).unwrap();
    assert_eq!(from_db.merged, from_memory.merged);
}

#[test]
fn persist_writes_every_artifact() {
    let dir = scratch_dir("persist");
    let config = PipelineConfig {
        data_dir: dir.join("data").display().to_string(),
        output_dir: dir.join("out").display().to_string(),
        database: Some(dir.join("pipeline.db").display().to_string()),
        ..PipelineConfig::default_test()
    };

    sample::generate(200, 8).write_csv(&config).unwrap();
    let inputs = RawInputs::from_csv(&config).unwrap();
    let now = config.reference_instant.unwrap();
    let out = Pipeline::new("persist".into(), &config).run(inputs, now).unwrap();
    persist(&out, &config).unwrap();

    let outputs = &config.outputs;
    for file in [
        &outputs.balances_with_status,
        &outputs.balances_with_amortization,
        &outputs.merged,
        &outputs.report,
    ] {
        assert!(config.output_path(file).exists(), "{file} was not written");
    }

    let report = std::fs::read_to_string(config.output_path(&outputs.report)).unwrap();
    let parsed: loanprep_core::report::RunReport = serde_json::from_str(&report).unwrap();
    assert_eq!(parsed, out.report);

    let store = TableStore::open(config.database.as_deref().unwrap()).unwrap();
    assert!(store.run_completed("persist").unwrap());
    assert_eq!(
        store.artifact_row_count("persist", "clean_loan_status").unwrap(),
        Some(out.cleaned.loan_status.len())
    );

    std::fs::remove_dir_all(&dir).ok();
}
