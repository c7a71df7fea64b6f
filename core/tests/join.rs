use chrono::NaiveDate;
use loanprep_core::{
    config::PipelineConfig,
    error::PipelineError,
    join::{ensure_unique_keys, join_chain, left_join},
    pipeline::Pipeline,
    sample,
    schema::LOAN_ID,
    table::{Column, FieldKind, Table, Value},
};

fn id(s: &str) -> Value {
    Value::text(s)
}

fn balances() -> Table {
    Table::from_rows(
        "loan_balances",
        vec![
            Column::new(LOAN_ID, FieldKind::Key),
            Column::new("current_balance", FieldKind::Numeric),
            Column::new("aus_type", FieldKind::Categorical),
        ],
        vec![
            vec![id("1"), Value::Number(100.0), Value::text("DU")],
            vec![id("2"), Value::Number(200.0), Value::text("LP")],
            vec![id("3"), Value::Number(300.0), Value::text("DU")],
        ],
    )
}

fn bids(rows: Vec<Vec<Value>>) -> Table {
    Table::from_rows(
        "loan_bids",
        vec![
            Column::new(LOAN_ID, FieldKind::Key),
            Column::new("bid_price", FieldKind::Numeric),
        ],
        rows,
    )
}

#[test]
fn unmatched_rows_are_kept_with_missing_right_side() {
    let right = bids(vec![
        vec![id("3"), Value::Number(101.0)],
        vec![id("1"), Value::Number(99.5)],
        vec![id("9"), Value::Number(100.0)],
    ]);
    let joined = left_join(balances(), &right, LOAN_ID).unwrap();

    assert_eq!(joined.len(), 3);
    assert_eq!(joined.column_names(), vec![LOAN_ID, "current_balance", "aus_type", "bid_price"]);
    assert_eq!(joined.value(0, "bid_price"), Some(&Value::Number(99.5)));
    assert_eq!(joined.value(1, "bid_price"), Some(&Value::Missing));
    assert_eq!(joined.value(2, "bid_price"), Some(&Value::Number(101.0)));
    // Left order is preserved; the unmatched right row never appears.
    let ids: Vec<_> = joined.column_values(0).cloned().collect();
    assert_eq!(ids, vec![id("1"), id("2"), id("3")]);
}

#[test]
fn duplicate_right_keys_fan_out() {
    let right = bids(vec![
        vec![id("2"), Value::Number(101.0)],
        vec![id("2"), Value::Number(102.0)],
    ]);
    let joined = left_join(balances(), &right, LOAN_ID).unwrap();
    assert_eq!(joined.len(), 4);
    assert_eq!(joined.value(1, "bid_price"), Some(&Value::Number(101.0)));
    assert_eq!(joined.value(2, "bid_price"), Some(&Value::Number(102.0)));
    assert_eq!(joined.value(2, LOAN_ID), Some(&id("2")));

    match ensure_unique_keys(&right, LOAN_ID) {
        Err(PipelineError::JoinKeyCollision { key, count, .. }) => {
            assert_eq!(key, "2");
            assert_eq!(count, 2);
        }
        other => panic!("expected JoinKeyCollision, got {other:?}"),
    }
}

#[test]
fn overlapping_columns_get_suffixes() {
    let right = Table::from_rows(
        "target_profit",
        vec![
            Column::new(LOAN_ID, FieldKind::Key),
            Column::new("aus_type", FieldKind::Categorical),
        ],
        vec![vec![id("1"), Value::text("LP")]],
    );
    let joined = left_join(balances(), &right, LOAN_ID).unwrap();
    assert_eq!(
        joined.column_names(),
        vec![LOAN_ID, "current_balance", "aus_type_x", "aus_type_y"]
    );
    assert_eq!(joined.value(0, "aus_type_x"), Some(&Value::text("DU")));
    assert_eq!(joined.value(0, "aus_type_y"), Some(&Value::text("LP")));
    assert_eq!(joined.value(1, "aus_type_y"), Some(&Value::Missing));
}

#[test]
fn join_requires_the_key_on_both_sides() {
    let right = Table::from_rows(
        "umbs_prices",
        vec![Column::new("umbs_code", FieldKind::Key)],
        vec![vec![id("UMBS30-5.0")]],
    );
    assert!(matches!(
        left_join(balances(), &right, LOAN_ID),
        Err(PipelineError::UnknownColumn { .. })
    ));
}

#[test]
fn chain_with_no_right_tables_is_identity() {
    let joined = join_chain(balances(), Vec::<&Table>::new(), LOAN_ID).unwrap();
    assert_eq!(joined, balances());
}

#[test]
fn merged_row_count_matches_balances() {
    let now = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let pipeline = Pipeline::new("join-test".into(), &PipelineConfig::default_test());
    let out = pipeline.run(sample::generate(250, 9), now).unwrap();

    assert_eq!(out.merged.len(), out.balances_with_amortization.len());
    assert_eq!(out.report.merged_rows, out.merged.len());
    let names = out.merged.column_names();
    for expected in [
        "total_loan_costs_x",
        "total_loan_costs_y",
        "recurring_monthly_debt_x",
        "recurring_monthly_debt_y",
        "aus_type_x",
        "aus_type_y",
    ] {
        assert!(names.contains(&expected), "merged table lacks {expected}");
    }
    assert!(!names.contains(&"total_loan_costs"));
    // The price table is never joined.
    assert!(!names.contains(&"coupon"));
}

#[test]
fn duplicate_keys_are_rejected_unless_allowed() {
    let mut inputs = sample::generate(250, 9);
    // Same key, different price: survives deduplication.
    let mut dup = inputs.loan_bids.rows[0].clone();
    dup[1] = Value::text("250.00");
    inputs.loan_bids.push_row(dup);
    let now = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();

    let strict = Pipeline::new("strict".into(), &PipelineConfig::default_test());
    assert!(matches!(
        strict.run(inputs.clone(), now),
        Err(PipelineError::JoinKeyCollision { .. })
    ));

    let config = PipelineConfig {
        enforce_unique_join_keys: false,
        ..PipelineConfig::default_test()
    };
    let out = Pipeline::new("lenient".into(), &config).run(inputs, now).unwrap();
    assert_eq!(out.merged.len(), out.balances_with_amortization.len() + 1);
}

#[test]
fn zero_padded_keys_stay_distinct_loans() {
    let bids = loanprep_core::table::RawTable {
        name:    "loan_bids".into(),
        headers: vec!["loan_id".into(), "bid_price".into(), "bid_spread".into()],
        rows:    vec![
            vec![Value::text("007"), Value::text("101"), Value::text("0.2")],
            vec![Value::text("7.0"), Value::text("99"), Value::text("0.3")],
        ],
    };
    let pipeline = Pipeline::new("keys".into(), &PipelineConfig::default_test());
    let (cleaned, _) = pipeline
        .clean(loanprep_core::schema::Dataset::LoanBids, bids)
        .unwrap();
    ensure_unique_keys(&cleaned, LOAN_ID).unwrap();

    let left = Table::from_rows(
        "loan_balances",
        vec![Column::new(LOAN_ID, FieldKind::Key)],
        vec![vec![id("7")], vec![id("007")]],
    );
    let joined = left_join(left, &cleaned, LOAN_ID).unwrap();
    assert_eq!(joined.len(), 2);
    assert_eq!(joined.value(0, "bid_price"), Some(&Value::Number(99.0)));
    assert_eq!(joined.value(1, "bid_price"), Some(&Value::Number(101.0)));
}
