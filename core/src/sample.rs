//! Synthetic sample datasets.
//!
//! Produces the six raw tables for `rows` loans with the kinds of
//! defects the cleaning stages exist for: blank cells, junk tokens in
//! numeric columns, unreadable dates, sparse columns and exact
//! duplicate rows. Same seed, same tables.

use crate::{
    pipeline::RawInputs,
    rng::{DatasetRng, RngBank},
    schema::Dataset,
    table::{RawTable, Value},
};
use chrono::{Duration, NaiveDate};

const DUPLICATE_RATE: f64 = 0.03;
const UMBS_CODES: &[&str] = &["UMBS30-5.0", "UMBS30-5.5", "UMBS30-6.0", "UMBS15-4.5", "UMBS15-5.0"];
const STATES: &[&str] = &["CA", "TX", "FL", "NY", "WA", "CO"];
const COUNTIES: &[&str] = &["6037", "48201", "12086", "36047", "53033", "8031"];
const AUS_TYPES: &[&str] = &["1", "2", "3", "6"];

fn num(n: f64) -> Value {
    Value::Text(format!("{n:.2}"))
}

fn int(n: u64) -> Value {
    Value::Text(n.to_string())
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default()
}

fn date_after(days: u64) -> Value {
    let d = base_date() + Duration::days(days as i64);
    Value::Text(d.format("%Y-%m-%d").to_string())
}

/// Push `row`, and now and then an exact copy of it.
fn push_with_dupes(table: &mut RawTable, row: Vec<Value>, rng: &mut DatasetRng) {
    if rng.chance(DUPLICATE_RATE) {
        table.push_row(row.clone());
    }
    table.push_row(row);
}

/// Blank out a cell with probability `p`.
fn holey(value: Value, p: f64, rng: &mut DatasetRng) -> Value {
    if rng.chance(p) { Value::Missing } else { value }
}

fn loan_balances(rows: u64, rng: &mut DatasetRng) -> RawTable {
    let mut t = RawTable::new(
        Dataset::LoanBalances.name(),
        headers(&[
            "loan_id",
            "current_balance",
            "next_payment_due_date",
            "loan_amount",
            "interest_rate",
            "loan_term",
            "payment_periods_made",
        ]),
    );
    for id in 1..=rows {
        let term = *rng.pick(&[15u64, 30]);
        let amount = (rng.range(80_000.0, 750_000.0) / 1000.0).round() * 1000.0;
        let paid = rng.next_u64_below(term * 12 + 12);
        let rate = if rng.chance(0.02) { 0.0 } else { (rng.range(2.5, 8.0) * 8.0).round() / 8.0 };
        let balance = if rng.chance(0.1) { 0.0 } else { amount * rng.range(0.2, 1.0) };
        let row = vec![
            int(id),
            num(balance),
            date_after(365 + rng.next_u64_below(365)),
            num(amount),
            num(rate),
            int(term),
            int(paid),
        ];
        push_with_dupes(&mut t, row, rng);
    }
    t
}

fn loan_bids(rows: u64, rng: &mut DatasetRng) -> RawTable {
    let mut t = RawTable::new(
        Dataset::LoanBids.name(),
        headers(&["loan_id", "bid_price", "bid_spread"]),
    );
    for id in 1..=rows {
        if rng.chance(0.05) {
            continue;
        }
        let row = vec![int(id), num(rng.range(97.0, 104.0)), num(rng.range(0.1, 1.5))];
        push_with_dupes(&mut t, row, rng);
    }
    t
}

fn loan_data(rows: u64, rng: &mut DatasetRng) -> RawTable {
    let mut t = RawTable::new(
        Dataset::LoanData.name(),
        headers(&[
            "loan_id",
            "total_loan_costs",
            "recurring_monthly_debt",
            "income_thousands",
            "median_fico_score",
            "target_profit",
            "loan_type",
            "loan_purpose",
            "state_code",
            "county",
            "derived_loan_product_type",
            "derived_dwelling_category",
            "occupancy_type",
            "manufactured_home",
            "credit_score_type",
            "aus_type",
            "umbs_code",
            "lender_credits",
            "prepayment_pelty_term",
            "intro_rate_period",
        ]),
    );
    for id in 1..=rows {
        let costs = if rng.chance(0.03) {
            Value::text("N/A")
        } else {
            holey(num(rng.range(2_000.0, 15_000.0)), 0.08, rng)
        };
        let row = vec![
            int(id),
            costs,
            holey(num(rng.range(200.0, 4_000.0)), 0.06, rng),
            int(40 + rng.next_u64_below(400)),
            int(620 + rng.next_u64_below(200)),
            num(rng.range(1_000.0, 9_000.0)),
            int(1 + rng.next_u64_below(4)),
            int(*rng.pick(&[1u64, 31, 32])),
            Value::text(*rng.pick(STATES)),
            Value::text(*rng.pick(COUNTIES)),
            Value::text(*rng.pick(&["Conventional:First Lien", "FHA:First Lien", "VA:First Lien"])),
            Value::text(*rng.pick(&["Single Family (1-4 Units):Site-Built", "Multifamily:Site-Built"])),
            int(1 + rng.next_u64_below(3)),
            int(2),
            int(1 + rng.next_u64_below(9)),
            holey(Value::text(*rng.pick(AUS_TYPES)), 0.05, rng),
            Value::text(*rng.pick(UMBS_CODES)),
            holey(num(rng.range(0.0, 3_000.0)), 0.9, rng),
            holey(int(36), 0.97, rng),
            holey(int(60), 0.95, rng),
        ];
        push_with_dupes(&mut t, row, rng);
    }
    t
}

fn loan_status(rows: u64, rng: &mut DatasetRng) -> RawTable {
    let mut t = RawTable::new(
        Dataset::LoanStatus.name(),
        headers(&[
            "loan_id",
            "closing_date",
            "file_in_audit",
            "file_audit_complete",
            "file_sent_to_custodian",
            "file_at_custodian",
        ]),
    );
    for id in 1..=rows {
        if rng.chance(0.05) {
            continue;
        }
        let close = rng.next_u64_below(300);
        let mut row = vec![int(id), date_after(close)];
        let mut day = close;
        for _ in 0..4 {
            day += 1 + rng.next_u64_below(10);
            let cell = if rng.chance(0.02) {
                Value::text("pending")
            } else {
                holey(date_after(day), 0.1, rng)
            };
            row.push(cell);
        }
        push_with_dupes(&mut t, row, rng);
    }
    t
}

fn target_profit(rows: u64, rng: &mut DatasetRng) -> RawTable {
    let mut t = RawTable::new(
        Dataset::TargetProfit.name(),
        headers(&[
            "loan_id",
            "total_loan_costs",
            "Gross Profit",
            "Profit Margin",
            "recurring_monthly_debt",
            "aus_type",
            "lender_credits",
            "prepayment_pelty_term",
            "intro_rate_period",
            "acctual loan revenue",
            "actual profit margin",
        ]),
    );
    for id in 1..=rows {
        let gross = rng.range(1_000.0, 12_000.0);
        let row = vec![
            int(id),
            holey(num(rng.range(2_000.0, 15_000.0)), 0.04, rng),
            holey(num(gross), 0.04, rng),
            holey(num(rng.range(0.5, 3.5)), 0.04, rng),
            holey(num(rng.range(200.0, 4_000.0)), 0.06, rng),
            holey(Value::text(*rng.pick(AUS_TYPES)), 0.05, rng),
            holey(num(rng.range(0.0, 3_000.0)), 0.9, rng),
            holey(int(36), 0.97, rng),
            holey(int(60), 0.95, rng),
            holey(num(gross * rng.range(0.8, 1.2)), 0.6, rng),
            holey(num(rng.range(0.5, 3.5)), 0.6, rng),
        ];
        push_with_dupes(&mut t, row, rng);
    }
    t
}

fn umbs_prices(rng: &mut DatasetRng) -> RawTable {
    let mut t = RawTable::new(
        Dataset::UmbsPrices.name(),
        headers(&["umbs_code", "coupon", "price"]),
    );
    for code in UMBS_CODES {
        let coupon: f64 = code
            .rsplit('-')
            .next()
            .and_then(|c| c.parse().ok())
            .unwrap_or_default();
        let row = vec![Value::text(*code), num(coupon), num(rng.range(95.0, 103.0))];
        push_with_dupes(&mut t, row, rng);
    }
    t
}

/// Draw one dataset from its own stream.
fn draw(bank: &RngBank, dataset: Dataset, build: impl FnOnce(&mut DatasetRng) -> RawTable) -> RawTable {
    let mut rng = bank.for_dataset(dataset);
    let table = build(&mut rng);
    log::debug!("sample {}: {} rows", rng.name, table.len());
    table
}

/// Generate all six raw datasets for `rows` loans.
pub fn generate(rows: u64, seed: u64) -> RawInputs {
    let bank = RngBank::new(seed);
    RawInputs {
        loan_balances: draw(&bank, Dataset::LoanBalances, |rng| loan_balances(rows, rng)),
        loan_bids:     draw(&bank, Dataset::LoanBids, |rng| loan_bids(rows, rng)),
        loan_data:     draw(&bank, Dataset::LoanData, |rng| loan_data(rows, rng)),
        loan_status:   draw(&bank, Dataset::LoanStatus, |rng| loan_status(rows, rng)),
        target_profit: draw(&bank, Dataset::TargetProfit, |rng| target_profit(rows, rng)),
        umbs_prices:   draw(&bank, Dataset::UmbsPrices, umbs_prices),
    }
}
