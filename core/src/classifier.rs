//! Loan Status Classifier.
//!
//! RULE: The reference instant is always passed in. Nothing in this
//! module reads the system clock.

use crate::{
    error::PipelineResult,
    table::{Column, FieldKind, Table, Value},
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const LOAN_STATUS: &str = "loan_status";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanStatus {
    Active,
    Closed,
    Delinquent,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active     => "Active",
            Self::Closed     => "Closed",
            Self::Delinquent => "Delinquent",
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify one loan. Evaluated in order:
///   1. zero balance                              -> Closed
///   2. due date before `now` and balance > 0     -> Delinquent
///   3. otherwise                                 -> Active
pub fn classify(current_balance: f64, next_payment_due: NaiveDateTime, now: NaiveDateTime) -> LoanStatus {
    if current_balance == 0.0 {
        LoanStatus::Closed
    } else if next_payment_due < now && current_balance > 0.0 {
        LoanStatus::Delinquent
    } else {
        LoanStatus::Active
    }
}

/// Append a `loan_status` column to a cleaned balances table.
pub fn add_loan_status(table: Table, now: NaiveDateTime) -> PipelineResult<Table> {
    let bal_idx = table.require_column("current_balance")?;
    let due_idx = table.require_column("next_payment_due_date")?;

    let mut negative = 0usize;
    let statuses: Vec<Value> = table
        .rows()
        .iter()
        .map(|row| {
            let balance = row[bal_idx].as_f64().unwrap_or(f64::NAN);
            if balance < 0.0 {
                negative += 1;
            }
            // A row without a due date cannot be overdue.
            let status = match row[due_idx].as_date() {
                Some(due) => classify(balance, due, now),
                None if balance == 0.0 => LoanStatus::Closed,
                None => LoanStatus::Active,
            };
            Value::text(status.as_str())
        })
        .collect();

    if negative > 0 {
        log::warn!(
            "{}: {negative} loans carry a negative balance and were classified Active",
            table.name()
        );
    }

    Ok(table.with_column(Column::new(LOAN_STATUS, FieldKind::Categorical), statuses))
}
