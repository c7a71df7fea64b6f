//! Amortization Engine — theoretical remaining principal of a
//! fixed-rate, fully amortizing loan.
//!
//!   r = interest_rate / 12 / 100
//!   N = loan_term * 12
//!   n = N - payment_periods_made
//!
//!   r > 0:  P = L * r * (1+r)^N / ((1+r)^N - 1)
//!           A = P * (1 - (1+r)^-n) / r
//!   r = 0:  P = L / N
//!           A = L - P * payment_periods_made
//!
//! No clamping: once payment_periods_made reaches N the result is zero
//! or negative, and callers must accept that.

use crate::{
    error::PipelineResult,
    table::{Column, FieldKind, Table, Value},
};
use serde::{Deserialize, Serialize};

pub const AMORTIZED_BALANCE: &str = "amortized_balance";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub loan_amount:          f64,
    /// Nominal annual rate, in percent.
    pub interest_rate:        f64,
    /// Whole years.
    pub loan_term:            f64,
    pub payment_periods_made: f64,
}

impl LoanTerms {
    pub fn monthly_rate(&self) -> f64 {
        self.interest_rate / 12.0 / 100.0
    }

    pub fn total_payments(&self) -> f64 {
        self.loan_term * 12.0
    }

    pub fn remaining_payments(&self) -> f64 {
        self.total_payments() - self.payment_periods_made
    }

    /// Level monthly payment that retires the loan over its full term.
    pub fn monthly_payment(&self) -> f64 {
        let r = self.monthly_rate();
        let n_total = self.total_payments();
        if r > 0.0 {
            let growth = (1.0 + r).powf(n_total);
            self.loan_amount * r * growth / (growth - 1.0)
        } else {
            self.loan_amount / n_total
        }
    }

    pub fn amortized_balance(&self) -> f64 {
        let r = self.monthly_rate();
        let p = self.monthly_payment();
        if r > 0.0 {
            let n = self.remaining_payments();
            p * (1.0 - (1.0 + r).powf(-n)) / r
        } else {
            self.loan_amount - p * self.payment_periods_made
        }
    }
}

pub fn amortized_balance(
    loan_amount: f64,
    interest_rate: f64,
    loan_term: f64,
    payment_periods_made: f64,
) -> f64 {
    LoanTerms {
        loan_amount,
        interest_rate,
        loan_term,
        payment_periods_made,
    }
    .amortized_balance()
}

/// Append an `amortized_balance` column to a cleaned balances table.
pub fn add_amortized_balance(table: Table) -> PipelineResult<Table> {
    let amount_idx = table.require_column("loan_amount")?;
    let rate_idx = table.require_column("interest_rate")?;
    let term_idx = table.require_column("loan_term")?;
    let paid_idx = table.require_column("payment_periods_made")?;

    let mut over_amortized = 0usize;
    let balances: Vec<Value> = table
        .rows()
        .iter()
        .map(|row| {
            let terms = (
                row[amount_idx].as_f64(),
                row[rate_idx].as_f64(),
                row[term_idx].as_f64(),
                row[paid_idx].as_f64(),
            );
            match terms {
                (Some(loan_amount), Some(interest_rate), Some(loan_term), Some(payment_periods_made)) => {
                    let terms = LoanTerms {
                        loan_amount,
                        interest_rate,
                        loan_term,
                        payment_periods_made,
                    };
                    if terms.remaining_payments() <= 0.0 {
                        over_amortized += 1;
                    }
                    let a = terms.amortized_balance();
                    if a.is_finite() { Value::Number(a) } else { Value::Missing }
                }
                _ => Value::Missing,
            }
        })
        .collect();

    if over_amortized > 0 {
        log::warn!(
            "{}: {over_amortized} loans have made at least their full term of payments",
            table.name()
        );
    }

    Ok(table.with_column(Column::new(AMORTIZED_BALANCE, FieldKind::Numeric), balances))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_when_rate_is_zero() {
        let a = amortized_balance(120_000.0, 0.0, 10.0, 60.0);
        assert!((a - 60_000.0).abs() < 1e-9);
    }

    #[test]
    fn fresh_loan_owes_full_principal() {
        let a = amortized_balance(250_000.0, 5.5, 30.0, 0.0);
        assert!((a - 250_000.0).abs() < 1e-6, "got {a}");
    }

    #[test]
    fn fully_paid_loan_owes_nothing() {
        let a = amortized_balance(250_000.0, 5.5, 30.0, 360.0);
        assert!(a.abs() < 1e-6, "got {a}");
    }

    #[test]
    fn overpaid_loan_goes_negative() {
        assert!(amortized_balance(250_000.0, 5.5, 30.0, 370.0) < 0.0);
        assert!(amortized_balance(120_000.0, 0.0, 10.0, 130.0) < 0.0);
    }
}
