//! Fixed per-dataset schemas.
//!
//! Every dataset has a declared column set, each column with a semantic
//! kind and a missing-value policy. The Type Normalizer checks raw
//! headers against this list; the Missing-Value Resolver reads the
//! policies. Nothing here is discovered at runtime.

use crate::table::{Column, FieldKind};
use serde::{Deserialize, Serialize};

/// The six source datasets.
/// NEVER reorder — report output and sample generation follow this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    LoanBalances,
    LoanBids,
    LoanData,
    LoanStatus,
    TargetProfit,
    UmbsPrices,
}

impl Dataset {
    pub const ALL: [Dataset; 6] = [
        Dataset::LoanBalances,
        Dataset::LoanBids,
        Dataset::LoanData,
        Dataset::LoanStatus,
        Dataset::TargetProfit,
        Dataset::UmbsPrices,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::LoanBalances => "loan_balances",
            Self::LoanBids     => "loan_bids",
            Self::LoanData     => "loan_data",
            Self::LoanStatus   => "loan_status",
            Self::TargetProfit => "target_profit",
            Self::UmbsPrices   => "umbs_prices",
        }
    }

    /// Name of the key column: `umbs_code` for prices, `loan_id` elsewhere.
    pub fn key_column(&self) -> &'static str {
        match self {
            Self::UmbsPrices => UMBS_CODE,
            _ => LOAN_ID,
        }
    }

    pub fn schema(&self) -> DatasetSchema {
        match self {
            Self::LoanBalances => loan_balances_schema(),
            Self::LoanBids     => loan_bids_schema(),
            Self::LoanData     => loan_data_schema(),
            Self::LoanStatus   => loan_status_schema(),
            Self::TargetProfit => target_profit_schema(),
            Self::UmbsPrices   => umbs_prices_schema(),
        }
    }
}

pub const LOAN_ID: &str = "loan_id";
pub const UMBS_CODE: &str = "umbs_code";

/// What to do with a missing value in a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Remove the column outright.
    DropColumn,
    /// Discard any row missing this field.
    DropRow,
    /// Fill with the column median.
    Median,
    /// Fill with the most frequent value, first occurrence wins ties.
    Mode,
    /// Fill with the configured sentinel date.
    Sentinel,
    /// Leave Missing in place; downstream stages decide what it means.
    Keep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name:   &'static str,
    pub kind:   FieldKind,
    pub policy: MissingPolicy,
}

impl FieldSpec {
    const fn new(name: &'static str, kind: FieldKind, policy: MissingPolicy) -> Self {
        Self { name, kind, policy }
    }

    const fn key(name: &'static str) -> Self {
        Self::new(name, FieldKind::Key, MissingPolicy::DropRow)
    }

    const fn numeric(name: &'static str) -> Self {
        Self::new(name, FieldKind::Numeric, MissingPolicy::Median)
    }

    const fn categorical(name: &'static str) -> Self {
        Self::new(name, FieldKind::Categorical, MissingPolicy::Mode)
    }

    const fn dropped(name: &'static str, kind: FieldKind) -> Self {
        Self::new(name, kind, MissingPolicy::DropColumn)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSchema {
    pub dataset: Dataset,
    pub fields:  Vec<FieldSpec>,
}

impl DatasetSchema {
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    /// Typed columns in declaration order, including to-be-dropped ones.
    pub fn columns(&self) -> Vec<Column> {
        self.fields.iter().map(|f| Column::new(f.name, f.kind)).collect()
    }

    /// Columns that survive the drop-column policy.
    pub fn retained_columns(&self) -> Vec<Column> {
        self.fields
            .iter()
            .filter(|f| f.policy != MissingPolicy::DropColumn)
            .map(|f| Column::new(f.name, f.kind))
            .collect()
    }
}

/// Lowercase and replace spaces with underscores.
/// Surrounding whitespace is trimmed first.
pub fn canonical_name(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

// ── Dataset schemas ───────────────────────────────────────────────

fn loan_balances_schema() -> DatasetSchema {
    DatasetSchema {
        dataset: Dataset::LoanBalances,
        fields:  vec![
            FieldSpec::key(LOAN_ID),
            FieldSpec::numeric("current_balance"),
            FieldSpec::new("next_payment_due_date", FieldKind::Date, MissingPolicy::Keep),
            FieldSpec::numeric("loan_amount"),
            FieldSpec::numeric("interest_rate"),
            FieldSpec::numeric("loan_term"),
            FieldSpec::numeric("payment_periods_made"),
        ],
    }
}

fn loan_bids_schema() -> DatasetSchema {
    DatasetSchema {
        dataset: Dataset::LoanBids,
        fields:  vec![
            FieldSpec::key(LOAN_ID),
            FieldSpec::numeric("bid_price"),
            FieldSpec::numeric("bid_spread"),
        ],
    }
}

fn loan_data_schema() -> DatasetSchema {
    DatasetSchema {
        dataset: Dataset::LoanData,
        fields:  vec![
            FieldSpec::key(LOAN_ID),
            FieldSpec::numeric("total_loan_costs"),
            FieldSpec::numeric("recurring_monthly_debt"),
            FieldSpec::numeric("income_thousands"),
            FieldSpec::numeric("median_fico_score"),
            FieldSpec::numeric("target_profit"),
            FieldSpec::categorical("loan_type"),
            FieldSpec::categorical("loan_purpose"),
            FieldSpec::categorical("state_code"),
            FieldSpec::categorical("county"),
            FieldSpec::categorical("derived_loan_product_type"),
            FieldSpec::categorical("derived_dwelling_category"),
            FieldSpec::categorical("occupancy_type"),
            FieldSpec::categorical("manufactured_home"),
            FieldSpec::categorical("credit_score_type"),
            FieldSpec::categorical("aus_type"),
            FieldSpec::categorical(UMBS_CODE),
            FieldSpec::dropped("lender_credits", FieldKind::Numeric),
            FieldSpec::dropped("prepayment_pelty_term", FieldKind::Numeric),
            FieldSpec::dropped("intro_rate_period", FieldKind::Numeric),
        ],
    }
}

fn loan_status_schema() -> DatasetSchema {
    let date = |name| FieldSpec::new(name, FieldKind::Date, MissingPolicy::Sentinel);
    DatasetSchema {
        dataset: Dataset::LoanStatus,
        fields:  vec![
            FieldSpec::key(LOAN_ID),
            date("closing_date"),
            date("file_in_audit"),
            date("file_audit_complete"),
            date("file_sent_to_custodian"),
            date("file_at_custodian"),
        ],
    }
}

fn target_profit_schema() -> DatasetSchema {
    let required_row = |name| FieldSpec::new(name, FieldKind::Numeric, MissingPolicy::DropRow);
    DatasetSchema {
        dataset: Dataset::TargetProfit,
        fields:  vec![
            FieldSpec::key(LOAN_ID),
            required_row("total_loan_costs"),
            required_row("gross_profit"),
            required_row("profit_margin"),
            FieldSpec::numeric("recurring_monthly_debt"),
            FieldSpec::categorical("aus_type"),
            FieldSpec::dropped("lender_credits", FieldKind::Numeric),
            FieldSpec::dropped("prepayment_pelty_term", FieldKind::Numeric),
            FieldSpec::dropped("intro_rate_period", FieldKind::Numeric),
            FieldSpec::dropped("acctual_loan_revenue", FieldKind::Numeric),
            FieldSpec::dropped("actual_profit_margin", FieldKind::Numeric),
        ],
    }
}

fn umbs_prices_schema() -> DatasetSchema {
    DatasetSchema {
        dataset: Dataset::UmbsPrices,
        fields:  vec![
            FieldSpec::key(UMBS_CODE),
            FieldSpec::numeric("coupon"),
            FieldSpec::numeric("price"),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_are_lowercase_snake() {
        assert_eq!(canonical_name("Gross Profit"), "gross_profit");
        assert_eq!(canonical_name(" acctual loan revenue "), "acctual_loan_revenue");
        assert_eq!(canonical_name("loan_id"), "loan_id");
    }

    #[test]
    fn every_schema_declares_its_key_first() {
        for ds in Dataset::ALL {
            let schema = ds.schema();
            assert_eq!(schema.fields[0].name, ds.key_column());
            assert_eq!(schema.fields[0].kind, FieldKind::Key);
        }
    }

    #[test]
    fn loan_data_drops_three_sparse_columns() {
        let retained = Dataset::LoanData.schema().retained_columns();
        let names: Vec<_> = retained.iter().map(|c| c.name.as_str()).collect();
        assert!(!names.contains(&"lender_credits"));
        assert!(!names.contains(&"prepayment_pelty_term"));
        assert!(!names.contains(&"intro_rate_period"));
        assert_eq!(names.len(), 17);
    }
}
