use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// Canonical record shapes produced by the statement parsers. Every record
// here is fully populated when emitted; rows that cannot be completed are
// dropped upstream and counted in `RunDiagnostics`.

/// One grouped securities movement from a broker statement.
///
/// Dates are ISO-8601 strings (`YYYY-MM-DD`). `settlement_date` equals
/// `transaction_date` unless the statement supplies a separate one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityTransferRecord {
    pub transaction_date: String,
    pub settlement_date: String,
    pub currency: String,
    pub amount: f64,
    pub nature: String,
    pub security_code: String,
    pub security_name: String,
    pub quantity: i64,
    pub market_price: f64,
    #[serde(default)]
    pub description: String,
}

/// One (account, currency) balance line from a daily cash feed, enriched
/// with bank metadata from the account directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountBalanceRecord {
    pub account_number: String,
    pub account_currency: String,
    pub account_balance: f64,
    pub account_date: NaiveDate,
    pub bank_short_name: String,
    pub bank_location: String,
}

/// One transaction from a monthly multi-account statement, with the
/// surrounding account header block and per-account summary merged in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyTransactionRecord {
    pub bank_name: Option<String>,
    pub customer_number: Option<String>,
    pub customer_name: Option<String>,
    pub branch_number: Option<String>,
    pub branch_name: Option<String>,
    pub account_number: String,
    pub account_name: Option<String>,
    pub account_currency: Option<String>,
    pub account_type: Option<String>,
    pub entry_date: Option<String>,
    pub product_type: Option<String>,
    pub transaction_description: Option<String>,
    pub value_date: Option<String>,
    pub bank_reference: Option<String>,
    pub customer_reference: Option<String>,
    pub confirmation_reference: Option<String>,
    pub beneficiary: Option<String>,
    pub amount: f64,
    pub currency: Option<String>,
    pub credit_count: Option<i64>,
    pub total_credit_amount: Option<f64>,
    pub credit_currency: Option<String>,
    pub debit_count: Option<i64>,
    pub total_debit_amount: Option<f64>,
    pub debit_currency: Option<String>,
    pub cheque_count: Option<i64>,
    pub cheque_amount: Option<f64>,
    pub cheque_currency: Option<String>,
    pub net_amount: Option<f64>,
    pub net_currency: Option<String>,
}

/// One transaction from a single-account monthly cash statement export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyCashRecord {
    pub account_name: Option<String>,
    pub account_number: String,
    pub account_type: Option<String>,
    pub country_territory: Option<String>,
    pub value_date: String,
    pub transaction_type: Option<String>,
    pub currency: Option<String>,
    pub amount: f64,
    pub transaction_description: Option<String>,
    pub bank_reference: Option<String>,
    pub customer_reference: Option<String>,
    pub supplementary_detail: Option<String>,
}

/// One account line from a daily balance summary report.
///
/// `closing_ledger_balance` stays `None` when the source value cannot be
/// parsed as a number; the record itself is still emitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyBalanceRecord {
    pub customer_name: Option<String>,
    pub account_number: String,
    pub account_name: Option<String>,
    pub currency: Option<String>,
    pub statement_date: Option<String>,
    pub closing_ledger_balance: Option<f64>,
}

/// One row of the external account directory, keyed by account number and
/// already filtered to a single bank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountRef {
    pub bank_name: String,
    pub short_name: String,
    pub location: String,
    pub account_number: String,
}

/// Per-run counters for rows excluded during parsing.
///
/// Row-level problems never abort a run; they are accumulated here and
/// returned to the caller next to the partial result set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunDiagnostics {
    /// Rows with an empty transaction-date cell.
    pub missing_date: usize,
    /// Rows whose date is not an 8-digit compact date (or expected format).
    pub invalid_date: usize,
    /// Rows whose summary did not classify as a securities movement.
    pub non_security_rows: usize,
    /// Rows with an empty security-code cell.
    pub missing_security_code: usize,
    /// Groups skipped because their total quantity summed to zero.
    pub zero_quantity_groups: usize,
    /// Records or blocks that did not match the expected structure.
    pub malformed_records: usize,
    /// Rows whose account number had no match in the account directory.
    pub unmatched_account: usize,
    /// Joined rows dropped because a field was still unresolved.
    pub incomplete_after_join: usize,
}

impl RunDiagnostics {
    /// Total number of rows excluded from the run.
    pub fn dropped_total(&self) -> usize {
        self.missing_date
            + self.invalid_date
            + self.non_security_rows
            + self.missing_security_code
            + self.zero_quantity_groups
            + self.malformed_records
            + self.unmatched_account
            + self.incomplete_after_join
    }

    pub fn is_clean(&self) -> bool {
        self.dropped_total() == 0
    }
}
