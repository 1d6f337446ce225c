use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use models::{AccountBalanceRecord, MonthlyCashRecord, RunDiagnostics};
use tracing::{debug, info, warn};
use utils::accounts::{match_accounts, AccountDirectory, BalanceRow};
use utils::dates::{parse_signed_amount, parse_statement_date, round2};
use utils::error::{ParseError, Result};
use utils::mapping::{FieldMapping, DROP_FIELD};
use utils::snapshot;
use utils::split::{quoted_fields, split_records, RawTable};

pub const PARSER_NAME: &str = "hsbc";

/// Record sentinel of the daily cash feed and directory filter key.
pub const BANK_NAME: &str = "The Hongkong and Shanghai Banking Corporation Limited";

pub const DAILY_CASH_SNAPSHOT_PREFIX: &str = "hsbc_daily_cash_";
const SNAPSHOT_RETENTION_DAYS: u64 = 7;

/// Quoted-field positions of one feed record, in export order. The bank
/// name itself is the record boundary, not a field.
fn feed_columns() -> Vec<String> {
    [
        "Account Number",
        "Account Name",
        "Account Currency",
        "Statement Date",
        "Value Date",
        "Closing Ledger Balance",
        "Closing Available Balance",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Default feed mapping. Declared order is coalesce priority: the value
/// date wins over the statement date, the ledger balance over the
/// available balance.
pub fn default_field_mapping() -> FieldMapping {
    FieldMapping::from_pairs([
        ("Account Number", "account_number"),
        ("Account Name", DROP_FIELD),
        ("Account Currency", "account_currency"),
        ("Value Date", "account_date"),
        ("Statement Date", "account_date"),
        ("Closing Ledger Balance", "account_balance"),
        ("Closing Available Balance", "account_balance"),
    ])
}

/// Parser for the HSBC daily cash feed.
///
/// The feed is not line-oriented: records run together and are bounded
/// only by the recurring bank-name sentinel. Each record's quoted
/// substrings are its fields.
pub struct HsbcDailyCashParser {
    pub bank_name: String,
    pub encoding_override: Option<String>,
    mapping: FieldMapping,
}

impl HsbcDailyCashParser {
    pub fn new() -> Self {
        Self {
            bank_name: BANK_NAME.to_string(),
            encoding_override: None,
            mapping: default_field_mapping(),
        }
    }

    pub fn with_encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding_override = Some(label.into());
        self
    }

    pub fn with_mapping(mut self, mapping: FieldMapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn parse_file(
        &self,
        path: &Path,
        directory: &dyn AccountDirectory,
    ) -> Result<HsbcDailyCashResult> {
        if !path.exists() {
            return Err(ParseError::FileNotFound(path.to_path_buf()));
        }
        let bytes = fs::read(path)?;
        let text = utils::decode_bytes(&bytes, self.encoding_override.as_deref())?;
        info!(path = %path.display(), bytes = bytes.len(), "parsing HSBC daily cash feed");
        self.process_text(&text, directory)
    }

    /// Core pipeline over the decoded feed text: split on the sentinel,
    /// extract quoted fields, map to canonical columns, aggregate per
    /// (account, currency), then join the account directory.
    pub fn process_text(
        &self,
        text: &str,
        directory: &dyn AccountDirectory,
    ) -> Result<HsbcDailyCashResult> {
        let records = split_records(text, &self.bank_name);
        if records.is_empty() {
            return Err(ParseError::InvalidFormat(format!(
                "no '{}' records found in feed",
                self.bank_name
            )));
        }

        let table = RawTable::from_records(records.iter().map(|r| quoted_fields(r)).collect());
        let headers = feed_columns();
        let mapped = self.mapping.apply(&headers, &table);

        let mut diagnostics = RunDiagnostics::default();
        let mut balances: Vec<(String, String, f64, NaiveDate)> = Vec::new();

        for row in &mapped.rows {
            let account = mapped.cell(row, "account_number").unwrap_or_default();
            let currency = mapped.cell(row, "account_currency").unwrap_or_default();
            let balance = mapped
                .cell(row, "account_balance")
                .and_then(parse_signed_amount);
            let date = mapped
                .cell(row, "account_date")
                .and_then(parse_statement_date);

            match (account.is_empty(), currency.is_empty(), balance, date) {
                (false, false, Some(balance), Some(date)) => {
                    balances.push((account.to_string(), currency.to_string(), balance, date));
                }
                _ => {
                    warn!(account, "malformed feed record, dropping");
                    diagnostics.malformed_records += 1;
                }
            }
        }

        let aggregated = aggregate_balances(balances);
        debug!(rows = aggregated.len(), "aggregated balance rows");

        let refs = directory.query(&self.bank_name)?;
        let records = match_accounts(aggregated, &refs, &mut diagnostics);

        info!(
            records = records.len(),
            dropped = diagnostics.dropped_total(),
            "HSBC daily cash feed processed"
        );
        Ok(HsbcDailyCashResult {
            records,
            diagnostics,
        })
    }
}

impl Default for HsbcDailyCashParser {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct HsbcDailyCashResult {
    pub records: Vec<AccountBalanceRecord>,
    pub diagnostics: RunDiagnostics,
}

/// One balance row per (account number, currency): balances summed, the
/// as-of date is the latest seen. First-seen order.
fn aggregate_balances(rows: Vec<(String, String, f64, NaiveDate)>) -> Vec<BalanceRow> {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut sums: HashMap<(String, String), (f64, NaiveDate)> = HashMap::new();

    for (account, currency, balance, date) in rows {
        let key = (account, currency);
        match sums.entry(key) {
            Entry::Occupied(mut entry) => {
                let (sum, max_date) = entry.get_mut();
                *sum += balance;
                if date > *max_date {
                    *max_date = date;
                }
            }
            Entry::Vacant(entry) => {
                order.push(entry.key().clone());
                entry.insert((balance, date));
            }
        }
    }

    order
        .into_iter()
        .map(|key| {
            let (sum, date) = sums[&key];
            let (account, currency) = key;
            BalanceRow {
                account_number: Some(account),
                currency: Some(currency),
                balance: Some(sum),
                as_of: Some(date),
            }
        })
        .collect()
}

/// Write the joined result set as a timestamped snapshot and prune
/// expired ones in the same directory.
pub fn write_daily_cash_snapshot(
    records: &[AccountBalanceRecord],
    dir: &Path,
) -> Result<PathBuf> {
    let path = snapshot::write_snapshot(dir, DAILY_CASH_SNAPSHOT_PREFIX, records)?;
    snapshot::cleanup_snapshots(dir, DAILY_CASH_SNAPSHOT_PREFIX, SNAPSHOT_RETENTION_DAYS)?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Monthly statement
// ---------------------------------------------------------------------------

/// Parse an HSBC monthly statement CSV into [`MonthlyCashRecord`]s.
///
/// This export is a conventional one-row-per-transaction CSV; the work is
/// column renaming, account number / type splitting and amount cleaning.
pub fn parse_monthly_statement(path: &Path) -> Result<HsbcMonthlyResult> {
    if !path.exists() {
        return Err(ParseError::FileNotFound(path.to_path_buf()));
    }
    let bytes = fs::read(path)?;
    let text = utils::decode_bytes(&bytes, None)?;
    info!(path = %path.display(), "parsing HSBC monthly statement");
    process_monthly_csv(&text)
}

#[derive(Debug)]
pub struct HsbcMonthlyResult {
    pub records: Vec<MonthlyCashRecord>,
    pub diagnostics: RunDiagnostics,
}

pub fn process_monthly_csv(text: &str) -> Result<HsbcMonthlyResult> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ParseError::InvalidFormat(format!("missing CSV headers: {e}")))?
        .clone();

    let idx_account_name = find_optional_col(&headers, "Account name");
    let idx_account_number = find_col(&headers, "Account number (preferred / formatted)")?;
    let idx_country = find_optional_col(&headers, "Country/Territory");
    let idx_value_date = find_col(&headers, "Value date")?;
    let idx_txn_type = find_optional_col(&headers, "Transaction type");
    let idx_currency = find_optional_col(&headers, "Account currency");
    let idx_amount = find_col(&headers, "Transaction amount")?;
    let idx_narrative = find_optional_col(&headers, "Transaction narrative");
    let idx_bank_ref = find_optional_col(&headers, "Bank reference");
    let idx_customer_ref = find_optional_col(&headers, "Customer reference");
    let idx_supplementary = find_optional_col(&headers, "Supplementary detail");

    let mut diagnostics = RunDiagnostics::default();
    let mut records = Vec::new();

    for (row_idx, rec) in reader.records().enumerate() {
        let rec = match rec {
            Ok(rec) => rec,
            Err(e) => {
                warn!(row = row_idx + 2, error = %e, "unreadable CSV row, dropping");
                diagnostics.malformed_records += 1;
                continue;
            }
        };

        let raw_number = rec.get(idx_account_number).unwrap_or("").trim();
        if raw_number.is_empty() {
            diagnostics.malformed_records += 1;
            continue;
        }
        // "123-456789-001/SAV" carries the account type behind the slash
        let (account_number, account_type) = match raw_number.split_once('/') {
            Some((number, kind)) => (number.to_string(), Some(kind.to_string())),
            None => (raw_number.to_string(), None),
        };

        let raw_date = rec.get(idx_value_date).unwrap_or("").trim();
        let Some(value_date) = NaiveDate::parse_from_str(raw_date, "%d/%m/%Y").ok() else {
            diagnostics.invalid_date += 1;
            continue;
        };

        let raw_amount = rec.get(idx_amount).unwrap_or("");
        let Some(amount) = parse_signed_amount(raw_amount) else {
            diagnostics.malformed_records += 1;
            continue;
        };

        records.push(MonthlyCashRecord {
            account_name: get_optional(&rec, idx_account_name),
            account_number,
            account_type,
            country_territory: get_optional(&rec, idx_country),
            value_date: value_date.format("%Y-%m-%d").to_string(),
            transaction_type: get_optional(&rec, idx_txn_type),
            currency: get_optional(&rec, idx_currency),
            amount: round2(amount),
            transaction_description: get_optional(&rec, idx_narrative),
            bank_reference: get_optional(&rec, idx_bank_ref),
            customer_reference: get_optional(&rec, idx_customer_ref),
            supplementary_detail: get_optional(&rec, idx_supplementary),
        });
    }

    info!(
        records = records.len(),
        dropped = diagnostics.dropped_total(),
        "HSBC monthly statement processed"
    );
    Ok(HsbcMonthlyResult {
        records,
        diagnostics,
    })
}

fn find_col(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| ParseError::InvalidFormat(format!("missing required column '{name}'")))
}

fn find_optional_col(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

fn get_optional(rec: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| rec.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::AccountRef;
    use utils::accounts::StaticAccountDirectory;

    fn directory() -> StaticAccountDirectory {
        StaticAccountDirectory::new(vec![
            AccountRef {
                bank_name: BANK_NAME.to_string(),
                short_name: "HSBC".to_string(),
                location: "Hong Kong".to_string(),
                account_number: "111-222333-001".to_string(),
            },
            AccountRef {
                bank_name: BANK_NAME.to_string(),
                short_name: "HSBC".to_string(),
                location: "Hong Kong".to_string(),
                account_number: "111-222333-002".to_string(),
            },
        ])
    }

    fn feed_record(account: &str, currency: &str, date: &str, balance: &str) -> String {
        format!(
            "{BANK_NAME},\"{account}\",\"SOME CO LTD\",\"{currency}\",\"\",\"{date}\",\"{balance}\",\"0.00\"\n"
        )
    }

    #[test]
    fn feed_aggregates_and_joins_per_account_currency() {
        let mut blob = String::new();
        blob.push_str(&feed_record("111-222333-001", "HKD", "20260114", "1,000.00"));
        blob.push_str(&feed_record("111-222333-001", "HKD", "20260115", "234.56"));
        blob.push_str(&feed_record("111-222333-002", "USD", "20260115", "500.00-"));

        let result = HsbcDailyCashParser::new()
            .process_text(&blob, &directory())
            .unwrap();

        assert_eq!(result.records.len(), 2);
        let first = &result.records[0];
        assert_eq!(first.account_number, "111-222333-001");
        assert_eq!(first.account_currency, "HKD");
        assert!((first.account_balance - 1234.56).abs() < 1e-9);
        assert_eq!(
            first.account_date,
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
        );
        assert_eq!(first.bank_short_name, "HSBC");
        assert_eq!(first.bank_location, "Hong Kong");

        let second = &result.records[1];
        assert_eq!(second.account_currency, "USD");
        assert!((second.account_balance + 500.0).abs() < 1e-9);
        assert!(result.diagnostics.is_clean());
    }

    #[test]
    fn statement_date_fills_in_when_value_date_is_blank() {
        // value-date field empty: coalesce falls back to the statement date
        let blob = format!(
            "{BANK_NAME},\"111-222333-001\",\"SOME CO LTD\",\"HKD\",\"20260110\",\"\",\"10.00\",\"\"\n"
        );
        let result = HsbcDailyCashParser::new()
            .process_text(&blob, &directory())
            .unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(
            result.records[0].account_date,
            NaiveDate::from_ymd_opt(2026, 1, 10).unwrap()
        );
    }

    #[test]
    fn unmatched_account_drops_with_count() {
        let mut blob = feed_record("111-222333-001", "HKD", "20260115", "1.00");
        blob.push_str(&feed_record("999-000000-001", "HKD", "20260115", "2.00"));

        let result = HsbcDailyCashParser::new()
            .process_text(&blob, &directory())
            .unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.diagnostics.unmatched_account, 1);
    }

    #[test]
    fn record_without_quoted_fields_is_counted_not_fatal() {
        let mut blob = feed_record("111-222333-001", "HKD", "20260115", "1.00");
        blob.push_str(BANK_NAME);
        blob.push_str(" end of report\n");

        let result = HsbcDailyCashParser::new()
            .process_text(&blob, &directory())
            .unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.diagnostics.malformed_records, 1);
    }

    #[test]
    fn feed_without_sentinel_is_a_format_error() {
        let err = HsbcDailyCashParser::new()
            .process_text("just,some,csv\n", &directory())
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidFormat(_)));
    }

    #[test]
    fn monthly_statement_maps_and_cleans_rows() {
        let csv_text = "\
Account name,Account number (preferred / formatted),Country/Territory,Value date,Transaction type,Account currency,Transaction amount,Transaction narrative,Bank reference,Customer reference,Supplementary detail
ACME LTD,111-222333-001/SAV,Hong Kong SAR,15/01/2026,CR,HKD,\"1,234.56\",INWARD REMITTANCE,BR001,CR001,
ACME LTD,111-222333-001/SAV,Hong Kong SAR,16/01/2026,DR,HKD,500.00-,OUTWARD PAYMENT,BR002,,
ACME LTD,111-222333-001/SAV,Hong Kong SAR,not-a-date,DR,HKD,1.00,BAD ROW,,,
";
        let result = process_monthly_csv(csv_text).unwrap();
        assert_eq!(result.records.len(), 2);

        let first = &result.records[0];
        assert_eq!(first.account_number, "111-222333-001");
        assert_eq!(first.account_type.as_deref(), Some("SAV"));
        assert_eq!(first.value_date, "2026-01-15");
        assert_eq!(first.amount, 1234.56);
        assert_eq!(first.supplementary_detail, None);

        let second = &result.records[1];
        assert_eq!(second.amount, -500.0);
        assert_eq!(result.diagnostics.invalid_date, 1);
    }

    #[test]
    fn monthly_statement_requires_its_columns() {
        let err = process_monthly_csv("a,b,c\n1,2,3\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidFormat(_)));
    }
}
