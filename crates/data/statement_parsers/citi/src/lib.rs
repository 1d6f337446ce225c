use std::fs;
use std::path::Path;

use models::{DailyBalanceRecord, MonthlyTransactionRecord, RunDiagnostics};
use tracing::{debug, info, warn};
use utils::cell::CellValue;
use utils::dates::{parse_signed_amount, round2};
use utils::error::{ParseError, Result};
use utils::sheet::load_grid;
use utils::split::{quoted_fields, split_records};

pub const PARSER_NAME: &str = "citi";

/// Sentinel beginning every account block of the monthly report.
pub const BLOCK_SENTINEL: &str = "Bank Name,";
/// Trailer line ending the useful part of a block.
pub const BLOCK_TRAILER: &str = "Cross-currency calculations are at indicative rates";

/// Account number fallback the report uses when a block omits it.
const UNKNOWN_ACCOUNT: &str = "未知账号";

// ---------------------------------------------------------------------------
// Monthly statement: per-account blocks scanned by a line state machine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct CitiMonthlyResult {
    pub records: Vec<MonthlyTransactionRecord>,
    pub diagnostics: RunDiagnostics,
}

/// Parse a Citibank monthly transaction report (`.csv`, `.xls`/`.xlsx`).
///
/// Workbook inputs are rendered to CSV text first; both shapes then run
/// through the same block pipeline.
pub fn parse_monthly_statement(path: &Path) -> Result<CitiMonthlyResult> {
    if !path.exists() {
        return Err(ParseError::FileNotFound(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let content = match ext.as_str() {
        "csv" => {
            let bytes = fs::read(path)?;
            utils::decode_bytes(&bytes, None)?
        }
        "xls" | "xlsx" => {
            let grid = load_grid(path, None)?;
            grid_to_csv_text(&grid)?
        }
        other => {
            return Err(ParseError::InvalidFormat(format!(
                "unsupported statement extension '{other}'"
            )))
        }
    };

    info!(path = %path.display(), "parsing Citi monthly statement");
    process_monthly_text(&content)
}

pub fn process_monthly_text(content: &str) -> Result<CitiMonthlyResult> {
    let blocks = split_records(content, BLOCK_SENTINEL);
    if blocks.is_empty() {
        return Err(ParseError::InvalidFormat(format!(
            "no '{BLOCK_SENTINEL}' account blocks found"
        )));
    }
    debug!(blocks = blocks.len(), "split statement into account blocks");

    let mut diagnostics = RunDiagnostics::default();
    let mut records = Vec::new();

    for block in &blocks {
        let useful = block
            .split(BLOCK_TRAILER)
            .next()
            .unwrap_or_default()
            .trim();
        match scan_block(useful) {
            Some(scanned) if !scanned.transactions.is_empty() => {
                records.extend(merge_block(scanned));
            }
            _ => {
                warn!("account block without transactions, skipping");
                diagnostics.malformed_records += 1;
            }
        }
    }

    info!(
        records = records.len(),
        dropped = diagnostics.dropped_total(),
        "Citi monthly statement processed"
    );
    Ok(CitiMonthlyResult {
        records,
        diagnostics,
    })
}

#[derive(Debug, Default)]
struct AccountMeta {
    bank_name: Option<String>,
    customer_number: Option<String>,
    customer_name: Option<String>,
    branch_number: Option<String>,
    branch_name: Option<String>,
    account_number: Option<String>,
    account_name: Option<String>,
    account_currency: Option<String>,
    account_type: Option<String>,
}

#[derive(Debug)]
struct RawTransaction {
    entry_date: Option<String>,
    product_type: Option<String>,
    description: Option<String>,
    value_date: Option<String>,
    bank_reference: Option<String>,
    customer_reference: Option<String>,
    confirmation_reference: Option<String>,
    beneficiary: Option<String>,
    amount: f64,
    currency: Option<String>,
}

#[derive(Debug, Default)]
struct BlockSummary {
    credit_count: Option<i64>,
    total_credit_amount: Option<f64>,
    credit_currency: Option<String>,
    debit_count: Option<i64>,
    total_debit_amount: Option<f64>,
    debit_currency: Option<String>,
    cheque_count: Option<i64>,
    cheque_amount: Option<f64>,
    cheque_currency: Option<String>,
    net_amount: Option<f64>,
    net_currency: Option<String>,
}

struct ScannedBlock {
    meta: AccountMeta,
    transactions: Vec<RawTransaction>,
    summary: BlockSummary,
}

/// The block scanner's explicit states. Transitions fire on line-content
/// sentinels, so a malformed block simply never reaches the later states
/// and falls out with no transactions.
#[derive(Debug, Clone, Copy, PartialEq)]
enum BlockState {
    AwaitingHeader,
    ReadingAccountMeta,
    ReadingTransactions,
    ReadingSummary,
}

/// Single pass over one block's CSV lines.
fn scan_block(block: &str) -> Option<ScannedBlock> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(block.as_bytes());

    let mut state = BlockState::AwaitingHeader;
    let mut meta = AccountMeta::default();
    let mut transactions = Vec::new();
    let mut summary = BlockSummary::default();
    let mut summary_has_cheques = false;

    for line in reader.records() {
        let Ok(line) = line else {
            return None;
        };
        let first = line.get(0).unwrap_or("").trim();

        match state {
            BlockState::AwaitingHeader => {
                if first == "Bank Name" {
                    meta.bank_name = get_field(&line, 1);
                    state = BlockState::ReadingAccountMeta;
                }
            }
            BlockState::ReadingAccountMeta => match first {
                "Customer Number / Name" => {
                    meta.customer_number = get_field(&line, 1);
                    meta.customer_name = get_field(&line, 3);
                }
                "Branch Number / Name" => {
                    meta.branch_number = get_field(&line, 1);
                    meta.branch_name = get_field(&line, 3);
                }
                "Account Number / Name" => {
                    meta.account_number = get_field(&line, 1);
                    meta.account_name = get_field(&line, 3);
                }
                "Account Currency / Type" => {
                    meta.account_currency = get_field(&line, 1);
                    meta.account_type = get_field(&line, 3);
                }
                "Entry Date" => state = BlockState::ReadingTransactions,
                _ => {}
            },
            BlockState::ReadingTransactions => {
                if first == "Credit Count" {
                    summary_has_cheques = line.get(6).map(str::trim) == Some("Cheque Count");
                    state = BlockState::ReadingSummary;
                } else if line.len() >= 10 && !first.is_empty() {
                    transactions.push(RawTransaction {
                        entry_date: get_field(&line, 0),
                        product_type: get_field(&line, 1),
                        description: get_field(&line, 2),
                        value_date: get_field(&line, 3),
                        bank_reference: get_field(&line, 4),
                        customer_reference: get_field(&line, 5),
                        confirmation_reference: get_field(&line, 6),
                        beneficiary: get_field(&line, 7),
                        amount: line
                            .get(8)
                            .and_then(parse_signed_amount)
                            .map(round2)
                            .unwrap_or(0.0),
                        currency: get_field(&line, 9),
                    });
                }
            }
            BlockState::ReadingSummary => {
                if line.len() >= 6 && !first.is_empty() {
                    summary.credit_count = first.parse().ok();
                    summary.total_credit_amount = line.get(1).and_then(parse_signed_amount);
                    summary.credit_currency = get_field(&line, 2);
                    summary.debit_count = line.get(3).and_then(|s| s.trim().parse().ok());
                    summary.total_debit_amount = line.get(4).and_then(parse_signed_amount);
                    summary.debit_currency = get_field(&line, 5);

                    if summary_has_cheques {
                        summary.cheque_count = line.get(6).and_then(|s| s.trim().parse().ok());
                        summary.cheque_amount = line.get(7).and_then(parse_signed_amount);
                        summary.cheque_currency = get_field(&line, 8);
                        summary.net_amount = line.get(9).and_then(parse_signed_amount);
                        summary.net_currency = get_field(&line, 10);
                    } else {
                        summary.net_amount = line.get(6).and_then(parse_signed_amount);
                        summary.net_currency = get_field(&line, 7);
                    }
                    break;
                }
            }
        }
    }

    // A block that never saw its header never left AwaitingHeader.
    if state == BlockState::AwaitingHeader {
        return None;
    }

    Some(ScannedBlock {
        meta,
        transactions,
        summary,
    })
}

/// One output record per transaction, with the block's account meta and
/// summary merged into each.
fn merge_block(block: ScannedBlock) -> Vec<MonthlyTransactionRecord> {
    let meta = block.meta;
    let summary = block.summary;

    block
        .transactions
        .into_iter()
        .map(|txn| MonthlyTransactionRecord {
            bank_name: meta.bank_name.clone(),
            customer_number: meta.customer_number.clone(),
            customer_name: meta.customer_name.clone(),
            branch_number: meta.branch_number.clone(),
            branch_name: meta.branch_name.clone(),
            account_number: meta
                .account_number
                .clone()
                .unwrap_or_else(|| UNKNOWN_ACCOUNT.to_string()),
            account_name: meta.account_name.clone(),
            account_currency: meta.account_currency.clone(),
            account_type: meta.account_type.clone(),
            entry_date: txn.entry_date,
            product_type: txn.product_type,
            transaction_description: txn.description,
            value_date: txn.value_date,
            bank_reference: txn.bank_reference,
            customer_reference: txn.customer_reference,
            confirmation_reference: txn.confirmation_reference,
            beneficiary: txn.beneficiary,
            amount: txn.amount,
            currency: txn.currency,
            credit_count: summary.credit_count,
            total_credit_amount: summary.total_credit_amount,
            credit_currency: summary.credit_currency.clone(),
            debit_count: summary.debit_count,
            total_debit_amount: summary.total_debit_amount,
            debit_currency: summary.debit_currency.clone(),
            cheque_count: summary.cheque_count,
            cheque_amount: summary.cheque_amount,
            cheque_currency: summary.cheque_currency.clone(),
            net_amount: summary.net_amount,
            net_currency: summary.net_currency.clone(),
        })
        .collect()
}

fn get_field(line: &csv::StringRecord, idx: usize) -> Option<String> {
    line.get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Render a worksheet grid to CSV text so workbook exports share the
/// CSV block pipeline.
fn grid_to_csv_text(grid: &[Vec<CellValue>]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for row in grid {
        let cells: Vec<String> = row.iter().map(CellValue::text).collect();
        writer
            .write_record(&cells)
            .map_err(|e| ParseError::InvalidFormat(format!("rendering worksheet: {e}")))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ParseError::InvalidFormat(format!("rendering worksheet: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| ParseError::InvalidFormat(format!("rendering worksheet: {e}")))
}

// ---------------------------------------------------------------------------
// Daily balance summary report: marker walk over a flat field stream
// ---------------------------------------------------------------------------

const CUSTOMER_MARKER: &str = "Customer Number / Name";
const ACCOUNT_MARKER: &str = "Account Number / Name";
const CURRENCY_MARKER: &str = "Account Currency / Type";
const BALANCE_DATE_MARKER: &str = "=";

pub struct CitiDailyBalanceResult {
    pub records: Vec<DailyBalanceRecord>,
    pub diagnostics: RunDiagnostics,
}

/// Parser for the Citibank daily balance summary report.
///
/// The export is one long stream of quoted fields (UTF-16-BE from the
/// bank); records are located by marker fields rather than line breaks.
pub struct CitiDailyBalanceParser {
    pub encoding_override: Option<String>,
}

impl CitiDailyBalanceParser {
    pub fn new() -> Self {
        Self {
            encoding_override: None,
        }
    }

    pub fn with_encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding_override = Some(label.into());
        self
    }

    pub fn parse_file(&self, path: &Path) -> Result<CitiDailyBalanceResult> {
        if !path.exists() {
            return Err(ParseError::FileNotFound(path.to_path_buf()));
        }
        let bytes = fs::read(path)?;
        let text = utils::decode_bytes(&bytes, self.encoding_override.as_deref())?;
        info!(path = %path.display(), "parsing Citi daily balance report");
        Ok(self.process_text(&text))
    }

    /// Walk the field stream. A marker hit that cannot complete a record
    /// (missing currency/balance markers, truncated stream) drops that
    /// candidate with a count; the walk continues from the next field.
    pub fn process_text(&self, text: &str) -> CitiDailyBalanceResult {
        let fields = quoted_fields(text);
        let mut diagnostics = RunDiagnostics::default();
        let mut records = Vec::new();
        let mut current_customer: Option<String> = None;

        let mut i = 0;
        while i < fields.len() {
            let field = fields[i].trim();

            if field == CUSTOMER_MARKER {
                if i + 2 < fields.len() {
                    current_customer = Some(fields[i + 2].trim().to_string());
                }
                i += 1;
                continue;
            }

            if field == ACCOUNT_MARKER {
                match extract_balance_record(&fields, i, current_customer.as_deref()) {
                    Some((record, resume)) => {
                        records.push(record);
                        i = resume;
                    }
                    None => {
                        warn!(index = i, "could not extract balance record, skipping");
                        diagnostics.malformed_records += 1;
                        i += 1;
                    }
                }
                continue;
            }

            i += 1;
        }

        info!(
            records = records.len(),
            dropped = diagnostics.dropped_total(),
            "Citi daily balance report processed"
        );
        CitiDailyBalanceResult {
            records,
            diagnostics,
        }
    }
}

impl Default for CitiDailyBalanceParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract one record anchored at `fields[start] == ACCOUNT_MARKER`.
/// Returns the record and the index to resume the walk from.
fn extract_balance_record(
    fields: &[String],
    start: usize,
    customer: Option<&str>,
) -> Option<(DailyBalanceRecord, usize)> {
    let position_of = |marker: &str, from: usize| -> Option<usize> {
        fields[from..]
            .iter()
            .position(|f| f.trim() == marker)
            .map(|p| from + p)
    };

    let eq_idx = position_of(BALANCE_DATE_MARKER, start + 3)?;
    let balance_idx = eq_idx + 4;
    if balance_idx >= fields.len() {
        return None;
    }
    let currency_idx = position_of(CURRENCY_MARKER, start + 3)? + 1;
    if currency_idx >= fields.len() {
        return None;
    }

    let account_number = fields.get(start + 1)?.trim().to_string();
    if account_number.is_empty() {
        return None;
    }

    let record = DailyBalanceRecord {
        customer_name: customer.map(str::to_string),
        account_number,
        account_name: fields
            .get(start + 2)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        currency: Some(fields[currency_idx].trim().to_string()).filter(|s| !s.is_empty()),
        statement_date: fields
            .get(eq_idx + 1)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        // Unparseable balances stay null; the record itself survives.
        closing_ledger_balance: parse_signed_amount(fields[balance_idx].trim()),
    };
    Some((record, balance_idx))
}
