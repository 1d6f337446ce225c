use std::path::Path;

use models::{RunDiagnostics, SecurityTransferRecord};
use tracing::{debug, info};
use utils::cell::CellValue;
use utils::dates::{format_compact_date, is_compact_date, round4};
use utils::error::{ParseError, Result};
use utils::grouping::{group_trades, GroupKey, TradeRow};
use utils::sheet::{data_region, find_header_row, load_grid, Grid};

pub const PARSER_NAME: &str = "csb";

/// Cover-page cell that anchors the statement region.
pub const STATEMENT_MARKER: &str = "对账单";
/// Cell content identifying the column-header row.
pub const HEADER_MARKER: &str = "发生日期";
/// Summary keyword separating securities movements from cash entries.
pub const SECURITIES_MARKER: &str = "证券";

/// Statements put the header at most a few rows under the cover line.
const HEADER_SEARCH_WINDOW: usize = 10;

// Fixed column layout of the statement region.
const COL_DATE: usize = 0;
const COL_SUMMARY: usize = 1;
const COL_SECURITY_CODE: usize = 3;
const COL_SECURITY_NAME: usize = 4;
const COL_QUANTITY: usize = 5;
const COL_PRICE: usize = 7;
const COL_AMOUNT: usize = 8;

/// Parser for CSB securities account statements (xlsx workbooks).
///
/// Locates the statement region by cover marker + header marker, filters
/// to securities movements, then groups fills per
/// (date, summary, code, name) with a quantity-weighted average price.
pub struct CsbStatementParser {
    pub sheet_index: Option<usize>,
}

impl CsbStatementParser {
    pub fn new() -> Self {
        Self { sheet_index: None }
    }

    pub fn with_sheet_index(mut self, sheet_index: usize) -> Self {
        self.sheet_index = Some(sheet_index);
        self
    }

    pub fn parse_file(&self, path: &Path) -> Result<CsbParseResult> {
        let grid = load_grid(path, self.sheet_index)?;
        info!(path = %path.display(), rows = grid.len(), "parsing CSB statement");
        self.process_grid(&grid)
    }

    /// Core extraction over an already-loaded worksheet grid.
    pub fn process_grid(&self, grid: &Grid) -> Result<CsbParseResult> {
        let marker_row = grid
            .iter()
            .position(|row| {
                row.first()
                    .is_some_and(|cell| cell.text().contains(STATEMENT_MARKER))
            })
            .ok_or_else(|| {
                ParseError::InvalidFormat(format!(
                    "statement marker '{STATEMENT_MARKER}' not found in first column"
                ))
            })?;

        let currency = grid[marker_row]
            .first()
            .map(|cell| currency_from_title(&cell.text()))
            .unwrap_or("CNY")
            .to_string();

        let header_row =
            find_header_row(grid, HEADER_MARKER, marker_row + 1, HEADER_SEARCH_WINDOW)?;
        debug!(marker_row, header_row, %currency, "located statement region");

        let mut diagnostics = RunDiagnostics::default();
        let mut trades = Vec::new();

        for row in data_region(grid, header_row) {
            let date = cell_text(row, COL_DATE);
            if date.is_empty() {
                diagnostics.missing_date += 1;
                continue;
            }
            if !is_compact_date(&date) {
                diagnostics.invalid_date += 1;
                continue;
            }

            let summary = cell_text(row, COL_SUMMARY);
            if !summary.contains(SECURITIES_MARKER) {
                diagnostics.non_security_rows += 1;
                continue;
            }

            let security_code = cell_text(row, COL_SECURITY_CODE);
            if security_code.is_empty() {
                diagnostics.missing_security_code += 1;
                continue;
            }

            trades.push(TradeRow {
                key: GroupKey {
                    transaction_date: date,
                    summary,
                    security_code,
                    security_name: cell_text(row, COL_SECURITY_NAME),
                },
                amount: cell_number(row, COL_AMOUNT),
                quantity: cell_number(row, COL_QUANTITY),
                price: cell_number(row, COL_PRICE),
            });
        }

        let grouped = group_trades(trades, &mut diagnostics);
        let records = grouped
            .into_iter()
            .map(|g| {
                let transaction_date = format_compact_date(&g.key.transaction_date);
                SecurityTransferRecord {
                    settlement_date: transaction_date.clone(),
                    transaction_date,
                    currency: currency.clone(),
                    amount: g.amount,
                    nature: g.key.summary.clone(),
                    security_code: g.key.security_code,
                    security_name: g.key.security_name,
                    quantity: g.quantity.round() as i64,
                    market_price: round4(g.price),
                    description: String::new(),
                }
            })
            .collect::<Vec<_>>();

        info!(
            records = records.len(),
            dropped = diagnostics.dropped_total(),
            "CSB statement processed"
        );
        Ok(CsbParseResult {
            records,
            currency,
            diagnostics,
        })
    }
}

impl Default for CsbStatementParser {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct CsbParseResult {
    pub records: Vec<SecurityTransferRecord>,
    pub currency: String,
    pub diagnostics: RunDiagnostics,
}

fn cell_text(row: &[CellValue], col: usize) -> String {
    row.get(col).map(CellValue::text).unwrap_or_default()
}

fn cell_number(row: &[CellValue], col: usize) -> f64 {
    row.get(col).map(CellValue::number_or_zero).unwrap_or(0.0)
}

fn currency_from_title(title: &str) -> &'static str {
    if title.contains("人民币") || title.contains("CNY") {
        "CNY"
    } else if title.contains("港币") || title.contains("HKD") {
        "HKD"
    } else if title.contains("美元") || title.contains("USD") {
        "USD"
    } else {
        "CNY"
    }
}
