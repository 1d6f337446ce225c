use std::path::Path;

use calamine::{open_workbook, Reader, Xls, Xlsx};
use tracing::debug;

use crate::cell::CellValue;
use crate::error::{ParseError, Result};

/// A worksheet as a plain grid of tagged cells, detached from the
/// workbook reader so extraction logic can be tested on synthetic rows.
pub type Grid = Vec<Vec<CellValue>>;

/// Load one worksheet of an `.xlsx`/`.xls` workbook as a [`Grid`].
///
/// `sheet_index` selects a sheet explicitly; the default is the first
/// sheet. The workbook handle is dropped before returning, on every path.
pub fn load_grid(path: &Path, sheet_index: Option<usize>) -> Result<Grid> {
    if !path.exists() {
        return Err(ParseError::FileNotFound(path.to_path_buf()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let range = match ext.as_str() {
        "xlsx" | "xlsm" => {
            let mut workbook: Xlsx<_> =
                open_workbook(path).map_err(|e: calamine::XlsxError| ParseError::Unreadable {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            let name = sheet_name(workbook.sheet_names().to_vec(), sheet_index)?;
            workbook
                .worksheet_range(&name)
                .map_err(|e| ParseError::Unreadable {
                    path: path.to_path_buf(),
                    reason: format!("sheet '{name}': {e}"),
                })?
        }
        "xls" => {
            let mut workbook: Xls<_> = open_workbook(path).map_err(|e: calamine::XlsError| ParseError::Unreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            let name = sheet_name(workbook.sheet_names().to_vec(), sheet_index)?;
            workbook
                .worksheet_range(&name)
                .map_err(|e| ParseError::Unreadable {
                    path: path.to_path_buf(),
                    reason: format!("sheet '{name}': {e}"),
                })?
        }
        other => {
            return Err(ParseError::InvalidFormat(format!(
                "unsupported workbook extension '{other}'"
            )))
        }
    };

    let grid: Grid = range
        .rows()
        .map(|row| row.iter().map(CellValue::from_data).collect())
        .collect();
    debug!(rows = grid.len(), "loaded worksheet grid");
    Ok(grid)
}

fn sheet_name(names: Vec<String>, sheet_index: Option<usize>) -> Result<String> {
    let idx = sheet_index.unwrap_or(0);
    names
        .get(idx)
        .cloned()
        .ok_or_else(|| ParseError::InvalidFormat(format!("no sheet at index {idx}")))
}

/// Find the column-header row by content match inside a bounded window.
///
/// Scans `window` rows starting at `start`; a row qualifies when any cell's
/// text contains `marker`. Statements only ever put the header within a
/// handful of cover/letterhead rows, so an exhausted window is a format
/// error rather than a cue to scan further and risk matching data rows.
pub fn find_header_row(grid: &Grid, marker: &str, start: usize, window: usize) -> Result<usize> {
    let end = grid.len().min(start + window);
    for (idx, row) in grid.iter().enumerate().take(end).skip(start) {
        if row.iter().any(|cell| cell.text().contains(marker)) {
            return Ok(idx);
        }
    }
    Err(ParseError::InvalidFormat(format!(
        "header marker '{marker}' not found in rows {start}..{end}"
    )))
}

/// Rows below the header until the first fully-blank row or sheet end.
pub fn data_region(grid: &Grid, header_row: usize) -> &[Vec<CellValue>] {
    let start = header_row + 1;
    if start >= grid.len() {
        return &[];
    }
    let rest = &grid[start..];
    let stop = rest
        .iter()
        .position(|row| row.iter().all(CellValue::is_blank))
        .unwrap_or(rest.len());
    &rest[..stop]
}
