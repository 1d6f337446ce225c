use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use models::{AccountBalanceRecord, AccountRef, RunDiagnostics};
use tracing::warn;

use crate::error::{ParseError, Result};

/// Read-only account directory collaborator, parameterized by bank name.
///
/// A query failure is a hard failure of the whole run (`ParseError::
/// Reference`): the join downstream is meaningless without the directory.
pub trait AccountDirectory {
    fn query(&self, bank_name: &str) -> Result<Vec<AccountRef>>;
}

/// Directory backed by a JSON array file of [`AccountRef`] rows.
pub struct JsonAccountDirectory {
    path: PathBuf,
}

impl JsonAccountDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AccountDirectory for JsonAccountDirectory {
    fn query(&self, bank_name: &str) -> Result<Vec<AccountRef>> {
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            ParseError::Reference(format!("reading {}: {e}", self.path.display()))
        })?;
        let refs: Vec<AccountRef> = serde_json::from_str(&raw).map_err(|e| {
            ParseError::Reference(format!("parsing {}: {e}", self.path.display()))
        })?;
        Ok(refs
            .into_iter()
            .filter(|r| r.bank_name == bank_name)
            .collect())
    }
}

/// In-memory directory, mainly for tests and fixed deployments.
pub struct StaticAccountDirectory {
    refs: Vec<AccountRef>,
}

impl StaticAccountDirectory {
    pub fn new(refs: Vec<AccountRef>) -> Self {
        Self { refs }
    }
}

impl AccountDirectory for StaticAccountDirectory {
    fn query(&self, bank_name: &str) -> Result<Vec<AccountRef>> {
        Ok(self
            .refs
            .iter()
            .filter(|r| r.bank_name == bank_name)
            .cloned()
            .collect())
    }
}

/// One aggregated balance line awaiting the directory join. Fields are
/// optional because the feed may not have supplied them; the join below
/// is where incompleteness becomes a drop.
#[derive(Debug, Clone)]
pub struct BalanceRow {
    pub account_number: Option<String>,
    pub currency: Option<String>,
    pub balance: Option<f64>,
    pub as_of: Option<NaiveDate>,
}

/// Join balance rows against the directory on account number.
///
/// Strict by intent: a row with no directory match, or with any field
/// still unresolved after the join, is dropped and counted — downstream
/// consumers assume every emitted record is fully populated.
pub fn match_accounts(
    rows: Vec<BalanceRow>,
    refs: &[AccountRef],
    diagnostics: &mut RunDiagnostics,
) -> Vec<AccountBalanceRecord> {
    let index: HashMap<&str, &AccountRef> = refs
        .iter()
        .map(|r| (r.account_number.as_str(), r))
        .collect();

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(number) = row.account_number.as_deref().filter(|n| !n.is_empty()) else {
            diagnostics.incomplete_after_join += 1;
            continue;
        };
        let Some(reference) = index.get(number) else {
            warn!(account = number, "no account directory match, dropping row");
            diagnostics.unmatched_account += 1;
            continue;
        };
        match (row.currency, row.balance, row.as_of) {
            (Some(currency), Some(balance), Some(as_of)) if !currency.is_empty() => {
                out.push(AccountBalanceRecord {
                    account_number: number.to_string(),
                    account_currency: currency,
                    account_balance: balance,
                    account_date: as_of,
                    bank_short_name: reference.short_name.clone(),
                    bank_location: reference.location.clone(),
                });
            }
            _ => {
                warn!(account = number, "incomplete row after join, dropping");
                diagnostics.incomplete_after_join += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(number: &str) -> AccountRef {
        AccountRef {
            bank_name: "The Hongkong and Shanghai Banking Corporation Limited".to_string(),
            short_name: "HSBC".to_string(),
            location: "HK".to_string(),
            account_number: number.to_string(),
        }
    }

    fn balance(number: &str) -> BalanceRow {
        BalanceRow {
            account_number: Some(number.to_string()),
            currency: Some("HKD".to_string()),
            balance: Some(1000.0),
            as_of: NaiveDate::from_ymd_opt(2026, 1, 15),
        }
    }

    #[test]
    fn unmatched_account_is_dropped_and_counted_once() {
        let refs = vec![reference("111-222333-001")];
        let rows = vec![balance("111-222333-001"), balance("999-000000-001")];

        let mut diag = RunDiagnostics::default();
        let matched = match_accounts(rows, &refs, &mut diag);

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].account_number, "111-222333-001");
        assert_eq!(matched[0].bank_short_name, "HSBC");
        assert_eq!(diag.unmatched_account, 1);
    }

    #[test]
    fn any_null_after_join_drops_the_row() {
        let refs = vec![reference("111-222333-001")];
        let mut row = balance("111-222333-001");
        row.balance = None;

        let mut diag = RunDiagnostics::default();
        let matched = match_accounts(vec![row], &refs, &mut diag);

        assert!(matched.is_empty());
        assert_eq!(diag.incomplete_after_join, 1);
    }

    #[test]
    fn static_directory_filters_by_bank_name() {
        let mut other = reference("222");
        other.bank_name = "Some Other Bank".to_string();
        let dir = StaticAccountDirectory::new(vec![reference("111"), other]);

        let refs = dir
            .query("The Hongkong and Shanghai Banking Corporation Limited")
            .unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].account_number, "111");
    }
}
