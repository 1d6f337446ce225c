use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::{ParseError, Result};
use crate::split::RawTable;

/// Mapping value that excludes a source column from the output entirely.
pub const DROP_FIELD: &str = "drop";

/// Declarative original-column → canonical-column mapping.
///
/// Order matters: when several source columns map to the same canonical
/// name, the first one (in declared order) with a non-blank cell wins,
/// per row. Loaded once and passed into the mapper explicitly; never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct FieldMapping {
    entries: Vec<(String, String)>,
}

impl FieldMapping {
    pub fn from_pairs<I, S, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        FieldMapping {
            entries: pairs
                .into_iter()
                .map(|(orig, canon)| (orig.into(), canon.into()))
                .collect(),
        }
    }

    /// Load a mapping from a JSON object file. Key order in the file is
    /// the declared priority order (the JSON parser preserves it).
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ParseError::FileNotFound(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&raw)
            .map_err(|e| ParseError::InvalidFormat(format!("mapping file: {e}")))?;
        let obj = value.as_object().ok_or_else(|| {
            ParseError::InvalidFormat("mapping file must be a JSON object".to_string())
        })?;

        let mut entries = Vec::with_capacity(obj.len());
        for (orig, canon) in obj {
            let canon = canon.as_str().ok_or_else(|| {
                ParseError::InvalidFormat(format!("mapping for '{orig}' must be a string"))
            })?;
            entries.push((orig.clone(), canon.to_string()));
        }
        Ok(FieldMapping { entries })
    }

    /// Canonical column names in declared order, deduplicated, with the
    /// drop sentinel excluded.
    pub fn canonical_columns(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for (_, canon) in &self.entries {
            if canon != DROP_FIELD && !out.contains(&canon.as_str()) {
                out.push(canon);
            }
        }
        out
    }

    /// Apply the mapping to a raw table whose columns are named by
    /// `headers` (position-aligned with the table).
    ///
    /// Per-row coalesce semantics: each canonical column takes the value
    /// of its first contributing source column whose trimmed cell is
    /// non-empty; if none contributes, the cell is `None`. Re-applying an
    /// identity mapping to the result reproduces it unchanged.
    pub fn apply(&self, headers: &[String], table: &RawTable) -> MappedTable {
        let columns: Vec<String> = self
            .canonical_columns()
            .into_iter()
            .map(str::to_string)
            .collect();

        // Source column indices per canonical column, declared order.
        let sources: Vec<Vec<usize>> = columns
            .iter()
            .map(|canon| {
                self.entries
                    .iter()
                    .filter(|(_, c)| c == canon)
                    .filter_map(|(orig, _)| headers.iter().position(|h| h == orig))
                    .collect()
            })
            .collect();

        let rows = table
            .rows
            .iter()
            .map(|row| {
                sources
                    .iter()
                    .map(|candidates| {
                        candidates.iter().find_map(|&idx| {
                            row.get(idx)
                                .and_then(|cell| cell.as_deref())
                                .map(str::trim)
                                .filter(|s| !s.is_empty())
                                .map(str::to_string)
                        })
                    })
                    .collect()
            })
            .collect();

        MappedTable { columns, rows }
    }
}

/// Output of the field mapper: canonical columns, per-row optional cells.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl MappedTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell<'a>(&'a self, row: &'a [Option<String>], name: &str) -> Option<&'a str> {
        self.column_index(name)
            .and_then(|idx| row.get(idx))
            .and_then(|cell| cell.as_deref())
    }
}
