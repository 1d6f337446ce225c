use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ParseError, Result};

/// Write a result set as a timestamped CSV snapshot into `dir`, creating
/// the directory if absent. Returns the path of the written file.
///
/// File name shape: `<prefix><YYYYMMDDHHMMSS>.csv`, so lexical order is
/// chronological order and the newest snapshot sorts last.
pub fn write_snapshot<S: Serialize>(dir: &Path, prefix: &str, rows: &[S]) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .map_err(|e| ParseError::Snapshot(format!("creating {}: {e}", dir.display())))?;

    let stamp = Local::now().format("%Y%m%d%H%M%S");
    let path = dir.join(format!("{prefix}{stamp}.csv"));

    let mut writer = csv::Writer::from_path(&path)
        .map_err(|e| ParseError::Snapshot(format!("creating {}: {e}", path.display())))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| ParseError::Snapshot(format!("writing {}: {e}", path.display())))?;
    }
    writer
        .flush()
        .map_err(|e| ParseError::Snapshot(format!("flushing {}: {e}", path.display())))?;

    info!(path = %path.display(), rows = rows.len(), "snapshot written");
    Ok(path)
}

/// Delete snapshots under `dir` matching `prefix` that are older than
/// `days_to_keep` days, by file modification time. Returns the number of
/// files removed. A missing directory is not an error; there is simply
/// nothing to clean.
pub fn cleanup_snapshots(dir: &Path, prefix: &str, days_to_keep: u64) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let cutoff = Duration::from_secs(days_to_keep * 24 * 60 * 60);
    let mut removed = 0usize;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(prefix) || !name.ends_with(".csv") {
            continue;
        }
        let meta = entry.metadata()?;
        let modified = meta.modified()?;
        let age = modified.elapsed().unwrap_or_default();
        if age > cutoff {
            fs::remove_file(entry.path())?;
            debug!(file = name, "removed expired snapshot");
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Row {
        account_number: String,
        balance: f64,
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("snapshot_test_{tag}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn writes_named_snapshot_into_created_dir() {
        let dir = temp_dir("write");
        let rows = vec![Row {
            account_number: "111".into(),
            balance: 10.5,
        }];

        let path = write_snapshot(&dir, "hsbc_daily_cash_", &rows).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("hsbc_daily_cash_"));
        assert!(name.ends_with(".csv"));

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("account_number"));
        assert!(content.contains("111"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn cleanup_keeps_fresh_files_and_ignores_missing_dir() {
        let dir = temp_dir("cleanup");
        assert_eq!(cleanup_snapshots(&dir, "hsbc_daily_cash_", 7).unwrap(), 0);

        let rows: Vec<Row> = Vec::new();
        write_snapshot(&dir, "hsbc_daily_cash_", &rows).unwrap();
        // just-written snapshot is inside the retention window
        assert_eq!(cleanup_snapshots(&dir, "hsbc_daily_cash_", 7).unwrap(), 0);

        fs::remove_dir_all(&dir).unwrap();
    }
}
