// Result consumers: per-comparison CSV files, SQLite tables, JSON report

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Serialize;

use reclink_linkage::model::MatchTable;
use reclink_linkage::orchestrate::MultiLinkageResult;
use reclink_linkage::LinkageError;

/// What an export wrote and what it skipped.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExportSummary {
    /// Files or table names written.
    pub written: Vec<String>,
    /// Comparisons without matches.
    pub skipped: Vec<String>,
}

/// `-` and spaces become `_`.
pub fn safe_name(name: &str) -> String {
    name.replace(['-', ' '], "_")
}

/// One match table to one CSV file.
pub fn write_csv(table: &MatchTable, path: &Path) -> Result<(), LinkageError> {
    crate::csv::write_table(table, path)
}

/// Write `linkage_<name>.csv` into `dir` for every comparison with matches.
pub fn write_all_csv(results: &MultiLinkageResult, dir: &Path) -> Result<ExportSummary, LinkageError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| LinkageError::Io(format!("{}: {e}", dir.display())))?;

    let mut summary = ExportSummary::default();
    for outcome in &results.outcomes {
        if outcome.result.table.is_empty() {
            log::info!("{}: no matches, skipping CSV export", outcome.name);
            summary.skipped.push(outcome.name.clone());
            continue;
        }
        let path: PathBuf = dir.join(format!("linkage_{}.csv", safe_name(&outcome.name)));
        write_csv(&outcome.result.table, &path)?;
        log::info!("{}: {} matches written to {}", outcome.name, outcome.result.table.len(), path.display());
        summary.written.push(path.display().to_string());
    }
    Ok(summary)
}

/// Replace one `<prefix>_<name>` table per comparison with matches.
pub fn save_sqlite(
    conn: &Connection,
    results: &MultiLinkageResult,
    prefix: &str,
) -> Result<ExportSummary, LinkageError> {
    let mut summary = ExportSummary::default();
    for outcome in &results.outcomes {
        if outcome.result.table.is_empty() {
            summary.skipped.push(outcome.name.clone());
            continue;
        }
        let table = format!("{}_{}", safe_name(prefix), safe_name(&outcome.name));
        crate::sqlite::write_table(conn, &table, &outcome.result.table)?;
        log::info!("{}: saved to table {table}", outcome.name);
        summary.written.push(table);
    }
    Ok(summary)
}

/// Open (or create) the database at `path` and save every result table.
pub fn save_sqlite_file(
    path: &Path,
    results: &MultiLinkageResult,
    prefix: &str,
) -> Result<ExportSummary, LinkageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| LinkageError::Io(format!("{}: {e}", parent.display())))?;
    }
    let conn = Connection::open(path)
        .map_err(|e| LinkageError::Io(format!("{}: {e}", path.display())))?;
    save_sqlite(&conn, results, prefix)
}

/// Pretty-printed JSON file.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), LinkageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| LinkageError::Io(format!("{}: {e}", parent.display())))?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| LinkageError::Io(format!("json: {e}")))?;
    std::fs::write(path, json + "\n")
        .map_err(|e| LinkageError::Io(format!("{}: {e}", path.display())))
}
