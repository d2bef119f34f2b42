// Dataset provider dispatch

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};

use reclink_linkage::config::{DatasetConfig, SourceKind};
use reclink_linkage::model::Dataset;
use reclink_linkage::LinkageError;

/// Resolve a config-relative path.
pub fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

/// Load one configured dataset. Relative paths resolve against `base_dir`.
pub fn load(ds: &DatasetConfig, base_dir: &Path, limit: Option<usize>) -> Result<Dataset, LinkageError> {
    let path = resolve(base_dir, &ds.path);
    let columns = ds.columns.as_deref();

    let dataset = match ds.source {
        SourceKind::Csv => crate::csv::load_dataset_file(&path, &ds.name, columns, limit)?,
        SourceKind::Sqlite => {
            let table = ds.table.as_deref().ok_or_else(|| {
                LinkageError::config(format!("dataset '{}': sqlite source requires table", ds.name))
            })?;
            let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)
                .map_err(|e| LinkageError::Io(format!("{}: {e}", path.display())))?;
            crate::sqlite::load_dataset(&conn, &ds.name, table, columns, limit)?
        }
    };

    log::info!(
        "loaded dataset '{}' ({}): {} records",
        ds.name,
        ds.source,
        dataset.len()
    );
    Ok(dataset)
}

/// Load every configured dataset in order. Stops at the first failure.
pub fn load_all(
    datasets: &[DatasetConfig],
    base_dir: &Path,
    limit: Option<usize>,
) -> Result<Vec<Dataset>, LinkageError> {
    datasets.iter().map(|ds| load(ds, base_dir, limit)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reclink_linkage::model::Value;
    use std::fs;
    use tempfile::tempdir;

    fn csv_config(name: &str, path: &str) -> DatasetConfig {
        DatasetConfig {
            name: name.into(),
            source: SourceKind::Csv,
            path: path.into(),
            table: None,
            columns: None,
        }
    }

    #[test]
    fn test_relative_paths_and_limit() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "id,name\n1,Ann\n2,Bob\n3,Eve\n").unwrap();

        let ds = load(&csv_config("a", "a.csv"), dir.path(), Some(2)).unwrap();
        assert_eq!(ds.name, "a");
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn test_sqlite_source() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("b.db");
        {
            let conn = Connection::open(&db).unwrap();
            conn.execute_batch("CREATE TABLE people (id INTEGER, name TEXT); INSERT INTO people VALUES (7, 'Ann');")
                .unwrap();
        }

        let cfg = DatasetConfig {
            name: "b".into(),
            source: SourceKind::Sqlite,
            path: db.to_string_lossy().into_owned(),
            table: Some("people".into()),
            columns: Some(vec![("id".into(), "id".into()), ("name".into(), "name".into())]),
        };
        let ds = load(&cfg, Path::new("/ignored"), None).unwrap();
        assert_eq!(ds.records[0].values, vec![Value::Number(7.0), Value::from("Ann")]);
    }

    #[test]
    fn test_load_all_stops_on_missing_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "id\n1\n").unwrap();
        let configs = vec![csv_config("a", "a.csv"), csv_config("b", "missing.csv")];
        let err = load_all(&configs, dir.path(), None).unwrap_err();
        assert!(matches!(err, LinkageError::Io(ref m) if m.contains("missing.csv")));
    }
}
