// SQLite dataset import / result table export

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection};

use reclink_linkage::model::{Dataset, MatchTable, Record, Value};
use reclink_linkage::LinkageError;

fn db_err(e: rusqlite::Error) -> LinkageError {
    LinkageError::Io(format!("sqlite: {e}"))
}

/// Double-quote an identifier for use in SQL text.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn table_columns(conn: &Connection, dataset: &str, table: &str) -> Result<Vec<String>, LinkageError> {
    let exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
            params![table],
            |row| row.get(0),
        )
        .map_err(db_err)?;
    if !exists {
        return Err(LinkageError::schema(dataset, format!("table {table}")));
    }

    let stmt = conn
        .prepare(&format!("SELECT * FROM {} LIMIT 0", quote_ident(table)))
        .map_err(db_err)?;
    Ok(stmt.column_names().into_iter().map(String::from).collect())
}

/// Load a table as a dataset.
///
/// INTEGER and REAL cells load as numbers, TEXT as text, NULL and BLOB as null.
pub fn load_dataset(
    conn: &Connection,
    name: &str,
    table: &str,
    columns: Option<&[(String, String)]>,
    limit: Option<usize>,
) -> Result<Dataset, LinkageError> {
    let available = table_columns(conn, name, table)?;

    let mapping: Vec<(String, String)> = match columns {
        Some(cols) => {
            for (_, physical) in cols {
                if !available.iter().any(|c| c == physical) {
                    return Err(LinkageError::schema(name, physical.as_str()));
                }
            }
            cols.to_vec()
        }
        None => available.iter().map(|c| (c.clone(), c.clone())).collect(),
    };

    let select_list = mapping
        .iter()
        .map(|(_, physical)| quote_ident(physical))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!("SELECT {select_list} FROM {}", quote_ident(table));
    if let Some(n) = limit {
        sql.push_str(&format!(" LIMIT {n}"));
    }

    let mut stmt = conn.prepare(&sql).map_err(db_err)?;
    let width = mapping.len();
    let rows = stmt
        .query_map([], |row| {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(match row.get_ref(i)? {
                    ValueRef::Null | ValueRef::Blob(_) => Value::Null,
                    ValueRef::Integer(n) => Value::Number(n as f64),
                    ValueRef::Real(f) => Value::Number(f),
                    ValueRef::Text(t) => Value::from(&*String::from_utf8_lossy(t)),
                });
            }
            Ok(Record::new(values))
        })
        .map_err(db_err)?;

    let mut dataset = Dataset::new(name, mapping.into_iter().map(|(l, _)| l).collect());
    for row in rows {
        dataset.records.push(row.map_err(db_err)?);
    }

    log::debug!("dataset '{name}': {} rows from table {table}", dataset.len());
    Ok(dataset)
}

/// Replace `table` with the contents of a match table.
///
/// Columns whose non-null values are all numbers are REAL, the rest TEXT.
pub fn write_table(conn: &Connection, table: &str, data: &MatchTable) -> Result<(), LinkageError> {
    let column_defs = data
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let numeric = data
                .rows
                .iter()
                .filter_map(|r| r.get(i))
                .filter(|v| !v.is_null())
                .all(|v| matches!(v, Value::Number(_)));
            let ty = if numeric { "REAL" } else { "TEXT" };
            format!("{} {ty}", quote_ident(c))
        })
        .collect::<Vec<_>>()
        .join(", ");

    let quoted = quote_ident(table);
    // rolled back on drop unless committed
    let tx = conn.unchecked_transaction().map_err(db_err)?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {quoted};
         CREATE TABLE {quoted} ({column_defs});"
    ))
    .map_err(db_err)?;

    let placeholders = vec!["?"; data.columns.len()].join(", ");
    let insert = format!("INSERT INTO {quoted} VALUES ({placeholders})");
    {
        let mut stmt = tx.prepare(&insert).map_err(db_err)?;
        for row in &data.rows {
            stmt.execute(params_from_iter(row.iter().map(to_sql)))
                .map_err(db_err)?;
        }
    }

    tx.commit().map_err(db_err)?;
    Ok(())
}

fn to_sql(v: &Value) -> SqlValue {
    match v {
        Value::Null => SqlValue::Null,
        Value::Number(n) if n.is_nan() => SqlValue::Null,
        Value::Number(n) => SqlValue::Real(*n),
        Value::Text(s) if s.is_empty() => SqlValue::Null,
        other => SqlValue::Text(other.to_string()),
    }
}
