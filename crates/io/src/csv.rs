// CSV dataset import / match table export

use std::io::Read;
use std::path::Path;

use reclink_linkage::model::{Dataset, MatchTable, Record, Value};
use reclink_linkage::LinkageError;

fn io_err(path: &Path, e: impl std::fmt::Display) -> LinkageError {
    LinkageError::Io(format!("{}: {e}", path.display()))
}

/// Load a CSV file as a dataset. The delimiter is sniffed from the content.
pub fn load_dataset_file(
    path: &Path,
    name: &str,
    columns: Option<&[(String, String)]>,
    limit: Option<usize>,
) -> Result<Dataset, LinkageError> {
    let content = read_file_as_utf8(path)?;
    load_dataset(name, &content, columns, limit)
}

/// Parse CSV text with a header row into a dataset.
///
/// `columns` maps logical names to header names; without it every header is
/// kept under its own name. Cells load as text, empty cells as null.
pub fn load_dataset(
    name: &str,
    content: &str,
    columns: Option<&[(String, String)]>,
    limit: Option<usize>,
) -> Result<Dataset, LinkageError> {
    let delimiter = sniff_delimiter(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| LinkageError::Io(format!("dataset '{name}': {e}")))?
        .clone();

    let idx = |physical: &str| -> Result<usize, LinkageError> {
        headers
            .iter()
            .position(|h| h.trim() == physical)
            .ok_or_else(|| LinkageError::schema(name, physical))
    };

    let mapping: Vec<(String, usize)> = match columns {
        Some(cols) => cols
            .iter()
            .map(|(logical, physical)| Ok((logical.clone(), idx(physical)?)))
            .collect::<Result<_, LinkageError>>()?,
        None => headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_string(), i))
            .collect(),
    };

    let mut dataset = Dataset::new(name, mapping.iter().map(|(l, _)| l.clone()).collect());
    for result in reader.records() {
        if limit.is_some_and(|n| dataset.len() >= n) {
            break;
        }
        let record = result.map_err(|e| LinkageError::Io(format!("dataset '{name}': {e}")))?;
        let values = mapping
            .iter()
            .map(|(_, i)| Value::from(record.get(*i).unwrap_or("")))
            .collect();
        dataset.records.push(Record::new(values));
    }

    log::debug!("dataset '{name}': {} rows, {} columns", dataset.len(), dataset.columns.len());
    Ok(dataset)
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // consistent lines × field count; more columns breaks ties
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, LinkageError> {
    let mut file = std::fs::File::open(path).map_err(|e| io_err(path, e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| io_err(path, e))?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            // Excel-exported CSVs are commonly Windows-1252
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Write a match table with a header row. Nulls become empty cells.
pub fn write_table(table: &MatchTable, path: &Path) -> Result<(), LinkageError> {
    let mut writer = csv::WriterBuilder::new()
        .from_path(path)
        .map_err(|e| io_err(path, e))?;

    writer.write_record(&table.columns).map_err(|e| io_err(path, e))?;
    for row in &table.rows {
        let record: Vec<String> = row.iter().map(Value::to_string).collect();
        writer.write_record(&record).map_err(|e| io_err(path, e))?;
    }

    writer.flush().map_err(|e| io_err(path, e))?;
    Ok(())
}
