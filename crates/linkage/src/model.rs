use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            Self::Number(n) => n.is_nan(),
            Self::Date(_) => false,
        }
    }

    /// Key used for blocking and sorting. `None` never pairs.
    pub fn index_key(&self) -> Option<IndexKey> {
        if self.is_null() {
            return None;
        }
        match self {
            Self::Number(n) => Some(IndexKey::Number(OrderedFloat(*n))),
            Self::Date(d) => Some(IndexKey::Text(d.format("%Y-%m-%d").to_string())),
            Self::Text(s) => Some(IndexKey::Text(s.clone())),
            Self::Null => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) if !n.is_nan() => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Text(s) => write!(f, "{s}"),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Date(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Null
        } else {
            Self::Text(s.to_string())
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// Exact blocking / sorting key. Numbers sort before text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexKey {
    Number(OrderedFloat<f64>),
    Text(String),
}

/// One row, aligned with its dataset's `columns`.
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub values: Vec<Value>,
}

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }
}

/// An ordered, read-only collection of records under logical column names.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            records: Vec::new(),
        }
    }

    /// Convenience builder used by tests and in-memory callers.
    pub fn from_rows<I, R, V>(name: &str, columns: &[&str], rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut ds = Self::new(name, columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            ds.records.push(Record::new(row.into_iter().map(Into::into).collect()));
        }
        ds
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn value(&self, row: usize, col: usize) -> &Value {
        self.records
            .get(row)
            .and_then(|r| r.values.get(col))
            .unwrap_or(&Value::Null)
    }

    /// Reported identifier: the `id` column when present, else the position.
    pub fn record_id(&self, row: usize) -> Value {
        match self.column_index("id") {
            Some(col) if !self.value(row, col).is_null() => self.value(row, col).clone(),
            _ => Value::Number(row as f64),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline intermediates
// ---------------------------------------------------------------------------

/// `(left_index, right_index)`. For dedup, `left < right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CandidatePair {
    pub left: usize,
    pub right: usize,
}

impl CandidatePair {
    pub fn new(left: usize, right: usize) -> Self {
        Self { left, right }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndexStats {
    pub candidates: u64,
    pub total_possible: u64,
    pub reduction_ratio: f64,
}

impl IndexStats {
    pub fn new(candidates: u64, total_possible: u64) -> Self {
        let reduction_ratio = if total_possible == 0 {
            0.0
        } else {
            1.0 - candidates as f64 / total_possible as f64
        };
        Self {
            candidates,
            total_possible,
            reduction_ratio,
        }
    }
}

/// One row of scores per candidate pair, one column per usable rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    pub labels: Vec<String>,
    /// Columns produced by exact-match rules.
    pub exact: Vec<bool>,
    pub pairs: Vec<CandidatePair>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn width(&self) -> usize {
        self.labels.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_sum(&self, i: usize) -> f64 {
        self.rows[i].iter().sum()
    }

    pub fn column_mean(&self, col: usize) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        self.rows.iter().map(|r| r[col]).sum::<f64>() / self.rows.len() as f64
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Quality {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

impl Quality {
    /// Lower bucket edges are inclusive.
    pub fn from_ratio(score_ratio: f64) -> Self {
        if score_ratio >= 0.9 {
            Self::Excellent
        } else if score_ratio >= 0.8 {
            Self::Good
        } else if score_ratio >= 0.7 {
            Self::Fair
        } else if score_ratio >= 0.5 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "EXCELLENT",
            Self::Good => "GOOD",
            Self::Fair => "FAIR",
            Self::Poor => "POOR",
            Self::VeryPoor => "VERY_POOR",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
    Unknown,
}

impl Confidence {
    /// `exact` flags the columns produced by exact-match rules.
    pub fn from_features(exact: &[bool], features: &[f64]) -> Self {
        if features.is_empty() {
            return Self::Unknown;
        }
        let exact_matches = exact
            .iter()
            .zip(features)
            .filter(|(is_exact, score)| **is_exact && **score == 1.0)
            .count();

        if exact_matches >= 2 {
            Self::High
        } else if exact_matches == 1 {
            Self::Medium
        } else if features.iter().sum::<f64>() / features.len() as f64 >= 0.8 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub pair: CandidatePair,
    pub total_score: f64,
    pub max_possible_score: usize,
    pub score_ratio: f64,
    pub features: Vec<f64>,
    pub quality: Quality,
    pub confidence: Confidence,
}

/// Formatted match table: named columns, one row per match.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl MatchTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Rewrite column-name prefixes (`source_` → `crm_`) in one pass.
    ///
    /// Each column is matched against the original names only, so a
    /// replacement never feeds a later mapping.
    pub fn rename_prefixes(&mut self, mapping: &[(&str, &str)]) {
        for col in &mut self.columns {
            if let Some(renamed) = mapping
                .iter()
                .find_map(|(from, to)| col.strip_prefix(from).map(|rest| format!("{to}{rest}")))
            {
                *col = renamed;
            }
        }
    }
}

/// Counts per quality / confidence label.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Distribution {
    pub quality: BTreeMap<String, usize>,
    pub confidence: BTreeMap<String, usize>,
}

/// Everything one pipeline run produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinkageResult {
    pub index_stats: Option<IndexStats>,
    pub labels: Vec<String>,
    pub matches: Vec<Match>,
    pub table: MatchTable,
}

impl LinkageResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn distribution(&self) -> Distribution {
        let mut dist = Distribution::default();
        for m in &self.matches {
            *dist.quality.entry(m.quality.to_string()).or_insert(0) += 1;
            *dist.confidence.entry(m.confidence.to_string()).or_insert(0) += 1;
        }
        dist
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn quality_lower_edges_inclusive() {
        assert_eq!(Quality::from_ratio(1.0), Quality::Excellent);
        assert_eq!(Quality::from_ratio(0.9), Quality::Excellent);
        assert_eq!(Quality::from_ratio(0.8999), Quality::Good);
        assert_eq!(Quality::from_ratio(0.8), Quality::Good);
        assert_eq!(Quality::from_ratio(0.7), Quality::Fair);
        assert_eq!(Quality::from_ratio(0.5), Quality::Poor);
        assert_eq!(Quality::from_ratio(0.49), Quality::VeryPoor);
        assert_eq!(Quality::from_ratio(0.0), Quality::VeryPoor);
    }

    #[test]
    fn confidence_buckets() {
        let e = [true, true, false];
        assert_eq!(Confidence::from_features(&e, &[1.0, 1.0, 0.0]), Confidence::High);
        assert_eq!(Confidence::from_features(&e, &[1.0, 0.0, 0.0]), Confidence::Medium);
        // no exact hits, mean 0.833
        let none = [false; 3];
        assert_eq!(Confidence::from_features(&none, &[1.0, 1.0, 0.5]), Confidence::Medium);
        assert_eq!(Confidence::from_features(&none, &[1.0, 0.2, 0.5]), Confidence::Low);
        assert_eq!(Confidence::from_features(&[], &[]), Confidence::Unknown);
    }

    #[test]
    fn confidence_ignores_non_exact_ones() {
        // two perfect scores but neither is an exact-match column; mean 1.0 -> MEDIUM
        assert_eq!(Confidence::from_features(&[false, false], &[1.0, 1.0]), Confidence::Medium);
        // mean 0.4
        assert_eq!(
            Confidence::from_features(&[false; 5], &[1.0, 1.0, 0.0, 0.0, 0.0]),
            Confidence::Low
        );
    }

    #[test]
    fn value_display_and_keys() {
        assert_eq!(Value::Number(12.0).to_string(), "12");
        assert_eq!(Value::Number(1.5).to_string(), "1.5");
        assert_eq!(Value::from("").to_string(), "");
        assert!(Value::from("").is_null());
        assert_eq!(Value::from(" 42 ").as_number(), Some(42.0));
        assert!(Value::Null.index_key().is_none());
        assert!(Value::Number(1.0).index_key() < Value::from("a").index_key());
    }

    #[test]
    fn record_id_prefers_id_column() {
        let ds = Dataset::from_rows("a", &["id", "name"], vec![vec!["7", "jon"], vec!["", "ann"]]);
        assert_eq!(ds.record_id(0), Value::Text("7".into()));
        assert_eq!(ds.record_id(1), Value::Number(1.0));

        let no_id = Dataset::from_rows("b", &["name"], vec![vec!["jon"]]);
        assert_eq!(no_id.record_id(0), Value::Number(0.0));
    }

    #[test]
    fn rename_prefix_only_touches_prefix() {
        let mut t = MatchTable {
            columns: labels(&["source_id", "target_name", "feature_source_exact", "total_score"]),
            rows: vec![],
        };
        t.rename_prefixes(&[("source_", "crm_"), ("target_", "billing_")]);
        assert_eq!(
            t.columns,
            labels(&["crm_id", "billing_name", "feature_source_exact", "total_score"])
        );
    }

    #[test]
    fn rename_prefixes_does_not_chain() {
        let mut t = MatchTable {
            columns: labels(&["source_id", "target_id", "source_name", "target_name"]),
            rows: vec![],
        };
        t.rename_prefixes(&[("source_", "target_"), ("target_", "crm_")]);
        assert_eq!(t.columns, labels(&["target_id", "crm_id", "target_name", "crm_name"]));
    }

    #[test]
    fn index_stats_reduction() {
        let s = IndexStats::new(25, 100);
        assert!((s.reduction_ratio - 0.75).abs() < 1e-12);
        assert_eq!(IndexStats::new(0, 0).reduction_ratio, 0.0);
    }
}
