use std::collections::HashSet;

use serde::Deserialize;

use crate::error::LinkageError;

pub const DEFAULT_WINDOW: usize = 3;
pub const DEFAULT_STRING_THRESHOLD: f64 = 0.85;
pub const DEFAULT_NUMERIC_OFFSET: f64 = 1.0;
pub const DEFAULT_DATE_OFFSET_DAYS: f64 = 365.0;
pub const DEFAULT_CLASSIFICATION_THRESHOLD: f64 = 0.7;
pub const DEFAULT_FULL_WARNING_PAIRS: u64 = 1_000_000;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// A parsed and validated `.link.toml` file.
#[derive(Debug, Clone)]
pub struct LinkageConfig {
    pub name: String,
    pub description: String,
    pub datasets: Vec<DatasetConfig>,
    pub settings: LinkageSettings,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Csv,
    Sqlite,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Where a named dataset comes from and how its columns map.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub name: String,
    pub source: SourceKind,
    pub path: String,
    pub table: Option<String>,
    /// `(logical, physical)` in declaration order. `None` keeps every column as-is.
    pub columns: Option<Vec<(String, String)>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub csv_dir: Option<String>,
    #[serde(default)]
    pub sqlite_path: Option<String>,
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
    #[serde(default)]
    pub json: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_dir: None,
            sqlite_path: None,
            table_prefix: default_table_prefix(),
            json: None,
        }
    }
}

fn default_table_prefix() -> String {
    "linkage".into()
}

// ---------------------------------------------------------------------------
// Engine settings
// ---------------------------------------------------------------------------

/// Everything one linkage job needs besides the datasets.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkageSettings {
    pub indexing: IndexingConfig,
    pub comparison: Vec<ComparisonRule>,
    pub classification: ClassificationConfig,
    /// Run pairwise comparisons on a thread pool.
    pub parallel: bool,
}

impl LinkageSettings {
    pub fn new(
        indexing: IndexingConfig,
        comparison: Vec<ComparisonRule>,
        classification: ClassificationConfig,
    ) -> Self {
        Self {
            indexing,
            comparison,
            classification,
            parallel: false,
        }
    }

    /// Parse a bare `[indexing]` / `[[comparison]]` / `[classification]` document.
    pub fn from_toml(input: &str) -> Result<Self, LinkageError> {
        let raw: RawLinkage =
            toml::from_str(input).map_err(|e| LinkageError::ConfigParse(e.to_string()))?;
        raw.try_into()
    }

    /// Logical fields each dataset must carry for these settings.
    pub fn required_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        if let Some(key) = self.indexing.method.key() {
            fields.push(key);
        }
        for rule in &self.comparison {
            if rule.method.is_supported() && !fields.contains(&rule.field.as_str()) {
                fields.push(&rule.field);
            }
        }
        fields
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexingConfig {
    pub method: IndexingMethod,
    /// Full indexing above this many pairs logs a warning.
    pub full_warning_pairs: u64,
    /// Hard cap on the candidate set, any method.
    pub max_candidate_pairs: Option<u64>,
}

impl IndexingConfig {
    pub fn new(method: IndexingMethod) -> Self {
        Self {
            method,
            full_warning_pairs: DEFAULT_FULL_WARNING_PAIRS,
            max_candidate_pairs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexingMethod {
    Block { key: String },
    SortedNeighbourhood { key: String, window: usize },
    Full,
}

impl IndexingMethod {
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Block { key } | Self::SortedNeighbourhood { key, .. } => Some(key),
            Self::Full => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Block { .. } => "block",
            Self::SortedNeighbourhood { .. } => "sortedneighbourhood",
            Self::Full => "full",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRule {
    pub field: String,
    /// Feature column label.
    pub label: String,
    pub method: ComparisonMethod,
}

impl ComparisonRule {
    /// Rule with the default `{field}_{method}` label.
    pub fn new(field: impl Into<String>, method: ComparisonMethod) -> Self {
        let field = field.into();
        let label = format!("{field}_{}", method.suffix());
        Self { field, label, method }
    }

    pub fn exact(field: &str) -> Self {
        Self::new(field, ComparisonMethod::Exact { case_sensitive: true })
    }

    pub fn string(field: &str, threshold: Option<f64>) -> Self {
        Self::new(
            field,
            ComparisonMethod::String {
                algorithm: StringAlgorithm::JaroWinkler,
                threshold,
                case_sensitive: true,
            },
        )
    }

    pub fn numeric(field: &str, offset: f64) -> Self {
        Self::new(field, ComparisonMethod::Numeric { offset })
    }

    pub fn date(field: &str, offset_days: f64) -> Self {
        Self::new(
            field,
            ComparisonMethod::Date {
                offset_days,
                swap_month_day: false,
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonMethod {
    Exact {
        case_sensitive: bool,
    },
    String {
        algorithm: StringAlgorithm,
        /// `Some` binarizes the similarity; `None` keeps it continuous.
        threshold: Option<f64>,
        case_sensitive: bool,
    },
    Numeric {
        offset: f64,
    },
    Date {
        offset_days: f64,
        swap_month_day: bool,
    },
    /// Unrecognized method name. Skipped at compare time, contributes no column.
    Unsupported {
        name: String,
    },
}

impl ComparisonMethod {
    pub fn suffix(&self) -> &str {
        match self {
            Self::Exact { .. } => "exact",
            Self::String { .. } => "string",
            Self::Numeric { .. } => "numeric",
            Self::Date { .. } => "date",
            Self::Unsupported { name } => name,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringAlgorithm {
    Jaro,
    JaroWinkler,
    Levenshtein,
    DamerauLevenshtein,
    Qgram,
}

impl StringAlgorithm {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "jaro" => Some(Self::Jaro),
            "jarowinkler" | "jaro_winkler" => Some(Self::JaroWinkler),
            "levenshtein" => Some(Self::Levenshtein),
            "damerau_levenshtein" => Some(Self::DamerauLevenshtein),
            "qgram" => Some(Self::Qgram),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationConfig {
    Threshold {
        threshold: f64,
    },
    KMeans {
        max_iter: usize,
    },
    Ecm {
        max_iter: usize,
        tolerance: f64,
        binarize_at: f64,
    },
    Svm {
        epochs: usize,
        lambda: f64,
        seed: u64,
    },
}

impl ClassificationConfig {
    pub fn threshold(threshold: f64) -> Self {
        Self::Threshold { threshold }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Threshold { .. } => "threshold",
            Self::KMeans { .. } => "kmeans",
            Self::Ecm { .. } => "ecm",
            Self::Svm { .. } => "svm",
        }
    }
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self::Threshold {
            threshold: DEFAULT_CLASSIFICATION_THRESHOLD,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw TOML shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_project_name")]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    datasets: Vec<RawDataset>,
    linkage: Option<RawLinkage>,
    #[serde(default)]
    output: OutputConfig,
}

fn default_project_name() -> String {
    "Unnamed Project".into()
}

#[derive(Debug, Deserialize)]
struct RawDataset {
    name: Option<String>,
    source: SourceKind,
    path: String,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    columns: Option<toml::Table>,
}

#[derive(Debug, Deserialize)]
struct RawLinkage {
    #[serde(default)]
    indexing: RawIndexing,
    #[serde(default)]
    comparison: Vec<RawRule>,
    #[serde(default)]
    classification: RawClassification,
    #[serde(default)]
    parallel: bool,
}

#[derive(Debug, Default, Deserialize)]
struct RawIndexing {
    method: Option<String>,
    key: Option<String>,
    window: Option<i64>,
    full_warning_pairs: Option<u64>,
    max_candidate_pairs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    field: Option<String>,
    method: Option<String>,
    label: Option<String>,
    algorithm: Option<String>,
    /// Similarity cut-off for strings; tolerance alias for numeric/date.
    threshold: Option<f64>,
    #[serde(default)]
    continuous: bool,
    case_sensitive: Option<bool>,
    offset: Option<f64>,
    #[serde(default)]
    swap_month_day: bool,
}

#[derive(Debug, Default, Deserialize)]
struct RawClassification {
    method: Option<String>,
    threshold: Option<f64>,
    max_iter: Option<usize>,
    tolerance: Option<f64>,
    binarize_at: Option<f64>,
    epochs: Option<usize>,
    lambda: Option<f64>,
    seed: Option<u64>,
}

// ---------------------------------------------------------------------------
// Raw → typed
// ---------------------------------------------------------------------------

impl TryFrom<RawIndexing> for IndexingConfig {
    type Error = LinkageError;

    fn try_from(raw: RawIndexing) -> Result<Self, LinkageError> {
        let method_name = raw.method.as_deref().unwrap_or("block");
        let method = match method_name {
            "block" => {
                let key = raw
                    .key
                    .ok_or_else(|| LinkageError::config("key required for block indexing"))?;
                IndexingMethod::Block { key }
            }
            "sortedneighbourhood" | "sorted_neighbourhood" => {
                let key = raw.key.ok_or_else(|| {
                    LinkageError::config("key required for sorted neighbourhood indexing")
                })?;
                let window = raw.window.unwrap_or(DEFAULT_WINDOW as i64);
                if window < 1 || window % 2 == 0 {
                    return Err(LinkageError::config(format!(
                        "window must be an odd integer >= 1, got {window}"
                    )));
                }
                IndexingMethod::SortedNeighbourhood {
                    key,
                    window: window as usize,
                }
            }
            "full" => IndexingMethod::Full,
            other => {
                return Err(LinkageError::config(format!(
                    "unknown indexing method: {other}"
                )))
            }
        };

        Ok(Self {
            method,
            full_warning_pairs: raw.full_warning_pairs.unwrap_or(DEFAULT_FULL_WARNING_PAIRS),
            max_candidate_pairs: raw.max_candidate_pairs,
        })
    }
}

impl TryFrom<RawRule> for ComparisonRule {
    type Error = LinkageError;

    fn try_from(raw: RawRule) -> Result<Self, LinkageError> {
        let (field, method_name) = match (raw.field, raw.method) {
            (Some(f), Some(m)) => (f, m),
            _ => {
                return Err(LinkageError::config(
                    "comparison rules must contain field and method",
                ))
            }
        };

        let method = match method_name.as_str() {
            "exact" => ComparisonMethod::Exact {
                case_sensitive: raw.case_sensitive.unwrap_or(true),
            },
            "string" => {
                let algo_name = raw.algorithm.as_deref().unwrap_or("jarowinkler");
                let algorithm = StringAlgorithm::parse(algo_name).ok_or_else(|| {
                    LinkageError::config(format!(
                        "field '{field}': unknown string algorithm: {algo_name}"
                    ))
                })?;
                let threshold = if raw.continuous {
                    None
                } else {
                    let t = raw.threshold.unwrap_or(DEFAULT_STRING_THRESHOLD);
                    check_unit(&format!("field '{field}': threshold"), t)?;
                    Some(t)
                };
                ComparisonMethod::String {
                    algorithm,
                    threshold,
                    case_sensitive: raw.case_sensitive.unwrap_or(true),
                }
            }
            "numeric" => {
                let offset = raw.offset.or(raw.threshold).unwrap_or(DEFAULT_NUMERIC_OFFSET);
                check_positive(&format!("field '{field}': offset"), offset)?;
                ComparisonMethod::Numeric { offset }
            }
            "date" => {
                let offset_days = raw.offset.or(raw.threshold).unwrap_or(DEFAULT_DATE_OFFSET_DAYS);
                check_positive(&format!("field '{field}': offset"), offset_days)?;
                ComparisonMethod::Date {
                    offset_days,
                    swap_month_day: raw.swap_month_day,
                }
            }
            other => ComparisonMethod::Unsupported { name: other.into() },
        };

        let label = raw
            .label
            .unwrap_or_else(|| format!("{field}_{}", method.suffix()));

        Ok(Self { field, label, method })
    }
}

impl TryFrom<RawClassification> for ClassificationConfig {
    type Error = LinkageError;

    fn try_from(raw: RawClassification) -> Result<Self, LinkageError> {
        let method = raw.method.as_deref().unwrap_or("threshold");
        match method {
            "threshold" => {
                let threshold = raw.threshold.unwrap_or(DEFAULT_CLASSIFICATION_THRESHOLD);
                check_unit("classification threshold", threshold)?;
                Ok(Self::Threshold { threshold })
            }
            "kmeans" => {
                let max_iter = raw.max_iter.unwrap_or(100);
                check_count("max_iter", max_iter)?;
                Ok(Self::KMeans { max_iter })
            }
            "ecm" => {
                let binarize_at = raw.binarize_at.unwrap_or(0.5);
                check_unit("binarize_at", binarize_at)?;
                let max_iter = raw.max_iter.unwrap_or(100);
                check_count("max_iter", max_iter)?;
                Ok(Self::Ecm {
                    max_iter,
                    tolerance: raw.tolerance.unwrap_or(1e-4),
                    binarize_at,
                })
            }
            "svm" => {
                let lambda = raw.lambda.unwrap_or(1e-3);
                check_positive("lambda", lambda)?;
                let epochs = raw.epochs.unwrap_or(20);
                check_count("epochs", epochs)?;
                Ok(Self::Svm {
                    epochs,
                    lambda,
                    seed: raw.seed.unwrap_or(42),
                })
            }
            other => Err(LinkageError::config(format!(
                "unknown classification method: {other}"
            ))),
        }
    }
}

impl TryFrom<RawLinkage> for LinkageSettings {
    type Error = LinkageError;

    fn try_from(raw: RawLinkage) -> Result<Self, LinkageError> {
        let indexing = IndexingConfig::try_from(raw.indexing)?;
        let comparison = raw
            .comparison
            .into_iter()
            .map(ComparisonRule::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let classification = ClassificationConfig::try_from(raw.classification)?;

        let settings = Self {
            indexing,
            comparison,
            classification,
            parallel: raw.parallel,
        };
        settings.validate()?;
        Ok(settings)
    }
}

impl LinkageSettings {
    pub fn validate(&self) -> Result<(), LinkageError> {
        if self.comparison.is_empty() {
            return Err(LinkageError::config("comparison rule list is empty"));
        }

        let mut labels = HashSet::new();
        for rule in self.comparison.iter().filter(|r| r.method.is_supported()) {
            if !labels.insert(rule.label.as_str()) {
                return Err(LinkageError::config(format!(
                    "duplicate comparison label: {}",
                    rule.label
                )));
            }
        }

        if let IndexingMethod::SortedNeighbourhood { window, .. } = self.indexing.method {
            if window == 0 || window % 2 == 0 {
                return Err(LinkageError::config(format!(
                    "window must be an odd integer >= 1, got {window}"
                )));
            }
        }

        match self.classification {
            ClassificationConfig::Threshold { threshold } => {
                check_unit("classification threshold", threshold)?;
            }
            ClassificationConfig::KMeans { max_iter } | ClassificationConfig::Ecm { max_iter, .. } => {
                check_count("max_iter", max_iter)?;
            }
            ClassificationConfig::Svm { epochs, .. } => check_count("epochs", epochs)?,
        }

        Ok(())
    }
}

fn check_unit(what: &str, v: f64) -> Result<(), LinkageError> {
    if (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(LinkageError::config(format!("{what} must be in [0, 1], got {v}")))
    }
}

fn check_count(what: &str, n: usize) -> Result<(), LinkageError> {
    if n >= 1 {
        Ok(())
    } else {
        Err(LinkageError::config(format!("{what} must be >= 1, got {n}")))
    }
}

fn check_positive(what: &str, v: f64) -> Result<(), LinkageError> {
    if v > 0.0 && v.is_finite() {
        Ok(())
    } else {
        Err(LinkageError::config(format!("{what} must be > 0, got {v}")))
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl LinkageConfig {
    pub fn from_toml(input: &str) -> Result<Self, LinkageError> {
        let raw: RawConfig =
            toml::from_str(input).map_err(|e| LinkageError::ConfigParse(e.to_string()))?;

        let linkage = raw
            .linkage
            .ok_or_else(|| LinkageError::config("required section missing: [linkage]"))?;
        let settings = LinkageSettings::try_from(linkage)?;

        let datasets = raw
            .datasets
            .into_iter()
            .enumerate()
            .map(|(i, d)| dataset_from_raw(i, d))
            .collect::<Result<Vec<_>, _>>()?;

        let config = Self {
            name: raw.name,
            description: raw.description,
            datasets,
            settings,
            output: raw.output,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LinkageError> {
        if self.datasets.is_empty() {
            return Err(LinkageError::config("at least one dataset is required"));
        }

        let mut names = HashSet::new();
        for ds in &self.datasets {
            if !names.insert(ds.name.as_str()) {
                return Err(LinkageError::config(format!(
                    "dataset names must be unique: '{}' repeats",
                    ds.name
                )));
            }
            if ds.source == SourceKind::Sqlite && ds.table.is_none() {
                return Err(LinkageError::config(format!(
                    "dataset '{}': sqlite source requires table",
                    ds.name
                )));
            }
        }

        self.settings.validate()
    }

    pub fn dataset_names(&self) -> Vec<&str> {
        self.datasets.iter().map(|d| d.name.as_str()).collect()
    }
}

fn dataset_from_raw(i: usize, raw: RawDataset) -> Result<DatasetConfig, LinkageError> {
    let name = raw
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| LinkageError::config(format!("dataset {i}: 'name' field missing")))?;

    let columns = match raw.columns {
        None => None,
        Some(table) => {
            if table.is_empty() {
                return Err(LinkageError::config(format!(
                    "dataset '{name}': columns empty or invalid"
                )));
            }
            let mut mapping = Vec::with_capacity(table.len());
            for (logical, physical) in table {
                let physical = physical.as_str().ok_or_else(|| {
                    LinkageError::config(format!(
                        "dataset '{name}': column '{logical}' must map to a string"
                    ))
                })?;
                mapping.push((logical, physical.to_string()));
            }
            Some(mapping)
        }
    };

    Ok(DatasetConfig {
        name,
        source: raw.source,
        path: raw.path,
        table: raw.table,
        columns,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
