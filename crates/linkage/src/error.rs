use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkageError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Invalid or missing setting (indexing key, rule list, method name, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A column the job needs is absent from a dataset.
    #[error("dataset '{dataset}': missing column '{column}'")]
    Schema { dataset: String, column: String },

    /// A job stage was invoked before its prerequisite.
    #[error("state error: {0}")]
    State(String),

    /// Candidate set exceeds the configured hard cap.
    #[error("{pairs} candidate pairs exceed max_candidate_pairs={limit}")]
    CandidateLimit { pairs: u64, limit: u64 },

    /// Failure isolated to one pairwise comparison.
    #[error("comparison '{comparison}' failed: {source}")]
    PairJob {
        comparison: String,
        #[source]
        source: Box<LinkageError>,
    },

    /// IO error (file read, database access, etc.).
    #[error("IO error: {0}")]
    Io(String),
}

impl LinkageError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn schema(dataset: impl Into<String>, column: impl Into<String>) -> Self {
        Self::Schema {
            dataset: dataset.into(),
            column: column.into(),
        }
    }

    /// Short machine-readable kind, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigParse(_) => "config_parse",
            Self::Configuration(_) => "configuration",
            Self::Schema { .. } => "schema",
            Self::State(_) => "state",
            Self::CandidateLimit { .. } => "candidate_limit",
            Self::PairJob { .. } => "pair_job",
            Self::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_job_wraps_source() {
        let err = LinkageError::PairJob {
            comparison: "x_z".into(),
            source: Box::new(LinkageError::schema("z", "email")),
        };
        assert_eq!(err.kind(), "pair_job");
        assert_eq!(
            err.to_string(),
            "comparison 'x_z' failed: dataset 'z': missing column 'email'"
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
