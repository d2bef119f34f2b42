use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::model::IndexStats;
use crate::orchestrate::MultiLinkageResult;

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub execution_ms: u64,
}

/// Per-comparison line of the run report.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonSummary {
    pub name: String,
    pub matches: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexStats>,
    pub quality: BTreeMap<String, usize>,
    pub confidence: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

/// Machine-readable summary of one orchestrated run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub meta: RunMeta,
    pub success: bool,
    pub comparisons_attempted: usize,
    pub comparisons_with_results: usize,
    pub comparisons_failed: usize,
    pub total_matches: usize,
    pub comparisons: Vec<ComparisonSummary>,
}

/// Summarize a finished run.
pub fn compute_summary(config_name: &str, multi: &MultiLinkageResult, elapsed: Duration) -> RunReport {
    let comparisons = multi
        .outcomes
        .iter()
        .map(|o| {
            let dist = o.result.distribution();
            let (error, error_kind) = match &o.error {
                Some(e) => {
                    let kind = match e {
                        crate::error::LinkageError::PairJob { source, .. } => source.kind(),
                        other => other.kind(),
                    };
                    (Some(e.to_string()), Some(kind))
                }
                None => (None, None),
            };
            ComparisonSummary {
                name: o.name.clone(),
                matches: o.match_count(),
                index: o.result.index_stats,
                quality: dist.quality,
                confidence: dist.confidence,
                error,
                error_kind,
            }
        })
        .collect();

    RunReport {
        meta: RunMeta {
            config_name: config_name.to_string(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            execution_ms: elapsed.as_millis() as u64,
        },
        success: multi.failed() == 0,
        comparisons_attempted: multi.attempted(),
        comparisons_with_results: multi.with_results(),
        comparisons_failed: multi.failed(),
        total_matches: multi.total_matches(),
        comparisons,
    }
}
