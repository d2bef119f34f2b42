//! Diagnostics hooks for linkage jobs.
//!
//! The engine never logs directly; it reports through a `LinkageObserver`.
//! `LogObserver` forwards to the `log` facade so the binary decides where
//! records go.

use std::time::Duration;

use crate::error::LinkageError;

/// Match score spread for one job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreStats {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

impl ScoreStats {
    pub fn from_scores(scores: &[f64]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }
        let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = scores.iter().sum::<f64>() / scores.len() as f64;
        Some(Self { min, avg, max })
    }
}

/// Receives events from jobs. Every method has a no-op default.
///
/// `Sync` so a single observer can serve jobs running on a thread pool.
pub trait LinkageObserver: Sync {
    fn pairs_generated(&self, _job: &str, _candidates: u64, _total_possible: u64) {}

    fn full_index_warning(&self, _job: &str, _pairs: u64, _limit: u64) {}

    fn rule_skipped(&self, _job: &str, _field: &str, _method: &str) {}

    /// Per-label mean score over all candidate pairs.
    fn features_computed(&self, _job: &str, _means: &[(String, f64)]) {}

    fn matches_found(&self, _job: &str, _count: usize, _stats: Option<ScoreStats>) {}

    fn job_failed(&self, _job: &str, _error: &LinkageError) {}

    fn job_finished(&self, _job: &str, _elapsed: Duration) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl LinkageObserver for NoopObserver {}

/// Writes events as `log` records under the `reclink` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl LinkageObserver for LogObserver {
    fn pairs_generated(&self, job: &str, candidates: u64, total_possible: u64) {
        log::info!(
            target: "reclink",
            "[{job}] {candidates} candidate pairs out of {total_possible} possible"
        );
    }

    fn full_index_warning(&self, job: &str, pairs: u64, limit: u64) {
        log::warn!(
            target: "reclink",
            "[{job}] full indexing will generate {pairs} pairs (warning threshold {limit})"
        );
    }

    fn rule_skipped(&self, job: &str, field: &str, method: &str) {
        log::warn!(
            target: "reclink",
            "[{job}] unsupported comparison method '{method}' for field '{field}', skipped"
        );
    }

    fn features_computed(&self, job: &str, means: &[(String, f64)]) {
        for (label, mean) in means {
            log::info!(target: "reclink", "[{job}] {label}: mean score {mean:.3}");
        }
    }

    fn matches_found(&self, job: &str, count: usize, stats: Option<ScoreStats>) {
        match stats {
            Some(s) => log::info!(
                target: "reclink",
                "[{job}] {count} matches (score min {:.2}, avg {:.2}, max {:.2})",
                s.min,
                s.avg,
                s.max
            ),
            None => log::info!(target: "reclink", "[{job}] no matches"),
        }
    }

    fn job_failed(&self, job: &str, error: &LinkageError) {
        log::error!(target: "reclink", "[{job}] {error}");
    }

    fn job_finished(&self, job: &str, elapsed: Duration) {
        log::info!(target: "reclink", "[{job}] finished in {} ms", elapsed.as_millis());
    }
}
