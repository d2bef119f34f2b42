use rayon::prelude::*;

use crate::config::LinkageSettings;
use crate::error::LinkageError;
use crate::job::{run_dedup, run_linkage};
use crate::model::{Dataset, LinkageResult};
use crate::observer::LinkageObserver;

/// Result of one dedup or one pairwise comparison.
#[derive(Debug)]
pub struct ComparisonOutcome {
    /// `{name}_dedup` or `{left}_{right}`.
    pub name: String,
    pub datasets: Vec<String>,
    /// Empty when `error` is set.
    pub result: LinkageResult,
    pub error: Option<LinkageError>,
}

impl ComparisonOutcome {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn match_count(&self) -> usize {
        self.result.matches.len()
    }
}

/// Every comparison from one orchestrated run, in combination order.
#[derive(Debug, Default)]
pub struct MultiLinkageResult {
    pub outcomes: Vec<ComparisonOutcome>,
}

impl MultiLinkageResult {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    /// Comparisons that produced at least one match.
    pub fn with_results(&self) -> usize {
        self.outcomes.iter().filter(|o| o.match_count() > 0).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn total_matches(&self) -> usize {
        self.outcomes.iter().map(ComparisonOutcome::match_count).sum()
    }

    pub fn get(&self, name: &str) -> Option<&LinkageResult> {
        self.outcomes.iter().find(|o| o.name == name).map(|o| &o.result)
    }

    pub fn outcome(&self, name: &str) -> Option<&ComparisonOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.outcomes.iter().map(|o| o.name.as_str()).collect()
    }

    pub fn is_partial(&self) -> bool {
        self.failed() > 0
    }
}

/// One dataset: deduplicate it. Two or more: link every unordered pair.
pub fn run_multi(
    datasets: &[Dataset],
    settings: &LinkageSettings,
    observer: &dyn LinkageObserver,
) -> Result<MultiLinkageResult, LinkageError> {
    run_multi_with(datasets, settings, observer, run_linkage)
}

/// `run_multi` with a caller-supplied pairwise runner.
pub fn run_multi_with<F>(
    datasets: &[Dataset],
    settings: &LinkageSettings,
    observer: &dyn LinkageObserver,
    runner: F,
) -> Result<MultiLinkageResult, LinkageError>
where
    F: Fn(&Dataset, &Dataset, &LinkageSettings, &dyn LinkageObserver) -> Result<LinkageResult, LinkageError>
        + Sync,
{
    match datasets {
        [] => Err(LinkageError::config("at least one dataset is required")),
        [single] => {
            let name = format!("{}_dedup", single.name);
            let outcome = settle(
                name,
                vec![single.name.clone()],
                run_dedup(single, settings, observer),
            );
            Ok(MultiLinkageResult {
                outcomes: vec![outcome],
            })
        }
        _ => {
            let combos: Vec<(usize, usize)> = (0..datasets.len())
                .flat_map(|i| (i + 1..datasets.len()).map(move |j| (i, j)))
                .collect();

            let one = |&(i, j): &(usize, usize)| {
                let (left, right) = (&datasets[i], &datasets[j]);
                let name = format!("{}_{}", left.name, right.name);
                let result = runner(left, right, settings, observer).map(|mut r| {
                    let (lp, rp) = (format!("{}_", left.name), format!("{}_", right.name));
                    r.table.rename_prefixes(&[("source_", lp.as_str()), ("target_", rp.as_str())]);
                    r
                });
                settle(name, vec![left.name.clone(), right.name.clone()], result)
            };

            let outcomes = if settings.parallel {
                combos.par_iter().map(one).collect()
            } else {
                combos.iter().map(one).collect()
            };
            Ok(MultiLinkageResult { outcomes })
        }
    }
}

fn settle(
    name: String,
    datasets: Vec<String>,
    result: Result<LinkageResult, LinkageError>,
) -> ComparisonOutcome {
    match result {
        Ok(result) => ComparisonOutcome {
            name,
            datasets,
            result,
            error: None,
        },
        Err(source) => {
            let error = match source {
                e @ LinkageError::PairJob { .. } => e,
                e => LinkageError::PairJob {
                    comparison: name.clone(),
                    source: Box::new(e),
                },
            };
            ComparisonOutcome {
                name,
                datasets,
                result: LinkageResult::empty(),
                error: Some(error),
            }
        }
    }
}
