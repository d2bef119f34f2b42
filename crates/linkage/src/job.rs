use std::time::Instant;

use crate::assemble::{assemble_dedup, assemble_linkage};
use crate::classify::build_classifier;
use crate::compare::{compare_dedup, compare_linkage};
use crate::config::LinkageSettings;
use crate::error::LinkageError;
use crate::index::{index_dedup, index_linkage, CandidateSet};
use crate::model::{Dataset, FeatureMatrix, LinkageResult};
use crate::observer::{LinkageObserver, ScoreStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Created,
    Indexed,
    Compared,
    Classified,
    Assembled,
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Indexed => "indexed",
            Self::Compared => "compared",
            Self::Classified => "classified",
            Self::Assembled => "assembled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy)]
enum Inputs<'a> {
    Linkage { left: &'a Dataset, right: &'a Dataset },
    Dedup { data: &'a Dataset },
}

/// One pairwise linkage or one deduplication, driven stage by stage.
///
/// Owns every intermediate (candidates, features, labels); nothing is shared
/// with other jobs.
pub struct LinkageJob<'a> {
    name: String,
    inputs: Inputs<'a>,
    settings: &'a LinkageSettings,
    observer: &'a dyn LinkageObserver,
    stage: JobStage,
    candidates: Option<CandidateSet>,
    features: Option<FeatureMatrix>,
    predictions: Option<Vec<bool>>,
}

impl<'a> LinkageJob<'a> {
    pub fn linkage(
        left: &'a Dataset,
        right: &'a Dataset,
        settings: &'a LinkageSettings,
        observer: &'a dyn LinkageObserver,
    ) -> Self {
        Self::with_inputs(
            format!("{}_{}", left.name, right.name),
            Inputs::Linkage { left, right },
            settings,
            observer,
        )
    }

    pub fn dedup(
        data: &'a Dataset,
        settings: &'a LinkageSettings,
        observer: &'a dyn LinkageObserver,
    ) -> Self {
        Self::with_inputs(
            format!("{}_dedup", data.name),
            Inputs::Dedup { data },
            settings,
            observer,
        )
    }

    fn with_inputs(
        name: String,
        inputs: Inputs<'a>,
        settings: &'a LinkageSettings,
        observer: &'a dyn LinkageObserver,
    ) -> Self {
        Self {
            name,
            inputs,
            settings,
            observer,
            stage: JobStage::Created,
            candidates: None,
            features: None,
            predictions: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> JobStage {
        self.stage
    }

    fn require(&self, expected: JobStage, action: &str) -> Result<(), LinkageError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(LinkageError::State(format!(
                "[{}] cannot {action} at stage '{}' (needs '{expected}')",
                self.name, self.stage
            )))
        }
    }

    pub fn index(&mut self) -> Result<&CandidateSet, LinkageError> {
        self.require(JobStage::Created, "index")?;
        let cfg = &self.settings.indexing;
        let set = match self.inputs {
            Inputs::Linkage { left, right } => {
                index_linkage(left, right, cfg, &self.name, self.observer)?
            }
            Inputs::Dedup { data } => index_dedup(data, cfg, &self.name, self.observer)?,
        };
        self.observer
            .pairs_generated(&self.name, set.stats.candidates, set.stats.total_possible);
        self.stage = JobStage::Indexed;
        Ok(self.candidates.insert(set))
    }

    pub fn compare(&mut self) -> Result<&FeatureMatrix, LinkageError> {
        self.require(JobStage::Indexed, "compare")?;
        let pairs = self
            .candidates
            .as_ref()
            .map(|c| c.pairs.as_slice())
            .unwrap_or_default();
        let rules = &self.settings.comparison;
        let matrix = match self.inputs {
            Inputs::Linkage { left, right } => {
                compare_linkage(left, right, pairs, rules, &self.name, self.observer)?
            }
            Inputs::Dedup { data } => compare_dedup(data, pairs, rules, &self.name, self.observer)?,
        };

        let means: Vec<(String, f64)> = matrix
            .labels
            .iter()
            .enumerate()
            .map(|(k, label)| (label.clone(), matrix.column_mean(k)))
            .collect();
        self.observer.features_computed(&self.name, &means);

        self.stage = JobStage::Compared;
        Ok(self.features.insert(matrix))
    }

    /// Returns the number of rows labeled as matches.
    pub fn classify(&mut self) -> Result<usize, LinkageError> {
        self.require(JobStage::Compared, "classify")?;
        let Some(features) = self.features.as_ref() else {
            return Err(LinkageError::State(format!("[{}] no features", self.name)));
        };

        let mut classifier = build_classifier(&self.settings.classification);
        let labels = classifier.fit_predict(features)?;

        let scores: Vec<f64> = labels
            .iter()
            .enumerate()
            .filter(|(_, &hit)| hit)
            .map(|(i, _)| features.row_sum(i))
            .collect();
        self.observer
            .matches_found(&self.name, scores.len(), ScoreStats::from_scores(&scores));

        self.predictions = Some(labels);
        self.stage = JobStage::Classified;
        Ok(scores.len())
    }

    /// Build the result and release the job's intermediates.
    pub fn assemble(&mut self) -> Result<LinkageResult, LinkageError> {
        self.require(JobStage::Classified, "assemble")?;
        let stats = self.candidates.take().map(|c| c.stats);
        let features = self.features.take().unwrap_or_default();
        let predictions = self.predictions.take().unwrap_or_default();

        let result = match self.inputs {
            Inputs::Linkage { left, right } => {
                assemble_linkage(left, right, &features, &predictions, stats)?
            }
            Inputs::Dedup { data } => assemble_dedup(data, &features, &predictions, stats)?,
        };
        self.stage = JobStage::Assembled;
        Ok(result)
    }

    /// All four stages in order.
    pub fn run(mut self) -> Result<LinkageResult, LinkageError> {
        let started = Instant::now();
        let result = self.run_stages();
        match &result {
            Ok(_) => self.observer.job_finished(&self.name, started.elapsed()),
            Err(e) => self.observer.job_failed(&self.name, e),
        }
        result
    }

    fn run_stages(&mut self) -> Result<LinkageResult, LinkageError> {
        self.index()?;
        self.compare()?;
        self.classify()?;
        self.assemble()
    }
}

/// Link two datasets end to end.
pub fn run_linkage(
    left: &Dataset,
    right: &Dataset,
    settings: &LinkageSettings,
    observer: &dyn LinkageObserver,
) -> Result<LinkageResult, LinkageError> {
    LinkageJob::linkage(left, right, settings, observer).run()
}

/// Find duplicate records within one dataset.
pub fn run_dedup(
    data: &Dataset,
    settings: &LinkageSettings,
    observer: &dyn LinkageObserver,
) -> Result<LinkageResult, LinkageError> {
    LinkageJob::dedup(data, settings, observer).run()
}
