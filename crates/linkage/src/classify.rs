use crate::config::ClassificationConfig;
use crate::error::LinkageError;
use crate::learn::{EcmClassifier, KMeansClassifier, SvmClassifier};
use crate::model::FeatureMatrix;

/// Labels each feature row as match / non-match.
///
/// Implementations may learn from the whole matrix before predicting, so the
/// label of one row can depend on every other row.
pub trait MatchClassifier: Send {
    fn name(&self) -> &'static str;

    /// One label per row, aligned with `features.rows`.
    fn fit_predict(&mut self, features: &FeatureMatrix) -> Result<Vec<bool>, LinkageError>;
}

/// Build the classifier named by the config.
pub fn build_classifier(config: &ClassificationConfig) -> Box<dyn MatchClassifier> {
    match *config {
        ClassificationConfig::Threshold { threshold } => {
            Box::new(ThresholdClassifier::new(threshold))
        }
        ClassificationConfig::KMeans { max_iter } => Box::new(KMeansClassifier::new(max_iter)),
        ClassificationConfig::Ecm {
            max_iter,
            tolerance,
            binarize_at,
        } => Box::new(EcmClassifier::new(max_iter, tolerance, binarize_at)),
        ClassificationConfig::Svm {
            epochs,
            lambda,
            seed,
        } => Box::new(SvmClassifier::new(epochs, lambda, seed)),
    }
}

/// Match iff the row sum reaches `threshold × width`.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdClassifier {
    threshold: f64,
}

impl ThresholdClassifier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn min_score(&self, width: usize) -> f64 {
        self.threshold * width as f64
    }
}

impl MatchClassifier for ThresholdClassifier {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn fit_predict(&mut self, features: &FeatureMatrix) -> Result<Vec<bool>, LinkageError> {
        let min_score = self.min_score(features.width());
        Ok((0..features.len())
            .map(|i| features.row_sum(i) >= min_score)
            .collect())
    }
}
