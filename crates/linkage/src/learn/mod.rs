//! Unsupervised classifiers. Each one learns from the whole feature matrix
//! it is asked to label; results are reproducible for a fixed config.

mod ecm;
mod kmeans;
mod svm;

pub use ecm::EcmClassifier;
pub use kmeans::KMeansClassifier;
pub use svm::SvmClassifier;

#[cfg(test)]
pub(crate) mod testutil {
    use crate::model::{CandidatePair, FeatureMatrix};

    /// `n_match` all-high rows followed by `n_non` all-low rows.
    pub fn two_clusters(n_match: usize, n_non: usize, width: usize) -> FeatureMatrix {
        let mut rows = Vec::new();
        for i in 0..n_match {
            rows.push((0..width).map(|k| if (i + k) % 5 == 0 { 0.8 } else { 1.0 }).collect());
        }
        for i in 0..n_non {
            rows.push((0..width).map(|k| if (i + k) % 4 == 0 { 0.2 } else { 0.0 }).collect());
        }
        FeatureMatrix {
            labels: (0..width).map(|k| format!("f{k}")).collect(),
            exact: vec![false; width],
            pairs: (0..rows.len()).map(|i| CandidatePair::new(i, i)).collect(),
            rows,
        }
    }
}
