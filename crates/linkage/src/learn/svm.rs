use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::classify::MatchClassifier;
use crate::error::LinkageError;
use crate::learn::kmeans::two_means;
use crate::model::FeatureMatrix;

const PSEUDO_LABEL_ITERS: usize = 100;

/// Linear SVM trained with Pegasos on k-means pseudo-labels.
///
/// No external training labels exist in an unsupervised run, so the two-means
/// split provides the targets and the SVM smooths its decision boundary.
#[derive(Debug, Clone)]
pub struct SvmClassifier {
    epochs: usize,
    lambda: f64,
    seed: u64,
    weights: Option<Vec<f64>>,
}

impl SvmClassifier {
    pub fn new(epochs: usize, lambda: f64, seed: u64) -> Self {
        Self {
            epochs,
            lambda,
            seed,
            weights: None,
        }
    }

    /// Learned weights; the last entry is the bias. `None` when training was
    /// skipped.
    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }
}

impl MatchClassifier for SvmClassifier {
    fn name(&self) -> &'static str {
        "svm"
    }

    fn fit_predict(&mut self, features: &FeatureMatrix) -> Result<Vec<bool>, LinkageError> {
        self.weights = None;
        let rows = &features.rows;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let (pseudo, _) = two_means(rows, features.width(), PSEUDO_LABEL_ITERS);
        if pseudo.iter().all(|&l| l) || pseudo.iter().all(|&l| !l) {
            return Ok(pseudo);
        }

        let w = pegasos(rows, &pseudo, self.epochs, self.lambda, self.seed);
        let labels = rows.iter().map(|r| decision(&w, r) > 0.0).collect();
        self.weights = Some(w);
        Ok(labels)
    }
}

/// `w · [x, 1]`
fn decision(w: &[f64], x: &[f64]) -> f64 {
    let bias = w.last().copied().unwrap_or(0.0);
    w.iter().zip(x).map(|(a, b)| a * b).sum::<f64>() + bias
}

fn pegasos(rows: &[Vec<f64>], labels: &[bool], epochs: usize, lambda: f64, seed: u64) -> Vec<f64> {
    let width = rows[0].len();
    let mut w = vec![0.0; width + 1];
    let mut rng = StdRng::seed_from_u64(seed);
    let radius = 1.0 / lambda.sqrt();

    for t in 1..=epochs * rows.len() {
        let i = rng.gen_range(0..rows.len());
        let x = &rows[i];
        let y = if labels[i] { 1.0 } else { -1.0 };
        let eta = 1.0 / (lambda * t as f64);
        let margin = y * decision(&w, x);

        let shrink = 1.0 - eta * lambda;
        w.iter_mut().for_each(|v| *v *= shrink);
        if margin < 1.0 {
            for (v, xk) in w.iter_mut().zip(x) {
                *v += eta * y * xk;
            }
            w[width] += eta * y;
        }

        let norm = w.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > radius {
            let scale = radius / norm;
            w.iter_mut().for_each(|v| *v *= scale);
        }
    }
    w
}
