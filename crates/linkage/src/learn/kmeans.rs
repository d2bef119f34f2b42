use crate::classify::MatchClassifier;
use crate::error::LinkageError;
use crate::model::FeatureMatrix;

/// Two-cluster Lloyd's k-means. The cluster seeded at all-ones is the match
/// cluster.
#[derive(Debug, Clone)]
pub struct KMeansClassifier {
    max_iter: usize,
    centroids: Option<[Vec<f64>; 2]>,
}

impl KMeansClassifier {
    pub fn new(max_iter: usize) -> Self {
        Self {
            max_iter,
            centroids: None,
        }
    }

    /// `[non-match, match]` centroids from the last fit.
    pub fn centroids(&self) -> Option<&[Vec<f64>; 2]> {
        self.centroids.as_ref()
    }
}

impl MatchClassifier for KMeansClassifier {
    fn name(&self) -> &'static str {
        "kmeans"
    }

    fn fit_predict(&mut self, features: &FeatureMatrix) -> Result<Vec<bool>, LinkageError> {
        let (labels, centroids) = two_means(&features.rows, features.width(), self.max_iter);
        self.centroids = Some(centroids);
        Ok(labels)
    }
}

fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Ties go to the non-match cluster.
fn assign(row: &[f64], centroids: &[Vec<f64>; 2]) -> bool {
    sq_dist(row, &centroids[1]) < sq_dist(row, &centroids[0])
}

pub(crate) fn two_means(rows: &[Vec<f64>], width: usize, max_iter: usize) -> (Vec<bool>, [Vec<f64>; 2]) {
    let mut centroids = [vec![0.0; width], vec![1.0; width]];
    let mut labels: Vec<bool> = rows.iter().map(|r| assign(r, &centroids)).collect();

    for _ in 0..max_iter {
        for (cluster, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&Vec<f64>> = rows
                .iter()
                .zip(&labels)
                .filter(|(_, &l)| l == (cluster == 1))
                .map(|(r, _)| r)
                .collect();
            // empty cluster keeps its previous centroid
            if members.is_empty() {
                continue;
            }
            for (k, c) in centroid.iter_mut().enumerate() {
                *c = members.iter().map(|r| r[k]).sum::<f64>() / members.len() as f64;
            }
        }

        let next: Vec<bool> = rows.iter().map(|r| assign(r, &centroids)).collect();
        if next == labels {
            break;
        }
        labels = next;
    }

    (labels, centroids)
}
