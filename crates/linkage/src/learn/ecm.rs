use crate::classify::MatchClassifier;
use crate::error::LinkageError;
use crate::model::FeatureMatrix;

const PROB_FLOOR: f64 = 1e-6;

/// Fellegi-Sunter model fitted by expectation-maximization over binarized
/// agreement patterns.
#[derive(Debug, Clone)]
pub struct EcmClassifier {
    max_iter: usize,
    tolerance: f64,
    binarize_at: f64,
    params: Option<EcmParams>,
}

/// Fitted m/u probabilities per feature plus the match prior.
#[derive(Debug, Clone, PartialEq)]
pub struct EcmParams {
    pub m: Vec<f64>,
    pub u: Vec<f64>,
    pub p: f64,
    pub iterations: usize,
}

impl EcmClassifier {
    pub fn new(max_iter: usize, tolerance: f64, binarize_at: f64) -> Self {
        Self {
            max_iter,
            tolerance,
            binarize_at,
            params: None,
        }
    }

    pub fn params(&self) -> Option<&EcmParams> {
        self.params.as_ref()
    }
}

impl MatchClassifier for EcmClassifier {
    fn name(&self) -> &'static str {
        "ecm"
    }

    fn fit_predict(&mut self, features: &FeatureMatrix) -> Result<Vec<bool>, LinkageError> {
        let width = features.width();
        let agree: Vec<Vec<bool>> = features
            .rows
            .iter()
            .map(|r| r.iter().map(|v| *v >= self.binarize_at).collect())
            .collect();

        let mut params = EcmParams {
            m: vec![0.9; width],
            u: vec![0.1; width],
            p: 0.1,
            iterations: 0,
        };
        if agree.is_empty() {
            self.params = Some(params);
            return Ok(Vec::new());
        }

        let mut posterior = e_step(&agree, &params);
        for iter in 1..=self.max_iter {
            let next = m_step(&agree, &posterior, width);
            let delta = max_change(&params, &next);
            params = EcmParams { iterations: iter, ..next };
            posterior = e_step(&agree, &params);
            if delta < self.tolerance {
                break;
            }
        }

        self.params = Some(params);
        Ok(posterior.into_iter().map(|g| g >= 0.5).collect())
    }
}

/// Posterior match probability per row.
fn e_step(agree: &[Vec<bool>], params: &EcmParams) -> Vec<f64> {
    agree
        .iter()
        .map(|row| {
            let mut log_m = params.p.ln();
            let mut log_u = (1.0 - params.p).ln();
            for (k, &a) in row.iter().enumerate() {
                if a {
                    log_m += params.m[k].ln();
                    log_u += params.u[k].ln();
                } else {
                    log_m += (1.0 - params.m[k]).ln();
                    log_u += (1.0 - params.u[k]).ln();
                }
            }
            // logistic of the log-likelihood ratio
            1.0 / (1.0 + (log_u - log_m).exp())
        })
        .collect()
}

fn m_step(agree: &[Vec<bool>], posterior: &[f64], width: usize) -> EcmParams {
    let n = agree.len() as f64;
    let g_sum: f64 = posterior.iter().sum();
    let ng_sum = n - g_sum;

    let mut m = vec![0.0; width];
    let mut u = vec![0.0; width];
    for (row, g) in agree.iter().zip(posterior) {
        for (k, &a) in row.iter().enumerate() {
            if a {
                m[k] += g;
                u[k] += 1.0 - g;
            }
        }
    }
    for k in 0..width {
        m[k] = clamp_prob(if g_sum > 0.0 { m[k] / g_sum } else { 0.0 });
        u[k] = clamp_prob(if ng_sum > 0.0 { u[k] / ng_sum } else { 0.0 });
    }

    EcmParams {
        m,
        u,
        p: clamp_prob(g_sum / n),
        iterations: 0,
    }
}

fn clamp_prob(v: f64) -> f64 {
    v.clamp(PROB_FLOOR, 1.0 - PROB_FLOOR)
}

fn max_change(a: &EcmParams, b: &EcmParams) -> f64 {
    let m = a.m.iter().zip(&b.m).map(|(x, y)| (x - y).abs());
    let u = a.u.iter().zip(&b.u).map(|(x, y)| (x - y).abs());
    m.chain(u).fold((a.p - b.p).abs(), f64::max)
}
