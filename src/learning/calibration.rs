//! Probability calibration: reliability bins, Brier score, log loss and a
//! logistic recalibration of the blended probability.

use serde::{Deserialize, Serialize};

use crate::engine::layers::sigmoid;

/// Clip applied to probabilities before the log-loss logarithm.
pub const LOG_LOSS_CLIP: f64 = 0.001;
/// Settled records needed before a recalibration is fitted.
pub const MIN_RECALIBRATION_SAMPLES: usize = 30;
const NEWTON_STEPS: usize = 50;
/// Pull of the slope toward 1.0 (no rescaling).
const SLOPE_RIDGE: f64 = 1e-3;

/// Logistic map from a raw probability to a recalibrated one:
/// `sigmoid(slope × logit(p) + intercept)`. The identity is slope 1,
/// intercept 0; a slope below 1 softens overconfident forecasts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recalibration {
    pub slope: f64,
    pub intercept: f64,
}

impl Default for Recalibration {
    fn default() -> Self {
        Recalibration {
            slope: 1.0,
            intercept: 0.0,
        }
    }
}

impl Recalibration {
    pub fn apply(&self, raw: f64) -> f64 {
        sigmoid(self.slope * logit(raw) + self.intercept)
    }
}

/// A fitted recalibration and how much it helps on the history it was fitted to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalibrationFit {
    pub recalibration: Recalibration,
    pub samples: usize,
    pub log_loss_before: f64,
    pub log_loss_after: f64,
    pub brier_before: f64,
    pub brier_after: f64,
}

/// One reliability bin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    /// Mean predicted probability in the bin (bin midpoint when empty)
    pub mean_predicted: f64,
    /// Observed win frequency; `None` when the bin is empty
    pub actual_rate: Option<f64>,
}

fn logit(p: f64) -> f64 {
    let p = p.clamp(LOG_LOSS_CLIP, 1.0 - LOG_LOSS_CLIP);
    (p / (1.0 - p)).ln()
}

fn logloss(p: f64, y: f64) -> f64 {
    let p = p.clamp(LOG_LOSS_CLIP, 1.0 - LOG_LOSS_CLIP);
    -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
}

/// Mean squared error of `(predicted, outcome)` pairs. 0.0 for no samples.
pub fn brier_score(samples: &[(f64, f64)]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples
        .iter()
        .map(|(p, y)| (p.clamp(0.0, 1.0) - y).powi(2))
        .sum::<f64>()
        / samples.len() as f64
}

/// Mean cross-entropy with p clipped to [0.001, 0.999].
pub fn log_loss(samples: &[(f64, f64)]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|(p, y)| logloss(*p, *y)).sum::<f64>() / samples.len() as f64
}

/// Equal-width reliability bins over [0, 1].
pub fn calibration_curve(samples: &[(f64, f64)], bins: usize) -> Vec<CalibrationBin> {
    let bins = bins.max(1);
    let width = 1.0 / bins as f64;
    let mut sums = vec![(0usize, 0.0f64, 0.0f64); bins];
    for (p, y) in samples {
        if !p.is_finite() {
            continue;
        }
        let idx = ((p.clamp(0.0, 1.0) / width) as usize).min(bins - 1);
        let entry = &mut sums[idx];
        entry.0 += 1;
        entry.1 += p;
        entry.2 += y;
    }
    sums.into_iter()
        .enumerate()
        .map(|(i, (count, p_sum, y_sum))| {
            let lower = i as f64 * width;
            let upper = lower + width;
            CalibrationBin {
                lower,
                upper,
                count,
                mean_predicted: if count > 0 {
                    p_sum / count as f64
                } else {
                    (lower + upper) / 2.0
                },
                actual_rate: (count > 0).then(|| y_sum / count as f64),
            }
        })
        .collect()
}

/// Penalised negative log-likelihood of a slope/intercept pair.
fn objective(xs: &[(f64, f64)], slope: f64, intercept: f64) -> f64 {
    let nll: f64 = xs
        .iter()
        .map(|(x, y)| logloss(sigmoid(slope * x + intercept), *y))
        .sum();
    nll + 0.5 * SLOPE_RIDGE * (slope - 1.0).powi(2)
}

/// Fit a [`Recalibration`] by Newton's method on the logistic likelihood,
/// halving any step that does not reduce it.
///
/// `None` below [`MIN_RECALIBRATION_SAMPLES`], when every outcome is the
/// same, or when the curvature degenerates.
pub fn fit_recalibration(samples: &[(f64, f64)]) -> Option<RecalibrationFit> {
    if samples.len() < MIN_RECALIBRATION_SAMPLES {
        return None;
    }
    let wins = samples.iter().filter(|(_, y)| *y > 0.5).count();
    if wins == 0 || wins == samples.len() {
        return None;
    }

    let xs: Vec<(f64, f64)> = samples.iter().map(|(p, y)| (logit(*p), *y)).collect();
    let (mut slope, mut intercept) = (1.0f64, 0.0f64);
    let mut current = objective(&xs, slope, intercept);

    for _ in 0..NEWTON_STEPS {
        // gradient (gs, gi) and Hessian [[hss, hsi], [hsi, hii]]
        let (mut gs, mut gi) = (SLOPE_RIDGE * (slope - 1.0), 0.0);
        let (mut hss, mut hsi, mut hii) = (SLOPE_RIDGE, 0.0, 0.0);
        for (x, y) in &xs {
            let q = sigmoid(slope * x + intercept);
            let w = q * (1.0 - q);
            gs += (q - y) * x;
            gi += q - y;
            hss += w * x * x;
            hsi += w * x;
            hii += w;
        }
        let det = hss * hii - hsi * hsi;
        if !det.is_finite() || det.abs() < 1e-12 {
            return None;
        }
        let ds = (hii * gs - hsi * gi) / det;
        let di = (hss * gi - hsi * gs) / det;

        let mut step = 1.0;
        let mut moved = false;
        while step > 1e-4 {
            let (s, i) = (slope - step * ds, intercept - step * di);
            let next = objective(&xs, s, i);
            if next.is_finite() && next <= current {
                moved = (s - slope).abs() + (i - intercept).abs() > 1e-10;
                slope = s;
                intercept = i;
                current = next;
                break;
            }
            step /= 2.0;
        }
        if !moved {
            break;
        }
    }
    if !slope.is_finite() || !intercept.is_finite() {
        return None;
    }

    let recalibration = Recalibration { slope, intercept };
    let after: Vec<(f64, f64)> = samples
        .iter()
        .map(|(p, y)| (recalibration.apply(*p), *y))
        .collect();
    Some(RecalibrationFit {
        recalibration,
        samples: samples.len(),
        log_loss_before: log_loss(samples),
        log_loss_after: log_loss(&after),
        brier_before: brier_score(samples),
        brier_after: brier_score(&after),
    })
}
