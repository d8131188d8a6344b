//! Concept drift: the latest window of settled predictions against the one
//! before it.

use serde::{Deserialize, Serialize};

use super::calibration::brier_score;
use crate::models::PredictionRecord;

/// Accuracy drop that flags drift.
const ACCURACY_DROP: f64 = 0.05;
/// Brier increase that flags drift.
const BRIER_RISE: f64 = 0.03;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftSeverity {
    Low,
    Medium,
    High,
}

impl DriftSeverity {
    pub fn recommendation(&self) -> &'static str {
        match self {
            DriftSeverity::High => {
                "Suspend automated bundles and retrain; recent performance has collapsed"
            }
            DriftSeverity::Medium => {
                "Run a weight update and recalibrate before the next bundle cycle"
            }
            DriftSeverity::Low => "Monitor; consider raising the minimum confidence threshold",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    pub detected: bool,
    pub severity: Option<DriftSeverity>,
    pub recent_accuracy: f64,
    pub previous_accuracy: f64,
    pub recent_brier: f64,
    pub previous_brier: f64,
    /// previous − recent accuracy; positive is worse
    pub accuracy_drop: f64,
    /// recent − previous Brier; positive is worse
    pub brier_rise: f64,
    pub recommendation: Option<String>,
}

fn window_stats(records: &[PredictionRecord]) -> (f64, f64) {
    let samples: Vec<(f64, f64)> = records
        .iter()
        .map(|r| (r.predicted_probability, r.target()))
        .collect();
    let correct = samples
        .iter()
        .filter(|(p, y)| (*p > 0.5) == (*y > 0.5))
        .count();
    let accuracy = if samples.is_empty() {
        0.0
    } else {
        correct as f64 / samples.len() as f64
    };
    (accuracy, brier_score(&samples))
}

/// Compare the last `window` records with the `window` before them. `None`
/// until there are two full windows.
pub fn detect_drift(records: &[PredictionRecord], window: usize) -> Option<DriftReport> {
    if window == 0 || records.len() < window * 2 {
        return None;
    }
    let end = records.len();
    let recent = &records[end - window..];
    let previous = &records[end - 2 * window..end - window];
    let (recent_accuracy, recent_brier) = window_stats(recent);
    let (previous_accuracy, previous_brier) = window_stats(previous);
    let accuracy_drop = previous_accuracy - recent_accuracy;
    let brier_rise = recent_brier - previous_brier;

    let detected = accuracy_drop > ACCURACY_DROP || brier_rise > BRIER_RISE;
    let severity = detected.then(|| {
        if accuracy_drop > 0.15 || brier_rise > 0.10 {
            DriftSeverity::High
        } else if accuracy_drop > 0.10 || brier_rise > 0.06 {
            DriftSeverity::Medium
        } else {
            DriftSeverity::Low
        }
    });

    Some(DriftReport {
        detected,
        severity,
        recent_accuracy,
        previous_accuracy,
        recent_brier,
        previous_brier,
        accuracy_drop,
        brier_rise,
        recommendation: severity.map(|s| s.recommendation().to_string()),
    })
}
