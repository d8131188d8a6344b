//! Adaptive learning over settled predictions: weight updates, calibration,
//! per-model performance and drift.

pub mod calibration;
pub mod drift;
pub mod performance;

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::LearningConfig;
use crate::engine::{ModelWeights, WeightStore};
use crate::error::{EngineError, Result};
use crate::models::PredictionRecord;

pub use calibration::{CalibrationBin, Recalibration, RecalibrationFit};
pub use drift::{DriftReport, DriftSeverity};
pub use performance::{ModelKind, ModelPerformance};

/// Everything the learning system knows, in one serializable snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub weights: ModelWeights,
    pub records: usize,
    pub brier_score: f64,
    pub log_loss: f64,
    pub calibration: Vec<CalibrationBin>,
    pub models: Vec<ModelPerformance>,
    pub drift: Option<DriftReport>,
    /// Logistic correction of the blended probability, once there is
    /// enough mixed history to fit one
    pub recalibration: Option<RecalibrationFit>,
}

pub struct LearningSystem {
    config: LearningConfig,
    weights: Arc<WeightStore>,
    history: RwLock<VecDeque<PredictionRecord>>,
}

impl LearningSystem {
    pub fn new(config: LearningConfig, weights: Arc<WeightStore>) -> Self {
        LearningSystem {
            history: RwLock::new(VecDeque::with_capacity(config.history_cap.min(1024))),
            config,
            weights,
        }
    }

    pub fn weights(&self) -> Arc<ModelWeights> {
        self.weights.snapshot()
    }

    /// Append a settled prediction, dropping the oldest beyond the cap.
    pub fn record(&self, record: PredictionRecord) {
        self.extend(std::iter::once(record));
    }

    pub fn extend(&self, records: impl IntoIterator<Item = PredictionRecord>) {
        let mut history = self.history.write().unwrap_or_else(|e| e.into_inner());
        history.extend(records);
        let cap = self.config.history_cap;
        if history.len() > cap {
            let excess = history.len() - cap;
            history.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.history.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the history, oldest first.
    pub fn history(&self) -> Vec<PredictionRecord> {
        self.history
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    fn samples(&self) -> Vec<(f64, f64)> {
        self.history
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|r| (r.predicted_probability, r.target()))
            .collect()
    }

    /// One gradient step on the shared weights from the most recent window.
    ///
    /// For each model the gradient is the mean of
    /// `(final − outcome) × weight × model probability`; the stepped weights
    /// are renormalised and swapped in as a whole.
    pub fn update_model_weights(&self) -> Result<Arc<ModelWeights>> {
        let window: Vec<PredictionRecord> = {
            let history = self.history.read().unwrap_or_else(|e| e.into_inner());
            if history.len() < self.config.min_records {
                return Err(EngineError::InsufficientData {
                    qualified: history.len(),
                    required: self.config.min_records,
                });
            }
            let start = history.len().saturating_sub(self.config.window);
            history.iter().skip(start).cloned().collect()
        };

        let lr = self.config.learning_rate;
        let updated = self.weights.update_with(|current| {
            let w = current.as_array();
            let mut grad = [0.0f64; 4];
            for record in &window {
                let error = record.predicted_probability - record.target();
                let preds = record.features.as_array();
                for m in 0..4 {
                    grad[m] += error * w[m] * preds[m];
                }
            }
            let n = window.len() as f64;
            let mut next = [0.0f64; 4];
            for m in 0..4 {
                next[m] = w[m] - lr * grad[m] / n;
            }
            ModelWeights::from_array(next).normalized()
        });
        info!(
            "Model weights updated from {} records: stat {:.3} ctx {:.3} ml {:.3} market {:.3}",
            window.len(),
            updated.statistical,
            updated.contextual,
            updated.machine_learning,
            updated.market
        );
        Ok(updated)
    }

    pub fn brier_score(&self) -> f64 {
        calibration::brier_score(&self.samples())
    }

    pub fn log_loss(&self) -> f64 {
        calibration::log_loss(&self.samples())
    }

    pub fn calibration_curve(&self) -> Vec<CalibrationBin> {
        calibration::calibration_curve(&self.samples(), self.config.calibration_bins)
    }

    /// Performance of each layer and of the blended probability.
    pub fn model_performance(&self) -> Vec<ModelPerformance> {
        let history = self.history();
        ModelKind::LAYERS
            .iter()
            .chain(std::iter::once(&ModelKind::Ensemble))
            .map(|kind| performance::evaluate_model(*kind, &history))
            .collect()
    }

    pub fn detect_drift(&self) -> Option<DriftReport> {
        let report = drift::detect_drift(&self.history(), self.config.drift_window)?;
        if let Some(severity) = report.severity {
            warn!(
                "Concept drift ({:?}): accuracy {:.3} -> {:.3}, Brier {:.3} -> {:.3}",
                severity,
                report.previous_accuracy,
                report.recent_accuracy,
                report.previous_brier,
                report.recent_brier
            );
        }
        Some(report)
    }

    /// Recalibration of the blended probability over the whole history.
    pub fn fit_recalibration(&self) -> Option<RecalibrationFit> {
        let fit = calibration::fit_recalibration(&self.samples())?;
        info!(
            "Recalibration slope {:.3} intercept {:.3}: log loss {:.4} -> {:.4}",
            fit.recalibration.slope,
            fit.recalibration.intercept,
            fit.log_loss_before,
            fit.log_loss_after
        );
        Some(fit)
    }

    pub fn report(&self) -> PerformanceReport {
        PerformanceReport {
            weights: *self.weights(),
            records: self.len(),
            brier_score: self.brier_score(),
            log_loss: self.log_loss(),
            calibration: self.calibration_curve(),
            models: self.model_performance(),
            drift: self.detect_drift(),
            recalibration: self.fit_recalibration(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LayerProbabilities;
    use approx::assert_relative_eq;

    fn record(won: bool) -> PredictionRecord {
        PredictionRecord {
            game_id: "g".into(),
            sport: None,
            predicted_probability: if won { 0.7 } else { 0.3 },
            actual_outcome: won,
            odds: 2.0,
            model_weights: ModelWeights::default(),
            features: LayerProbabilities {
                statistical: 0.6,
                contextual: 0.6,
                machine_learning: 0.6,
                market: 0.6,
            },
            recorded_at: None,
        }
    }

    fn system(cap: usize) -> LearningSystem {
        LearningSystem::new(
            LearningConfig {
                history_cap: cap,
                window: cap.min(500),
                ..Default::default()
            },
            Arc::new(WeightStore::default()),
        )
    }

    #[test]
    fn history_is_capped() {
        let learning = system(50);
        learning.extend((0..80).map(|i| record(i % 2 == 0)));
        assert_eq!(learning.len(), 50);
    }

    #[test]
    fn update_requires_minimum_history() {
        let learning = system(1000);
        learning.extend((0..99).map(|i| record(i % 2 == 0)));
        assert!(matches!(
            learning.update_model_weights(),
            Err(EngineError::InsufficientData {
                qualified: 99,
                required: 100
            })
        ));
        learning.record(record(true));
        let updated = learning.update_model_weights().unwrap();
        assert_relative_eq!(updated.sum(), 1.0, epsilon = 1e-9);
        assert_eq!(*learning.weights(), *updated);
    }

    #[test]
    fn report_covers_every_model() {
        let learning = system(1000);
        learning.extend((0..40).map(|i| record(i % 2 == 0)));
        let report = learning.report();
        assert_eq!(report.records, 40);
        assert_eq!(report.models.len(), 5);
        assert_eq!(report.calibration.len(), 10);
        assert!(report.drift.is_none());
        assert!((0.0..=1.0).contains(&report.brier_score));
    }

    #[test]
    fn report_recalibrates_overconfident_history() {
        let learning = system(1000);
        // forecasts of 0.7 win 60% of the time, forecasts of 0.3 win 40%
        learning.extend((0..20).map(|i| {
            let mut r = record(true);
            r.actual_outcome = i < 12;
            r
        }));
        learning.extend((0..20).map(|i| {
            let mut r = record(false);
            r.actual_outcome = i < 8;
            r
        }));

        let fit = learning.report().recalibration.unwrap();
        let expected_slope = (0.6f64 / 0.4).ln() / (0.7f64 / 0.3).ln();
        assert_relative_eq!(fit.recalibration.slope, expected_slope, epsilon = 0.02);
        assert_relative_eq!(fit.recalibration.intercept, 0.0, epsilon = 0.02);
        assert_relative_eq!(fit.recalibration.apply(0.7), 0.6, epsilon = 0.01);
        assert!(fit.log_loss_after < fit.log_loss_before);
        assert_eq!(fit.samples, 40);
    }
}
