//! Per-model track record over the learning history.

use serde::{Deserialize, Serialize};

use super::calibration::brier_score;
use crate::models::PredictionRecord;

/// Trailing records used for the recent win rate.
const RECENT_WINDOW: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelKind {
    Statistical,
    Contextual,
    MachineLearning,
    Market,
    /// The blended final probability
    Ensemble,
}

impl ModelKind {
    pub const LAYERS: [ModelKind; 4] = [
        ModelKind::Statistical,
        ModelKind::Contextual,
        ModelKind::MachineLearning,
        ModelKind::Market,
    ];

    pub fn probability(&self, record: &PredictionRecord) -> f64 {
        let f = &record.features;
        match self {
            ModelKind::Statistical => f.statistical,
            ModelKind::Contextual => f.contextual,
            ModelKind::MachineLearning => f.machine_learning,
            ModelKind::Market => f.market,
            ModelKind::Ensemble => record.predicted_probability,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPerformance {
    pub model: ModelKind,
    pub samples: usize,
    /// Share of records where the model picked the right side of 0.5
    pub accuracy: f64,
    /// 1 − Brier score
    pub calibration: f64,
    /// Profit per unit staked on the model's value bets
    pub roi: f64,
    /// Mean over standard deviation of per-bet returns
    pub sharpe: f64,
    /// Win rate of value bets among the most recent records
    pub recent_win_rate: f64,
    pub bets: usize,
}

/// Unit-stake profit for each record where the model saw value.
fn value_bet_returns<'a>(
    model: ModelKind,
    records: impl Iterator<Item = &'a PredictionRecord>,
) -> Vec<(f64, bool)> {
    records
        .filter(|r| r.odds > 1.0 && model.probability(r) > 1.0 / r.odds)
        .map(|r| {
            let profit = if r.actual_outcome { r.odds - 1.0 } else { -1.0 };
            (profit, r.actual_outcome)
        })
        .collect()
}

pub fn evaluate_model(model: ModelKind, records: &[PredictionRecord]) -> ModelPerformance {
    let samples: Vec<(f64, f64)> = records
        .iter()
        .map(|r| (model.probability(r), r.target()))
        .collect();
    let n = samples.len();
    let accuracy = if n == 0 {
        0.0
    } else {
        samples
            .iter()
            .filter(|(p, y)| (*p > 0.5) == (*y > 0.5))
            .count() as f64
            / n as f64
    };

    let returns = value_bet_returns(model, records.iter());
    let bets = returns.len();
    let roi = if bets == 0 {
        0.0
    } else {
        returns.iter().map(|(r, _)| r).sum::<f64>() / bets as f64
    };
    let sharpe = if bets < 2 {
        0.0
    } else {
        let mean = roi;
        let var = returns.iter().map(|(r, _)| (r - mean).powi(2)).sum::<f64>() / (bets - 1) as f64;
        if var > 0.0 {
            mean / var.sqrt()
        } else {
            0.0
        }
    };

    let recent_start = records.len().saturating_sub(RECENT_WINDOW);
    let recent = value_bet_returns(model, records[recent_start..].iter());
    let recent_win_rate = if recent.is_empty() {
        0.0
    } else {
        recent.iter().filter(|(_, won)| *won).count() as f64 / recent.len() as f64
    };

    ModelPerformance {
        model,
        samples: n,
        accuracy,
        calibration: if n == 0 { 0.0 } else { 1.0 - brier_score(&samples) },
        roi,
        sharpe,
        recent_win_rate,
        bets,
    }
}
