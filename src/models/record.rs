use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{LayerProbabilities, PredictionOutput, Sport};
use crate::engine::ModelWeights;

/// A settled prediction, the unit of learning history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub game_id: String,
    #[serde(default)]
    pub sport: Option<Sport>,
    pub predicted_probability: f64,
    /// Whether the predicted selection won
    pub actual_outcome: bool,
    /// Decimal price the selection was taken at
    pub odds: f64,
    /// Weights in force when the prediction was made
    pub model_weights: ModelWeights,
    /// Per-model probabilities, the features the weight update learns from
    pub features: LayerProbabilities,
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl PredictionRecord {
    pub fn from_prediction(p: &PredictionOutput, actual_outcome: bool) -> Self {
        PredictionRecord {
            game_id: p.game_id.clone(),
            sport: Some(p.sport),
            predicted_probability: p.final_probability,
            actual_outcome,
            odds: p.odds,
            model_weights: p.weights,
            features: p.layers,
            recorded_at: Some(Utc::now()),
        }
    }

    /// 1.0 for a win, 0.0 otherwise.
    pub fn target(&self) -> f64 {
        if self.actual_outcome {
            1.0
        } else {
            0.0
        }
    }
}
