use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Sport;
use crate::engine::bayesian::{MarketComparison, OutcomeProbabilities, PosteriorSummary};
use crate::engine::market_efficiency::{ArbitrageCheck, ClosingLineValue, MarketSignal};
use crate::engine::ModelWeights;

/// Home-win probability reported by each layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerProbabilities {
    pub statistical: f64,
    pub contextual: f64,
    pub machine_learning: f64,
    pub market: f64,
}

impl LayerProbabilities {
    /// Same order as `ModelWeights::as_array`.
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.statistical,
            self.contextual,
            self.machine_learning,
            self.market,
        ]
    }

    pub fn weighted(&self, weights: &ModelWeights) -> f64 {
        self.as_array()
            .iter()
            .zip(weights.as_array().iter())
            .map(|(p, w)| p * w)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    NoBet,
    Pass,
    SmallStake,
    Recommended,
    StrongBet,
}

impl Recommendation {
    /// Threshold table over (edge, confidence 0–100).
    pub fn from_edge(edge: f64, confidence: f64) -> Self {
        if edge > 0.10 && confidence >= 75.0 {
            Recommendation::StrongBet
        } else if edge > 0.05 && confidence >= 65.0 {
            Recommendation::Recommended
        } else if edge > 0.02 && confidence >= 55.0 {
            Recommendation::SmallStake
        } else if edge > 0.0 {
            Recommendation::Pass
        } else {
            Recommendation::NoBet
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::NoBet => "NO_BET",
            Recommendation::Pass => "PASS",
            Recommendation::SmallStake => "SMALL_STAKE",
            Recommendation::Recommended => "RECOMMENDED",
            Recommendation::StrongBet => "STRONG_BET",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A goal-line side market priced from the Poisson model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondaryMarket {
    pub market: String,
    pub model_probability: f64,
    pub odds: Option<f64>,
    /// model probability − 1/odds, when a price is quoted
    pub edge: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSignalSummary {
    #[serde(flatten)]
    pub signal: MarketSignal,
    pub arbitrage: ArbitrageCheck,
    pub closing_line_value: Option<ClosingLineValue>,
}

/// Everything `predict()` says about one fixture. The primary selection is
/// always the home side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionOutput {
    pub game_id: String,
    pub sport: Sport,
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub scheduled_at: DateTime<Utc>,
    /// Decimal price of the selection
    pub odds: f64,
    pub layers: LayerProbabilities,
    /// Weights the layers were combined with
    pub weights: ModelWeights,
    pub final_probability: f64,
    /// 0–100
    pub confidence: f64,
    pub edge_over_market: f64,
    /// Fraction of a unit, 0.0–1.0
    pub recommended_stake: f64,
    /// final probability × odds
    pub expected_return: f64,
    pub recommendation: Recommendation,
    /// 0.0–1.0
    pub risk_score: f64,
    pub risks: Vec<String>,
    pub key_factors: Vec<String>,
    pub outcome_probabilities: OutcomeProbabilities,
    pub posterior: Option<PosteriorSummary>,
    pub market_comparison: MarketComparison,
    pub market_signal: Option<MarketSignalSummary>,
    pub secondary_markets: Vec<SecondaryMarket>,
}

impl PredictionOutput {
    pub fn label(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recommendation_table() {
        assert_eq!(Recommendation::from_edge(0.12, 80.0), Recommendation::StrongBet);
        assert_eq!(Recommendation::from_edge(0.12, 70.0), Recommendation::Recommended);
        assert_eq!(Recommendation::from_edge(0.06, 60.0), Recommendation::SmallStake);
        assert_eq!(Recommendation::from_edge(0.03, 50.0), Recommendation::Pass);
        assert_eq!(Recommendation::from_edge(0.0, 99.0), Recommendation::NoBet);
        assert_eq!(Recommendation::from_edge(-0.2, 99.0), Recommendation::NoBet);
    }

    #[test]
    fn recommendation_serializes_as_table_string() {
        let json = serde_json::to_string(&Recommendation::SmallStake).unwrap();
        assert_eq!(json, "\"SMALL_STAKE\"");
        assert_eq!(Recommendation::StrongBet.to_string(), "STRONG_BET");
    }
}
