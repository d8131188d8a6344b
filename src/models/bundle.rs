use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{PredictionOutput, Recommendation, Sport};
use crate::error::{EngineError, Result};
use crate::portfolio::optimizer::MAX_POOL;

/// Optimizer input: one qualified selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleAsset {
    /// Game id
    pub id: String,
    pub label: String,
    /// probability × odds
    pub expected_return: f64,
    /// p(1 − p)·odds², the variance of a one-unit payout
    pub variance: f64,
    pub probability: f64,
    pub odds: f64,
    /// 0–100
    pub confidence: f64,
    pub risk_score: f64,
    pub edge: f64,
    pub recommendation: Recommendation,
    pub sport: Sport,
    pub league: String,
    pub game_time: DateTime<Utc>,
}

impl BundleAsset {
    pub fn from_prediction(p: &PredictionOutput) -> Self {
        let prob = p.final_probability;
        BundleAsset {
            id: p.game_id.clone(),
            label: p.label(),
            expected_return: prob * p.odds,
            variance: prob * (1.0 - prob) * p.odds * p.odds,
            probability: prob,
            odds: p.odds,
            confidence: p.confidence,
            risk_score: p.risk_score,
            edge: p.edge_over_market,
            recommendation: p.recommendation,
            sport: p.sport,
            league: p.league.clone(),
            game_time: p.scheduled_at,
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance.max(0.0).sqrt()
    }
}

/// A chosen subset of assets with its risk/return profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedPortfolio {
    pub assets: Vec<BundleAsset>,
    /// Equal weights 1/k in selection order
    pub weights: Vec<f64>,
    /// Π probability × Π odds
    pub expected_return: f64,
    /// Exact product of the selected odds
    pub combined_odds: f64,
    pub portfolio_variance: f64,
    pub sharpe_ratio: f64,
    pub diversification_score: f64,
    /// Mean pairwise correlation
    pub correlation_risk: f64,
    /// 0–100
    pub quality_score: f64,
    /// True when no combination qualified and the top-expected-return
    /// assets were taken instead
    pub fallback_used: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BundleType {
    Safe,
    Balanced,
    Value,
    HighRisk,
    Custom,
}

impl BundleType {
    pub fn display_name(&self) -> &'static str {
        match self {
            BundleType::Safe => "Safe",
            BundleType::Balanced => "Balanced",
            BundleType::Value => "Value",
            BundleType::HighRisk => "High Risk",
            BundleType::Custom => "Custom",
        }
    }
}

impl std::str::FromStr for BundleType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "safe" => Ok(BundleType::Safe),
            "balanced" => Ok(BundleType::Balanced),
            "value" => Ok(BundleType::Value),
            "high_risk" | "highrisk" => Ok(BundleType::HighRisk),
            "custom" => Ok(BundleType::Custom),
            other => Err(EngineError::Validation(format!(
                "unknown bundle type '{}'",
                other
            ))),
        }
    }
}

/// What the caller wants built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleRequest {
    pub bundle_type: BundleType,
    pub target_odds: f64,
    /// 0–100
    pub min_confidence: f64,
    pub max_games: usize,
    /// Empty means every sport
    #[serde(default)]
    pub sports: Vec<Sport>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl BundleRequest {
    pub fn validate(&self) -> Result<()> {
        if !self.target_odds.is_finite() || self.target_odds <= 1.0 {
            return Err(EngineError::Validation(format!(
                "target odds must be above 1.0, got {}",
                self.target_odds
            )));
        }
        if !(0.0..=100.0).contains(&self.min_confidence) {
            return Err(EngineError::Validation(format!(
                "min confidence must be within 0-100, got {}",
                self.min_confidence
            )));
        }
        if self.max_games < 2 {
            return Err(EngineError::Validation(
                "a bundle needs room for at least 2 games".into(),
            ));
        }
        if self.max_games > MAX_POOL {
            return Err(EngineError::Validation(format!(
                "a bundle holds at most {} games, got {}",
                MAX_POOL, self.max_games
            )));
        }
        Ok(())
    }
}

/// One leg of a generated bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleLeg {
    pub game_id: String,
    pub label: String,
    pub sport: Sport,
    pub league: String,
    pub scheduled_at: DateTime<Utc>,
    pub selection: String,
    pub odds: f64,
    pub probability: f64,
    pub confidence: f64,
    /// Fraction of bankroll, 0.0–cap
    pub stake: f64,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionCriteria {
    pub strategy: String,
    pub target_odds: f64,
    pub tolerance: f64,
    pub min_confidence: f64,
    pub max_games: usize,
    pub candidates: usize,
    pub qualified: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioMetrics {
    pub sharpe_ratio: f64,
    pub portfolio_variance: f64,
    pub diversification_score: f64,
    pub correlation_risk: f64,
    pub quality_score: f64,
    pub model_expected_return: f64,
    pub fallback_used: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMetadata {
    pub selection_criteria: SelectionCriteria,
    pub portfolio_metrics: PortfolioMetrics,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedBundle {
    pub name: String,
    pub bundle_type: BundleType,
    /// Stake-weighted leg confidence, never below the requested minimum
    pub confidence: f64,
    /// Exact product of the legs' odds
    pub expected_return: f64,
    pub games: Vec<BundleLeg>,
    pub metadata: BundleMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(max_games: usize) -> BundleRequest {
        BundleRequest {
            bundle_type: BundleType::Balanced,
            target_odds: 3.0,
            min_confidence: 60.0,
            max_games,
            sports: Vec::new(),
            date: None,
        }
    }

    #[test]
    fn max_games_is_bounded_both_ways() {
        assert!(matches!(request(1).validate(), Err(EngineError::Validation(_))));
        assert!(request(2).validate().is_ok());
        assert!(request(MAX_POOL).validate().is_ok());
        assert!(matches!(
            request(MAX_POOL + 1).validate(),
            Err(EngineError::Validation(_))
        ));
    }
}
