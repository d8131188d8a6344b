//! Layer 4: what the betting market says.

use serde::{Deserialize, Serialize};

use super::{clamp_probability, LayerEstimate};
use crate::models::GameData;

/// Drift beyond which a move is treated as professional money.
const SHARP_DRIFT: f64 = 0.08;
/// Drift beyond which a move is treated as public flow.
const PUBLIC_DRIFT: f64 = 0.03;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineMovement {
    Sharp,
    Public,
    Neutral,
}

impl LineMovement {
    pub fn from_drift(drift: f64) -> Self {
        match drift.abs() {
            d if d >= SHARP_DRIFT => LineMovement::Sharp,
            d if d >= PUBLIC_DRIFT => LineMovement::Public,
            _ => LineMovement::Neutral,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketResult {
    /// Raw 1/odds for the home price
    pub implied_probability: f64,
    /// Implied probability with the bookmaker margin removed
    pub fair_probability: f64,
    /// Sum of implied probabilities minus one
    pub overround: f64,
    /// Relative home-price change since open
    pub drift: f64,
    pub line_movement: LineMovement,
    /// (model probability − implied probability) × 200
    pub value_rating: f64,
    pub confidence: f64,
}

impl LayerEstimate for MarketResult {
    fn probability(&self) -> f64 {
        self.fair_probability
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }
}

pub fn implied_probability(decimal_odds: f64) -> f64 {
    if decimal_odds <= 1.0 || !decimal_odds.is_finite() {
        return 1.0;
    }
    1.0 / decimal_odds
}

/// Read the market for the home price. `model_probability` is the engine's
/// own pre-market estimate, used for the value rating.
pub fn evaluate(game: &GameData, model_probability: f64) -> MarketResult {
    let odds = &game.odds;
    let implied_home = implied_probability(odds.home_win);
    let book: f64 = implied_home
        + implied_probability(odds.away_win)
        + odds.draw.map(implied_probability).unwrap_or(0.0);
    let fair = if book > 0.0 { implied_home / book } else { implied_home };
    let drift = odds.home_drift();

    let bookmakers = odds.bookmaker_count.unwrap_or(1).min(5) as f64;
    let confidence = (0.55 + 0.07 * bookmakers).min(0.9);

    MarketResult {
        implied_probability: implied_home,
        fair_probability: clamp_probability(fair),
        overround: book - 1.0,
        drift,
        line_movement: LineMovement::from_drift(drift),
        value_rating: (model_probability - implied_home) * 200.0,
        confidence,
    }
}
