//! Layer 2: bounded situational adjustments on top of the statistical layer.
//!
//! Each term is capped on its own, the terms are summed and the adjusted
//! probability is clamped to the layer bounds. Missing inputs contribute
//! nothing.

use serde::{Deserialize, Serialize};

use super::{clamp_probability, LayerEstimate, StatisticalResult};
use crate::models::{GameData, Side};

/// Largest swing attributed to recent form.
const MAX_FORM_ADJUSTMENT: f64 = 0.10;
/// Largest penalty one team can take from injuries.
const MAX_INJURY_PENALTY: f64 = 0.08;
/// Flat bonus for a side with something to play for.
const MOTIVATION_BONUS: f64 = 0.02;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Adjustments {
    pub form: f64,
    pub injuries: f64,
    pub weather: f64,
    pub travel: f64,
    pub motivation: f64,
}

impl Adjustments {
    pub fn total(&self) -> f64 {
        self.form + self.injuries + self.weather + self.travel + self.motivation
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextResult {
    pub probability: f64,
    pub confidence: f64,
    pub adjustments: Adjustments,
}

impl LayerEstimate for ContextResult {
    fn probability(&self) -> f64 {
        self.probability
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// Adjust the statistical estimate for form, injuries, weather, travel and
/// motivation.
pub fn evaluate(game: &GameData, base: &StatisticalResult) -> ContextResult {
    let adjustments = Adjustments {
        form: form_adjustment(game),
        injuries: injury_adjustment(game),
        weather: weather_adjustment(game, base.probability),
        travel: travel_adjustment(game),
        motivation: motivation_adjustment(game),
    };

    // Each missing input section costs a little confidence.
    let mut missing = 0u32;
    if game.home_stats.recent_form.is_empty() || game.away_stats.recent_form.is_empty() {
        missing += 1;
    }
    if game.sport.is_outdoor() && game.weather.is_none() {
        missing += 1;
    }
    if game.context.is_none() {
        missing += 1;
    }
    let confidence = (base.confidence * (1.0 - 0.05 * missing as f64)).clamp(0.0, 1.0);

    ContextResult {
        probability: clamp_probability(base.probability + adjustments.total()),
        confidence,
        adjustments,
    }
}

fn form_adjustment(game: &GameData) -> f64 {
    let home = &game.home_stats;
    let away = &game.away_stats;
    if home.recent_form.is_empty() && away.recent_form.is_empty() {
        return 0.0;
    }
    let diff = home.form_score() - away.form_score();
    (diff * MAX_FORM_ADJUSTMENT * 1.5).clamp(-MAX_FORM_ADJUSTMENT, MAX_FORM_ADJUSTMENT)
}

/// Positive when the away side is the more depleted one.
fn injury_adjustment(game: &GameData) -> f64 {
    let penalty = |side: Side| -> f64 {
        let raw: f64 = game
            .injuries
            .iter()
            .filter(|i| i.team == side)
            .map(|i| i.severity.weight() * (i.impact / 10.0) * 0.03)
            .sum();
        raw.min(MAX_INJURY_PENALTY)
    };
    penalty(Side::Away) - penalty(Side::Home)
}

/// Bad conditions compress the favourite's edge towards a coin flip.
fn weather_adjustment(game: &GameData, base: f64) -> f64 {
    if !game.sport.is_outdoor() {
        return 0.0;
    }
    let Some(weather) = game.weather.as_ref() else {
        return 0.0;
    };
    let mut dampening: f64 = 0.0;
    if weather.wind_kph > 30.0 {
        dampening += 0.02;
    } else if weather.wind_kph > 20.0 {
        dampening += 0.01;
    }
    if weather.precipitation_mm > 5.0 {
        dampening += 0.015;
    } else if weather.precipitation_mm > 1.0 {
        dampening += 0.005;
    }
    if weather.temperature_c < -5.0 || weather.temperature_c > 32.0 {
        dampening += 0.01;
    }
    let toward_even = if base > 0.5 { -1.0 } else { 1.0 };
    // Never push past 0.5.
    (toward_even * dampening).clamp(-(base - 0.5).abs(), (base - 0.5).abs())
}

/// Staged by distance band; long trips favour the home side.
fn travel_adjustment(game: &GameData) -> f64 {
    let distance = game
        .context
        .as_ref()
        .and_then(|c| c.travel_distance_km)
        .unwrap_or(0.0);
    match distance {
        d if d >= 3000.0 => 0.03,
        d if d >= 1000.0 => 0.02,
        d if d >= 300.0 => 0.01,
        _ => 0.0,
    }
}

fn motivation_adjustment(game: &GameData) -> f64 {
    let Some(ctx) = game.context.as_ref() else {
        return 0.0;
    };
    let mut adj = 0.0;
    if ctx.home_motivated {
        adj += MOTIVATION_BONUS;
    }
    if ctx.away_motivated {
        adj -= MOTIVATION_BONUS;
    }
    adj
}
