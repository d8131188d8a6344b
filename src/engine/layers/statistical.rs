//! Layer 1: sport-appropriate statistical submodels.
//!
//! Each submodel emits a P(home win) with its own confidence; the layer
//! result is their confidence-weighted average.
//!
//! Submodels by sport:
//! - **Soccer / Hockey**: Poisson goals model, expected-goals ratio, Elo
//! - **Basketball / Football**: scoring-efficiency logistic, Elo
//! - **Tennis**: Elo, games-won efficiency

use serde::{Deserialize, Serialize};

use super::{clamp_probability, sample_confidence, sigmoid, LayerEstimate};
use crate::models::{GameData, Sport, TeamStats};

/// Elo rating points credited to the home side.
const ELO_HOME_ADVANTAGE: f64 = 50.0;
/// Elo spread per unit of (win rate − loss rate).
const ELO_SPREAD: f64 = 400.0;
/// Poisson home-scoring multiplier.
const POISSON_HOME_FACTOR: f64 = 1.10;
/// Draw share assumed when teams have no draw history.
const BASELINE_DRAW_RATE: f64 = 0.26;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubModel {
    Poisson,
    ExpectedGoals,
    Elo,
    Efficiency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubModelEstimate {
    pub model: SubModel,
    pub prediction: f64,
    pub confidence: f64,
}

/// Goal-line markets derived from the Poisson model (soccer only).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalMarkets {
    pub over_2_5: f64,
    pub btts: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticalResult {
    pub probability: f64,
    pub confidence: f64,
    pub submodels: Vec<SubModelEstimate>,
    /// (home, draw, away) from the Poisson model when the sport has one
    pub outcome_split: Option<(f64, f64, f64)>,
    pub goal_markets: Option<GoalMarkets>,
}

impl LayerEstimate for StatisticalResult {
    fn probability(&self) -> f64 {
        self.probability
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// Run every submodel that applies to the game's sport.
pub fn evaluate(game: &GameData) -> StatisticalResult {
    let home = &game.home_stats;
    let away = &game.away_stats;
    let data_conf = sample_confidence(home.games_played, away.games_played);
    let mut submodels = Vec::with_capacity(3);
    let mut outcome_split = None;
    let mut goal_markets = None;

    if game.sport.is_goal_based() {
        let (lambda_home, lambda_away) = poisson_rates(game.sport, home, away);
        let split = outcome_probs_poisson(lambda_home, lambda_away, max_goals(game.sport));
        submodels.push(SubModelEstimate {
            model: SubModel::Poisson,
            prediction: split.0,
            confidence: data_conf,
        });
        outcome_split = Some(split);
        if game.sport == Sport::Soccer {
            goal_markets = Some(goal_line_markets(lambda_home, lambda_away));
        }
        if let Some(p) = expected_goals_ratio(game.sport, home, away) {
            submodels.push(SubModelEstimate {
                model: SubModel::ExpectedGoals,
                prediction: p,
                confidence: 0.75,
            });
        }
    } else {
        submodels.push(SubModelEstimate {
            model: SubModel::Efficiency,
            prediction: efficiency_win_prob(game.sport, home, away),
            confidence: data_conf * 0.9,
        });
    }

    submodels.push(SubModelEstimate {
        model: SubModel::Elo,
        prediction: elo_win_prob(game.sport, home, away),
        confidence: data_conf * 0.85,
    });

    let weight_sum: f64 = submodels.iter().map(|m| m.confidence).sum();
    let probability = if weight_sum > 0.0 {
        submodels
            .iter()
            .map(|m| m.prediction * m.confidence)
            .sum::<f64>()
            / weight_sum
    } else {
        0.5
    };
    let confidence = weight_sum / submodels.len() as f64;

    StatisticalResult {
        probability: clamp_probability(probability),
        confidence: confidence.clamp(0.0, 1.0),
        submodels,
        outcome_split,
        goal_markets,
    }
}

// ── Poisson ──────────────────────────────────────────────────────────────────
//
// Goals for each side are modelled as independent Poisson variables with
// rate = attack strength × opponent defensive weakness × league scoring rate.

/// Average goals per team per game used to express strengths as ratios.
fn league_scoring_rate(sport: Sport) -> f64 {
    match sport {
        Sport::Soccer => 1.35,
        Sport::Hockey => 3.0,
        Sport::Basketball => 112.0,
        Sport::Football => 22.0,
        Sport::Tennis => 11.0,
    }
}

fn max_goals(sport: Sport) -> u32 {
    match sport {
        Sport::Hockey => 14,
        _ => 10,
    }
}

fn attack_strength(stats: &TeamStats, avg: f64) -> f64 {
    stats
        .attack_strength
        .unwrap_or_else(|| stats.goals_per_game(avg) / avg)
        .clamp(0.2, 3.0)
}

fn defense_weakness(stats: &TeamStats, avg: f64) -> f64 {
    stats
        .defense_strength
        .unwrap_or_else(|| stats.conceded_per_game(avg) / avg)
        .clamp(0.2, 3.0)
}

fn poisson_rates(sport: Sport, home: &TeamStats, away: &TeamStats) -> (f64, f64) {
    let avg = league_scoring_rate(sport);
    let lambda_home =
        attack_strength(home, avg) * defense_weakness(away, avg) * avg * POISSON_HOME_FACTOR;
    let lambda_away = attack_strength(away, avg) * defense_weakness(home, avg) * avg;
    (lambda_home.max(0.05), lambda_away.max(0.05))
}

fn poisson_pmf(lambda: f64, max_k: u32) -> Vec<f64> {
    let max_k = max_k as usize;
    let lambda = lambda.max(0.0);
    let mut out = vec![0.0; max_k + 1];
    out[0] = (-lambda).exp();
    for k in 1..=max_k {
        out[k] = out[k - 1] * lambda / k as f64;
    }
    // Fold the truncated tail into the last bucket.
    let sum: f64 = out.iter().sum();
    if sum < 1.0 {
        out[max_k] += 1.0 - sum;
    }
    out
}

/// (home, draw, away) probabilities for independent Poisson scorelines.
fn outcome_probs_poisson(lambda_home: f64, lambda_away: f64, max_goals: u32) -> (f64, f64, f64) {
    let pmf_h = poisson_pmf(lambda_home, max_goals);
    let pmf_a = poisson_pmf(lambda_away, max_goals);

    let mut p_home = 0.0;
    let mut p_draw = 0.0;
    let mut p_away = 0.0;
    for (i, p_i) in pmf_h.iter().enumerate() {
        for (j, p_j) in pmf_a.iter().enumerate() {
            let p = p_i * p_j;
            if i > j {
                p_home += p;
            } else if i == j {
                p_draw += p;
            } else {
                p_away += p;
            }
        }
    }
    let total = p_home + p_draw + p_away;
    if total <= 0.0 {
        return (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0);
    }
    (p_home / total, p_draw / total, p_away / total)
}

fn goal_line_markets(lambda_home: f64, lambda_away: f64) -> GoalMarkets {
    // Sum of independent Poissons is Poisson(λh + λa).
    let total = poisson_pmf(lambda_home + lambda_away, 20);
    let under: f64 = total.iter().take(3).sum();
    let over_2_5 = 1.0 - under;
    let btts = (1.0 - (-lambda_home).exp()) * (1.0 - (-lambda_away).exp());
    GoalMarkets {
        over_2_5: over_2_5.clamp(0.0, 1.0),
        btts: btts.clamp(0.0, 1.0),
    }
}

// ── Expected goals ───────────────────────────────────────────────────────────

fn draw_share(home: &TeamStats, away: &TeamStats) -> f64 {
    if home.games_played == 0 && away.games_played == 0 {
        return BASELINE_DRAW_RATE;
    }
    let mut rates = Vec::with_capacity(2);
    if home.games_played > 0 {
        rates.push(home.draw_rate());
    }
    if away.games_played > 0 {
        rates.push(away.draw_rate());
    }
    let avg = rates.iter().sum::<f64>() / rates.len() as f64;
    avg.clamp(0.05, 0.45)
}

/// Share of the fixture's expected goals created by the home side, scaled by
/// the chance the game is not drawn. `None` when xG data is missing.
fn expected_goals_ratio(sport: Sport, home: &TeamStats, away: &TeamStats) -> Option<f64> {
    let home_xg = home.xg?;
    let home_xga = home.xga?;
    let away_xg = away.xg?;
    let away_xga = away.xga?;
    let home_threat = ((home_xg + away_xga) / 2.0) * POISSON_HOME_FACTOR;
    let away_threat = (away_xg + home_xga) / 2.0;
    let total = home_threat + away_threat;
    if !total.is_finite() || total <= 0.0 {
        return None;
    }
    let ratio = home_threat / total;
    let decisive = if sport.allows_draw() {
        1.0 - draw_share(home, away)
    } else {
        1.0
    };
    Some(clamp_probability(ratio * decisive))
}

// ── Elo ──────────────────────────────────────────────────────────────────────

fn elo_rating(stats: &TeamStats) -> f64 {
    1500.0 + ELO_SPREAD * (stats.win_rate() - stats.loss_rate())
}

fn elo_win_prob(sport: Sport, home: &TeamStats, away: &TeamStats) -> f64 {
    let diff = elo_rating(away) - (elo_rating(home) + ELO_HOME_ADVANTAGE);
    let expected = 1.0 / (1.0 + 10f64.powf(diff / 400.0));
    if sport.allows_draw() {
        // Expected score credits a draw as half a win.
        let draw = draw_share(home, away);
        clamp_probability(expected - draw / 2.0)
    } else {
        clamp_probability(expected)
    }
}

// ── Scoring efficiency ───────────────────────────────────────────────────────
//
// Net scoring margin per game drives a logistic. Home edge is expressed in
// points of margin.

fn efficiency_params(sport: Sport) -> (f64, f64) {
    // (logistic slope per point of margin, home edge in points)
    match sport {
        Sport::Basketball => (0.15, 3.0),
        Sport::Football => (0.14, 2.5),
        Sport::Tennis => (0.20, 0.0),
        Sport::Soccer => (1.0, 0.3),
        Sport::Hockey => (0.6, 0.3),
    }
}

fn efficiency_win_prob(sport: Sport, home: &TeamStats, away: &TeamStats) -> f64 {
    let avg = league_scoring_rate(sport);
    let net_home = home.goals_per_game(avg) - home.conceded_per_game(avg);
    let net_away = away.goals_per_game(avg) - away.conceded_per_game(avg);
    let (slope, home_edge) = efficiency_params(sport);
    clamp_probability(sigmoid(slope * (net_home - net_away + home_edge)))
}
