//! Layer 3: fixed-weight learned-model archetypes over a compact feature
//! vector.
//!
//! Three archetypes are blended using each one's historical hit rate as its
//! ensemble weight:
//! - a small two-unit nonlinear network
//! - a logistic model with interaction terms
//! - a vote of decision stumps

use serde::{Deserialize, Serialize};

use super::{clamp_probability, sigmoid, LayerEstimate};
use crate::models::{FormResult, GameData, TeamStats};

/// Historical accuracy of each archetype, used as its ensemble weight.
const NETWORK_ACCURACY: f64 = 0.68;
const INTERACTION_ACCURACY: f64 = 0.64;
const STUMPS_ACCURACY: f64 = 0.66;

/// Inputs shared by the three archetypes. Rates are 0–1, scoring figures are
/// relative to the league average.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MlFeatures {
    pub home_win_rate: f64,
    pub away_win_rate: f64,
    pub home_goals_per_game: f64,
    pub away_goals_per_game: f64,
    pub home_xg: f64,
    pub away_xg: f64,
    pub possession_diff: f64,
    pub home_recent_wins: f64,
    pub away_recent_wins: f64,
    pub h2h_home_wins: f64,
    pub h2h_away_wins: f64,
    pub h2h_draws: f64,
    pub odds_drift: f64,
}

impl MlFeatures {
    pub fn from_game(game: &GameData) -> Self {
        let home = &game.home_stats;
        let away = &game.away_stats;
        let avg = scoring_scale(home, away);

        let mut h2h_home_wins = 0.0;
        let mut h2h_away_wins = 0.0;
        let mut h2h_draws = 0.0;
        for meeting in &game.head_to_head {
            match meeting.home_team_goals.cmp(&meeting.away_team_goals) {
                std::cmp::Ordering::Greater => h2h_home_wins += 1.0,
                std::cmp::Ordering::Less => h2h_away_wins += 1.0,
                std::cmp::Ordering::Equal => h2h_draws += 1.0,
            }
        }

        let home_gpg = home.goals_per_game(avg) / avg;
        let away_gpg = away.goals_per_game(avg) / avg;
        MlFeatures {
            home_win_rate: home.win_rate(),
            away_win_rate: away.win_rate(),
            home_goals_per_game: home_gpg,
            away_goals_per_game: away_gpg,
            home_xg: home.xg.map_or(home_gpg, |xg| xg / avg.max(1e-9)),
            away_xg: away.xg.map_or(away_gpg, |xg| xg / avg.max(1e-9)),
            possession_diff: match (home.possession, away.possession) {
                (Some(h), Some(a)) => (h - a) / 100.0,
                _ => 0.0,
            },
            home_recent_wins: recent_win_share(home),
            away_recent_wins: recent_win_share(away),
            h2h_home_wins,
            h2h_away_wins,
            h2h_draws,
            odds_drift: game.odds.home_drift(),
        }
    }

    fn h2h_balance(&self) -> f64 {
        let total = self.h2h_home_wins + self.h2h_away_wins + self.h2h_draws;
        if total == 0.0 {
            0.0
        } else {
            (self.h2h_home_wins - self.h2h_away_wins) / total
        }
    }
}

/// Mean scoring rate of the two teams, used to normalise goal features.
fn scoring_scale(home: &TeamStats, away: &TeamStats) -> f64 {
    let games = home.games_played + away.games_played;
    if games == 0 {
        return 1.0;
    }
    let goals = home.goals_for + away.goals_for;
    let scale = goals / games as f64;
    if scale > 0.0 {
        scale
    } else {
        1.0
    }
}

fn recent_win_share(stats: &TeamStats) -> f64 {
    if stats.recent_form.is_empty() {
        return 0.5;
    }
    stats.recent_count(FormResult::Win) as f64 / stats.recent_form.len() as f64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchetypeOutput {
    pub network: f64,
    pub interaction: f64,
    pub stumps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MlResult {
    pub probability: f64,
    pub confidence: f64,
    pub archetypes: ArchetypeOutput,
    pub features: MlFeatures,
}

impl LayerEstimate for MlResult {
    fn probability(&self) -> f64 {
        self.probability
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }
}

pub fn evaluate(game: &GameData) -> MlResult {
    let features = MlFeatures::from_game(game);
    let archetypes = ArchetypeOutput {
        network: network(&features),
        interaction: interaction(&features),
        stumps: stumps(&features),
    };

    let weights = [NETWORK_ACCURACY, INTERACTION_ACCURACY, STUMPS_ACCURACY];
    let preds = [archetypes.network, archetypes.interaction, archetypes.stumps];
    let weight_sum: f64 = weights.iter().sum();
    let probability = preds
        .iter()
        .zip(weights.iter())
        .map(|(p, w)| p * w)
        .sum::<f64>()
        / weight_sum;

    // Disagreement between archetypes lowers trust.
    let max = preds.iter().cloned().fold(f64::MIN, f64::max);
    let min = preds.iter().cloned().fold(f64::MAX, f64::min);
    let agreement = 1.0 - ((max - min) * 2.0).min(1.0);
    let mean_accuracy = weight_sum / weights.len() as f64;
    let confidence = (mean_accuracy * (0.6 + 0.4 * agreement)).clamp(0.0, 1.0);

    MlResult {
        probability: clamp_probability(probability),
        confidence,
        archetypes,
        features,
    }
}

// ── Archetypes ───────────────────────────────────────────────────────────────

/// Two tanh hidden units feeding a sigmoid output.
fn network(f: &MlFeatures) -> f64 {
    let strength = f.home_win_rate - f.away_win_rate;
    let attack = f.home_xg - f.away_xg;
    let form = f.home_recent_wins - f.away_recent_wins;

    let h1 = (1.6 * strength + 0.9 * attack + 0.4 * f.possession_diff).tanh();
    let h2 = (1.1 * form + 0.6 * f.h2h_balance() - 2.0 * f.odds_drift).tanh();
    clamp_probability(sigmoid(1.4 * h1 + 0.8 * h2 + 0.15))
}

/// Linear terms plus strength × form and attack × defence interactions.
fn interaction(f: &MlFeatures) -> f64 {
    let strength = f.home_win_rate - f.away_win_rate;
    let form = f.home_recent_wins - f.away_recent_wins;
    let attack = f.home_goals_per_game - f.away_goals_per_game;
    let z = 0.2
        + 1.8 * strength
        + 0.8 * form
        + 1.2 * strength * form
        + 0.5 * attack
        + 0.3 * attack * strength
        - 1.5 * f.odds_drift;
    clamp_probability(sigmoid(z))
}

/// Each stump nudges a home-leaning base rate up or down.
fn stumps(f: &MlFeatures) -> f64 {
    let mut p: f64 = 0.45;
    p += if f.home_win_rate > f.away_win_rate + 0.15 {
        0.12
    } else if f.away_win_rate > f.home_win_rate + 0.15 {
        -0.12
    } else {
        0.0
    };
    p += if f.home_xg > f.away_xg * 1.2 {
        0.06
    } else if f.away_xg > f.home_xg * 1.2 {
        -0.06
    } else {
        0.0
    };
    p += if f.home_recent_wins >= 0.6 { 0.04 } else { 0.0 };
    p -= if f.away_recent_wins >= 0.6 { 0.04 } else { 0.0 };
    p += 0.05 * f.h2h_balance();
    p += if f.odds_drift < -0.05 {
        0.03
    } else if f.odds_drift > 0.05 {
        -0.03
    } else {
        0.0
    };
    clamp_probability(p)
}
