//! `predict()`: runs the four layers, Bayesian fusion and the market
//! efficiency read for one game and folds them into a single
//! [`PredictionOutput`].

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::bayesian::{self, BayesianPrior, Evidence, EvidenceKind, FusionResult};
use super::layers::contextual::{self, Adjustments};
use super::layers::{
    clamp_probability, market, ml, statistical, ContextResult, LayerEstimate, LineMovement,
    MarketResult, MlResult, StatisticalResult,
};
use super::market_efficiency::{self, MarketDirection, MarketSignal};
use super::ModelWeights;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::models::{
    GameData, LayerProbabilities, MarketSignalSummary, Outcome, PredictionOutput,
    Recommendation, SecondaryMarket,
};

/// Edge beyond which the market-edge adjustment applies.
const MARKET_EDGE_BAND: f64 = 0.05;
/// |edge| under which the market is taken to confirm the model.
const MARKET_AGREES: f64 = 0.02;
/// |edge| over which the market is taken to contradict the model.
const MARKET_CONFLICTS: f64 = 0.10;
/// Largest shift a sharp-money read may apply to the market component.
const MAX_SHARP_SHIFT: f64 = 0.05;
/// Likelihood bounds for evidence derived from a layer probability.
const MAX_LAYER_LIKELIHOOD: f64 = 5.0;
const MIN_H2H_MEETINGS: usize = 3;
/// Posterior 95% interval width reported as a risk.
const WIDE_INTERVAL: f64 = 0.25;

/// Stateless per-game predictor. Weights are passed per call so the caller
/// decides which snapshot a prediction sees.
#[derive(Debug, Clone, Default)]
pub struct PredictionEngine {
    config: EngineConfig,
}

impl PredictionEngine {
    pub fn new(config: EngineConfig) -> Self {
        PredictionEngine { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn predict(&self, game: &GameData, weights: &ModelWeights) -> Result<PredictionOutput> {
        game.validate()?;
        let features = &self.config.features;

        // Layers 1–3
        let stat = statistical::evaluate(game);
        let ctx = if features.contextual_adjustments {
            contextual::evaluate(game, &stat)
        } else {
            ContextResult {
                probability: stat.probability,
                confidence: stat.confidence,
                adjustments: Adjustments::default(),
            }
        };
        let ml_result = ml::evaluate(game);

        // Layer 4 reads the market against the model-only blend.
        let model_only = model_blend(weights, &stat, &ctx, &ml_result);
        let mkt = market::evaluate(game, model_only);

        // Bayesian fusion over the three-way vector.
        let prior = BayesianPrior::from_game(game);
        let evidence = build_evidence(game, &prior, &stat, &ctx, &ml_result, &mkt);
        let fusion = bayesian::fuse(&prior, &evidence);
        let posterior = if features.posterior_sampling {
            let mut rng = match self.config.bayesian.seed {
                Some(seed) => StdRng::seed_from_u64(mix_seed(seed, &game.id)),
                None => StdRng::from_entropy(),
            };
            Some(bayesian::sample_posterior(
                &prior,
                &evidence,
                self.config.bayesian.samples,
                self.config.bayesian.noise_sigma,
                &mut rng,
            ))
        } else {
            None
        };

        let signal = features
            .market_efficiency
            .then(|| market_efficiency::analyze_game(game));

        let market_component = market_component(
            &mkt,
            features.bayesian_fusion.then_some(&fusion),
            signal.as_ref(),
        );
        let layers = LayerProbabilities {
            statistical: stat.probability,
            contextual: ctx.probability,
            machine_learning: ml_result.probability,
            market: market_component,
        };

        // Final aggregation
        let implied = mkt.implied_probability;
        let mut blended = layers.weighted(weights);
        let raw_edge = blended - implied;
        if raw_edge > MARKET_EDGE_BAND {
            blended *= 1.0 + self.config.market_adjustment;
        } else if raw_edge < -MARKET_EDGE_BAND {
            blended *= 1.0 - self.config.market_adjustment;
        }
        let final_probability = clamp_probability(blended);
        let edge = final_probability - implied;

        let mut confidence = (stat.confidence() + ml_result.confidence()) / 2.0 * 100.0;
        if edge.abs() < MARKET_AGREES {
            confidence *= 1.1;
        } else if edge.abs() > MARKET_CONFLICTS {
            confidence *= 0.8;
        }
        let confidence = confidence.clamp(0.0, 100.0);

        let recommended_stake = if edge <= 0.0 || confidence < self.config.thresholds.min_confidence
        {
            0.0
        } else {
            (confidence / 100.0 * edge.abs() * 10.0).min(1.0)
        };

        let market_comparison = bayesian::compare_with_market(
            final_probability,
            mkt.fair_probability,
            self.config.bayesian.prior_accuracy,
        );

        let market_signal = signal.map(|signal| MarketSignalSummary {
            signal,
            arbitrage: market_efficiency::check_arbitrage(&three_way_prices(game)),
            closing_line_value: game
                .odds
                .closing_home_win
                .map(|close| market_efficiency::closing_line_value(game.odds.home_win, close)),
        });

        let mut output = PredictionOutput {
            game_id: game.id.clone(),
            sport: game.sport,
            league: game.league.clone(),
            home_team: game.home_team.clone(),
            away_team: game.away_team.clone(),
            scheduled_at: game.scheduled_at,
            odds: game.odds.home_win,
            layers,
            weights: *weights,
            final_probability,
            confidence,
            edge_over_market: edge,
            recommended_stake,
            expected_return: final_probability * game.odds.home_win,
            recommendation: Recommendation::from_edge(edge, confidence),
            risk_score: 0.0,
            risks: Vec::new(),
            key_factors: Vec::new(),
            outcome_probabilities: fusion.probabilities,
            posterior,
            market_comparison,
            market_signal,
            secondary_markets: secondary_markets(game, &stat),
        };
        output.risks = collect_risks(game, &output, &stat, &ctx, &ml_result);
        output.key_factors = collect_key_factors(&output, &stat, &ctx, &mkt);
        output.risk_score = risk_score(output.confidence, output.risks.len());
        Ok(output)
    }
}

/// Blend of the three model layers with their weights rescaled to sum to 1.
fn model_blend(
    weights: &ModelWeights,
    stat: &StatisticalResult,
    ctx: &ContextResult,
    ml_result: &MlResult,
) -> f64 {
    let w = [weights.statistical, weights.contextual, weights.machine_learning];
    let p = [stat.probability, ctx.probability, ml_result.probability];
    let total: f64 = w.iter().sum();
    if total <= 0.0 {
        return p.iter().sum::<f64>() / 3.0;
    }
    w.iter().zip(p.iter()).map(|(w, p)| w * p).sum::<f64>() / total
}

/// Market layer probability: the margin-free price, averaged with the
/// Bayesian posterior when fusion is on, then nudged by sharp money.
fn market_component(
    mkt: &MarketResult,
    fusion: Option<&FusionResult>,
    signal: Option<&MarketSignal>,
) -> f64 {
    let mut p = match fusion {
        Some(f) => 0.5 * mkt.fair_probability + 0.5 * f.probabilities.home,
        None => mkt.fair_probability,
    };
    if let Some(s) = signal {
        let shift = s.value_opportunity.min(MAX_SHARP_SHIFT);
        match s.direction {
            MarketDirection::SharpHome => p += shift,
            MarketDirection::SharpAway => p -= shift,
            _ => {}
        }
    }
    clamp_probability(p)
}

/// Likelihood that a layer's home probability lends to the home or away
/// outcome relative to the prior.
fn layer_evidence(kind: EvidenceKind, p: f64, prior_home: f64, strength: f64) -> Evidence {
    let prior_home = prior_home.clamp(0.01, 0.99);
    let (direction, likelihood) = if p >= prior_home {
        (Outcome::Home, p / prior_home)
    } else {
        (Outcome::Away, (1.0 - p) / (1.0 - prior_home))
    };
    Evidence {
        kind,
        likelihood: likelihood.clamp(1.0, MAX_LAYER_LIKELIHOOD),
        strength,
        direction,
    }
}

fn signed_evidence(kind: EvidenceKind, delta: f64, scale: f64, strength: f64) -> Evidence {
    Evidence {
        kind,
        likelihood: 1.0 + delta.abs() * scale,
        strength,
        direction: if delta >= 0.0 { Outcome::Home } else { Outcome::Away },
    }
}

/// Evidence in fixed order: statistical, machine learning, form, injuries,
/// head to head, market movement. Items with nothing to say are skipped.
pub fn build_evidence(
    game: &GameData,
    prior: &BayesianPrior,
    stat: &StatisticalResult,
    ctx: &ContextResult,
    ml_result: &MlResult,
    mkt: &MarketResult,
) -> Vec<Evidence> {
    let mut evidence = Vec::with_capacity(6);
    evidence.push(layer_evidence(
        EvidenceKind::Statistical,
        stat.probability,
        prior.home_win_rate,
        stat.confidence,
    ));
    evidence.push(layer_evidence(
        EvidenceKind::MachineLearning,
        ml_result.probability,
        prior.home_win_rate,
        ml_result.confidence,
    ));
    if ctx.adjustments.form != 0.0 {
        evidence.push(signed_evidence(EvidenceKind::Form, ctx.adjustments.form, 5.0, 0.6));
    }
    if ctx.adjustments.injuries != 0.0 {
        evidence.push(signed_evidence(
            EvidenceKind::Injury,
            ctx.adjustments.injuries,
            5.0,
            0.7,
        ));
    }

    let meetings = &game.head_to_head;
    if meetings.len() >= MIN_H2H_MEETINGS {
        let home_wins = meetings
            .iter()
            .filter(|m| m.home_team_goals > m.away_team_goals)
            .count() as f64;
        let away_wins = meetings
            .iter()
            .filter(|m| m.home_team_goals < m.away_team_goals)
            .count() as f64;
        let n = meetings.len() as f64;
        let balance = (home_wins - away_wins) / n;
        if balance != 0.0 {
            evidence.push(signed_evidence(
                EvidenceKind::HeadToHead,
                balance,
                1.0,
                (n / 10.0).min(1.0),
            ));
        }
    }

    if mkt.line_movement != LineMovement::Neutral {
        let strength = match mkt.line_movement {
            LineMovement::Sharp => 0.8,
            _ => 0.4,
        };
        // A shortening home price is evidence for the home side.
        evidence.push(signed_evidence(
            EvidenceKind::MarketMovement,
            -mkt.drift,
            5.0,
            strength,
        ));
    }
    evidence
}

/// Deterministic per-game seed so results do not depend on scheduling order.
fn mix_seed(seed: u64, game_id: &str) -> u64 {
    game_id.bytes().fold(seed ^ 0xcbf2_9ce4_8422_2325, |h, b| {
        (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

fn three_way_prices(game: &GameData) -> Vec<f64> {
    let mut prices = vec![game.odds.home_win, game.odds.away_win];
    if let Some(draw) = game.odds.draw {
        prices.push(draw);
    }
    prices
}

fn secondary_markets(game: &GameData, stat: &StatisticalResult) -> Vec<SecondaryMarket> {
    let Some(goals) = stat.goal_markets else {
        return Vec::new();
    };
    let priced = |market: &str, p: f64, odds: Option<f64>| SecondaryMarket {
        market: market.to_string(),
        model_probability: p,
        odds,
        edge: odds.filter(|o| *o > 1.0).map(|o| p - 1.0 / o),
    };
    vec![
        priced("OVER_2_5", goals.over_2_5, game.odds.over_2_5),
        priced("UNDER_2_5", 1.0 - goals.over_2_5, game.odds.under_2_5),
        priced("BTTS_YES", goals.btts, game.odds.btts_yes),
        priced("BTTS_NO", 1.0 - goals.btts, game.odds.btts_no),
    ]
}

/// 0.6 × (1 − confidence) + 0.4 × min(1, risks / 5).
pub fn risk_score(confidence: f64, risk_count: usize) -> f64 {
    let conf_part = 1.0 - (confidence / 100.0).clamp(0.0, 1.0);
    let count_part = (risk_count as f64 / 5.0).min(1.0);
    0.6 * conf_part + 0.4 * count_part
}

fn collect_risks(
    game: &GameData,
    out: &PredictionOutput,
    stat: &StatisticalResult,
    ctx: &ContextResult,
    ml_result: &MlResult,
) -> Vec<String> {
    let mut risks = Vec::new();
    let min_games = game.home_stats.games_played.min(game.away_stats.games_played);
    if min_games < 10 {
        risks.push(format!("Small sample: {} games on record", min_games));
    }
    if out.edge_over_market.abs() > MARKET_CONFLICTS {
        risks.push(format!(
            "Model disagrees with market by {:.1} points",
            out.edge_over_market * 100.0
        ));
    }
    let spread = [stat.probability, ctx.probability, ml_result.probability];
    let hi = spread.iter().cloned().fold(f64::MIN, f64::max);
    let lo = spread.iter().cloned().fold(f64::MAX, f64::min);
    if hi - lo > 0.20 {
        risks.push("Model layers disagree".to_string());
    }
    if ctx.adjustments.injuries < -0.03 {
        risks.push(format!("Injuries weaken {}", game.home_team));
    }
    if ctx.adjustments.weather != 0.0 {
        risks.push("Weather conditions".to_string());
    }
    if out.outcome_probabilities.draw > 0.30 {
        risks.push(format!(
            "Draw likely at {:.0}%",
            out.outcome_probabilities.draw * 100.0
        ));
    }
    if let Some(posterior) = out.posterior.as_ref() {
        if posterior.interval_width() > WIDE_INTERVAL {
            risks.push(format!(
                "Wide posterior interval ({:.2}-{:.2})",
                posterior.lower_95, posterior.upper_95
            ));
        }
    }
    if let Some(summary) = out.market_signal.as_ref() {
        if summary.signal.direction == MarketDirection::SharpAway {
            risks.push("Sharp money on the opponent".to_string());
        }
    }
    risks
}

fn collect_key_factors(
    out: &PredictionOutput,
    stat: &StatisticalResult,
    ctx: &ContextResult,
    mkt: &MarketResult,
) -> Vec<String> {
    let mut factors = Vec::new();
    factors.push(format!(
        "Statistical models give {:.0}% ({} submodels)",
        stat.probability * 100.0,
        stat.submodels.len()
    ));
    let adj = &ctx.adjustments;
    if adj.form.abs() >= 0.03 {
        factors.push(format!("Recent form shifts {:+.1} points", adj.form * 100.0));
    }
    if adj.travel > 0.0 {
        factors.push("Away side travelling far".to_string());
    }
    if adj.motivation != 0.0 {
        factors.push(format!("Motivation {:+.1} points", adj.motivation * 100.0));
    }
    if mkt.value_rating > 5.0 {
        factors.push(format!("Value rating {:.1}", mkt.value_rating));
    }
    if mkt.line_movement != LineMovement::Neutral {
        factors.push(format!(
            "{:?} line movement ({:+.1}%)",
            mkt.line_movement,
            mkt.drift * 100.0
        ));
    }
    if let Some(summary) = out.market_signal.as_ref() {
        if summary.signal.steam_move {
            factors.push("Steam move detected".to_string());
        }
        if summary.signal.reverse_line_movement {
            factors.push("Reverse line movement".to_string());
        }
        if summary.arbitrage.is_opportunity {
            factors.push(format!(
                "Arbitrage available ({:.2}% margin)",
                summary.arbitrage.profit_margin_pct
            ));
        }
    }
    factors.push(format!(
        "Edge classified {:?} against the market",
        out.market_comparison.classification
    ));
    factors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HeadToHead, Odds, OpeningOdds};
    use crate::testing::sample_game;
    use approx::assert_relative_eq;

    fn dominant_home(odds: Odds) -> GameData {
        let mut game = sample_game("fav");
        game.home_stats.wins = 16;
        game.home_stats.draws = 2;
        game.home_stats.losses = 2;
        game.home_stats.goals_for = 45.0;
        game.home_stats.goals_against = 12.0;
        game.away_stats.wins = 1;
        game.away_stats.draws = 4;
        game.away_stats.losses = 15;
        game.away_stats.goals_for = 12.0;
        game.away_stats.goals_against = 40.0;
        game.odds = odds;
        game
    }

    #[test]
    fn probabilities_stay_in_bounds() {
        let engine = PredictionEngine::default();
        let out = engine
            .predict(&sample_game("g1"), &ModelWeights::default())
            .unwrap();
        assert!((0.05..=0.95).contains(&out.final_probability));
        assert!((0.0..=100.0).contains(&out.confidence));
        assert!((0.0..=1.0).contains(&out.recommended_stake));
        assert!((0.0..=1.0).contains(&out.risk_score));
        let o = out.outcome_probabilities;
        assert_relative_eq!(o.home + o.draw + o.away, 1.0, epsilon = 1e-9);
        assert_relative_eq!(out.expected_return, out.final_probability * 2.0, epsilon = 1e-12);
    }

    #[test]
    fn efficiently_priced_favourite_is_no_bet() {
        let engine = PredictionEngine::default();
        let out = engine
            .predict(&dominant_home(Odds::new(1.01, Some(15.0), 40.0)), &ModelWeights::default())
            .unwrap();
        assert!(out.edge_over_market <= 0.0);
        assert_eq!(out.recommendation, Recommendation::NoBet);
        assert_relative_eq!(out.recommended_stake, 0.0);
    }

    #[test]
    fn underpriced_favourite_has_positive_edge() {
        let engine = PredictionEngine::default();
        let out = engine
            .predict(&dominant_home(Odds::new(3.0, Some(3.4), 2.5)), &ModelWeights::default())
            .unwrap();
        assert!(out.edge_over_market > 0.0);
        assert_ne!(out.recommendation, Recommendation::NoBet);
        assert_eq!(
            out.recommendation,
            Recommendation::from_edge(out.edge_over_market, out.confidence)
        );
    }

    #[test]
    fn rejects_invalid_game() {
        let mut game = sample_game("bad");
        game.odds.home_win = 0.9;
        let engine = PredictionEngine::default();
        assert!(engine.predict(&game, &ModelWeights::default()).is_err());
    }

    #[test]
    fn seeded_sampling_is_deterministic() {
        let mut config = EngineConfig::default();
        config.features.posterior_sampling = true;
        config.bayesian.samples = 200;
        config.bayesian.seed = Some(42);
        let engine = PredictionEngine::new(config);
        let game = sample_game("g1");
        let a = engine.predict(&game, &ModelWeights::default()).unwrap();
        let b = engine.predict(&game, &ModelWeights::default()).unwrap();
        let (pa, pb) = (a.posterior.unwrap(), b.posterior.unwrap());
        assert_eq!(pa.mean, pb.mean);
        assert_eq!(pa.lower_95, pb.lower_95);
        assert_eq!(a.final_probability, b.final_probability);
    }

    #[test]
    fn seeds_differ_per_game() {
        assert_ne!(mix_seed(1, "a"), mix_seed(1, "b"));
        assert_eq!(mix_seed(1, "a"), mix_seed(1, "a"));
    }

    #[test]
    fn evidence_follows_fixed_order() {
        let mut game = sample_game("g1");
        game.head_to_head = vec![
            HeadToHead {
                home_team_goals: 2,
                away_team_goals: 0,
                played_at: None,
            };
            4
        ];
        game.odds.opening = Some(OpeningOdds {
            home_win: 2.4,
            draw: Some(3.4),
            away_win: 3.0,
        });
        let stat = statistical::evaluate(&game);
        let ctx = contextual::evaluate(&game, &stat);
        let ml_result = ml::evaluate(&game);
        let mkt = market::evaluate(&game, 0.5);
        let prior = BayesianPrior::from_game(&game);
        let kinds: Vec<EvidenceKind> = build_evidence(&game, &prior, &stat, &ctx, &ml_result, &mkt)
            .iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EvidenceKind::Statistical,
                EvidenceKind::MachineLearning,
                EvidenceKind::HeadToHead,
                EvidenceKind::MarketMovement,
            ]
        );
    }

    #[test]
    fn secondary_markets_for_soccer_only() {
        let mut game = sample_game("g1");
        game.odds.over_2_5 = Some(1.9);
        let engine = PredictionEngine::default();
        let out = engine.predict(&game, &ModelWeights::default()).unwrap();
        let over = out
            .secondary_markets
            .iter()
            .find(|m| m.market == "OVER_2_5")
            .unwrap();
        assert!(over.edge.is_some());

        game.sport = crate::models::Sport::Basketball;
        game.odds.draw = None;
        let out = engine.predict(&game, &ModelWeights::default()).unwrap();
        assert!(out.secondary_markets.is_empty());
    }

    #[test]
    fn risk_score_formula() {
        assert_relative_eq!(risk_score(100.0, 0), 0.0);
        assert_relative_eq!(risk_score(50.0, 5), 0.7, epsilon = 1e-12);
        assert_relative_eq!(risk_score(0.0, 9), 1.0, epsilon = 1e-12);
    }
}
