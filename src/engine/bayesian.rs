//! Bayesian evidence fusion over the three-way outcome vector.
//!
//! Evidence items are applied one at a time and the vector is renormalised
//! after each. The confidence update reads the intermediate vector, so the
//! reported confidence depends on the order the items are supplied in.
//! Callers keep that order fixed (see `aggregator::build_evidence`).

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::layers::sample_confidence;
use crate::models::{GameData, Outcome};

/// Bounds on a single likelihood ratio so extreme evidence cannot zero out
/// an outcome.
const MIN_LIKELIHOOD: f64 = 0.05;
const MAX_LIKELIHOOD: f64 = 20.0;
/// Clip used for odds ratios.
const RATIO_CLIP: f64 = 0.001;

/// Outcome probabilities before any evidence is seen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BayesianPrior {
    pub home_win_rate: f64,
    pub draw_rate: f64,
    pub away_win_rate: f64,
    pub confidence: f64,
}

impl BayesianPrior {
    /// Prior from season records: each side's win rate averaged with the
    /// opponent's loss rate.
    pub fn from_game(game: &GameData) -> Self {
        let home = &game.home_stats;
        let away = &game.away_stats;
        let home_rate = (home.win_rate() + away.loss_rate()) / 2.0;
        let away_rate = (away.win_rate() + home.loss_rate()) / 2.0;
        let draw_rate = if !game.sport.allows_draw() {
            0.0
        } else if home.games_played == 0 && away.games_played == 0 {
            0.26
        } else {
            ((home.draw_rate() + away.draw_rate()) / 2.0).max(0.02)
        };
        let mut prior = BayesianPrior {
            home_win_rate: home_rate.max(0.02),
            draw_rate,
            away_win_rate: away_rate.max(0.02),
            confidence: sample_confidence(home.games_played, away.games_played),
        };
        let total = prior.home_win_rate + prior.draw_rate + prior.away_win_rate;
        prior.home_win_rate /= total;
        prior.draw_rate /= total;
        prior.away_win_rate /= total;
        prior
    }

    fn vector(&self) -> OutcomeProbabilities {
        OutcomeProbabilities {
            home: self.home_win_rate,
            draw: self.draw_rate,
            away: self.away_win_rate,
        }
        .normalized()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceKind {
    Statistical,
    MachineLearning,
    Form,
    Injury,
    HeadToHead,
    MarketMovement,
}

/// One observation that shifts belief towards `direction`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub kind: EvidenceKind,
    /// Likelihood ratio in favour of `direction`; 1.0 is uninformative
    pub likelihood: f64,
    /// How far to trust the ratio, 0.0–1.0
    pub strength: f64,
    pub direction: Outcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeProbabilities {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl OutcomeProbabilities {
    pub fn max(&self) -> f64 {
        self.home.max(self.draw).max(self.away)
    }

    fn normalized(self) -> Self {
        let total = self.home + self.draw + self.away;
        if !total.is_finite() || total <= 0.0 {
            return OutcomeProbabilities {
                home: 1.0 / 3.0,
                draw: 1.0 / 3.0,
                away: 1.0 / 3.0,
            };
        }
        OutcomeProbabilities {
            home: self.home / total,
            draw: self.draw / total,
            away: self.away / total,
        }
    }

    fn scaled(self, home: f64, draw: f64, away: f64) -> Self {
        OutcomeProbabilities {
            home: self.home * home,
            draw: self.draw * draw,
            away: self.away * away,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionResult {
    pub probabilities: OutcomeProbabilities,
    pub confidence: f64,
}

/// Apply `evidence` in order to the prior.
pub fn fuse(prior: &BayesianPrior, evidence: &[Evidence]) -> FusionResult {
    let mut probs = prior.vector();
    let mut confidence = prior.confidence;

    for item in evidence {
        if !item.likelihood.is_finite() || !item.strength.is_finite() {
            continue;
        }
        let likelihood = item.likelihood.clamp(MIN_LIKELIHOOD, MAX_LIKELIHOOD);
        let strength = item.strength.clamp(0.0, 1.0);
        let shift = (1.0 + (likelihood - 1.0) * strength).max(MIN_LIKELIHOOD);
        let damp = 1.0 / shift.sqrt();

        probs = match item.direction {
            Outcome::Home => probs.scaled(shift, damp, 1.0 / shift),
            Outcome::Away => probs.scaled(1.0 / shift, damp, shift),
            Outcome::Draw => probs.scaled(damp, shift, damp),
        }
        .normalized();

        let factor = if probs.max() > 0.4 { 1.0 } else { 0.8 };
        confidence = confidence * factor + strength * 0.1;
    }

    FusionResult {
        probabilities: probs,
        confidence: confidence.clamp(0.01, 0.99),
    }
}

// ── Posterior predictive sampling ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PosteriorSummary {
    pub mean: f64,
    pub variance: f64,
    pub lower_95: f64,
    pub upper_95: f64,
    pub samples: usize,
}

impl PosteriorSummary {
    pub fn interval_width(&self) -> f64 {
        self.upper_95 - self.lower_95
    }
}

/// Standard normal draw via Box–Muller.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // 1 - U keeps u1 in (0, 1] so ln is finite.
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Monte Carlo distribution of the fused home probability when every
/// likelihood is perturbed with Gaussian noise of scale `sigma`.
pub fn sample_posterior<R: Rng + ?Sized>(
    prior: &BayesianPrior,
    evidence: &[Evidence],
    samples: usize,
    sigma: f64,
    rng: &mut R,
) -> PosteriorSummary {
    if samples == 0 {
        let point = fuse(prior, evidence).probabilities.home;
        return PosteriorSummary {
            mean: point,
            variance: 0.0,
            lower_95: point,
            upper_95: point,
            samples: 0,
        };
    }

    let mut draws = Vec::with_capacity(samples);
    let mut perturbed = evidence.to_vec();
    for _ in 0..samples {
        for (item, original) in perturbed.iter_mut().zip(evidence) {
            item.likelihood = (original.likelihood + sigma * standard_normal(rng)).max(0.01);
        }
        draws.push(fuse(prior, &perturbed).probabilities.home);
    }

    let n = draws.len() as f64;
    let mean = draws.iter().sum::<f64>() / n;
    let variance = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
    draws.sort_by(|a, b| a.total_cmp(b));
    let lower_idx = ((0.025 * n).floor() as usize).min(draws.len() - 1);
    let upper_idx = ((0.975 * n).floor() as usize).min(draws.len() - 1);

    PosteriorSummary {
        mean,
        variance,
        lower_95: draws[lower_idx],
        upper_95: draws[upper_idx],
        samples,
    }
}

// ── Model versus market ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeClassification {
    Strong,
    Moderate,
    Weak,
    NoBet,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketComparison {
    pub bayes_factor: f64,
    pub posterior_accuracy: f64,
    pub edge_significance: f64,
    pub classification: EdgeClassification,
}

fn odds_ratio(p: f64) -> f64 {
    let p = p.clamp(RATIO_CLIP, 1.0 - RATIO_CLIP);
    p / (1.0 - p)
}

/// Weigh the model's view against the market's using the model's prior
/// track record.
pub fn compare_with_market(
    model_prob: f64,
    market_prob: f64,
    prior_accuracy: f64,
) -> MarketComparison {
    let bayes_factor = odds_ratio(model_prob) / odds_ratio(market_prob);
    let prior = prior_accuracy.clamp(0.01, 0.99);
    let posterior_accuracy =
        (bayes_factor * prior / (bayes_factor * prior + (1.0 - prior))).clamp(0.01, 0.99);
    let edge_significance = (model_prob - market_prob) * posterior_accuracy;

    let classification = if edge_significance > 0.08 && posterior_accuracy > 0.70 {
        EdgeClassification::Strong
    } else if edge_significance > 0.04 && posterior_accuracy > 0.60 {
        EdgeClassification::Moderate
    } else if edge_significance > 0.01 {
        EdgeClassification::Weak
    } else {
        EdgeClassification::NoBet
    };

    MarketComparison {
        bayes_factor,
        posterior_accuracy,
        edge_significance,
        classification,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_game;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn flat_prior() -> BayesianPrior {
        BayesianPrior {
            home_win_rate: 0.4,
            draw_rate: 0.3,
            away_win_rate: 0.3,
            confidence: 0.5,
        }
    }

    fn home_evidence(likelihood: f64, strength: f64) -> Evidence {
        Evidence {
            kind: EvidenceKind::Statistical,
            likelihood,
            strength,
            direction: Outcome::Home,
        }
    }

    #[test]
    fn prior_from_game_sums_to_one() {
        let prior = BayesianPrior::from_game(&sample_game("g1"));
        let total = prior.home_win_rate + prior.draw_rate + prior.away_win_rate;
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
        assert!(prior.home_win_rate > prior.away_win_rate);
    }

    #[test]
    fn no_evidence_returns_prior() {
        let r = fuse(&flat_prior(), &[]);
        assert_relative_eq!(r.probabilities.home, 0.4, epsilon = 1e-12);
        assert_relative_eq!(r.confidence, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn home_evidence_raises_home_and_lowers_away() {
        let r = fuse(&flat_prior(), &[home_evidence(2.0, 1.0)]);
        assert!(r.probabilities.home > 0.4);
        assert!(r.probabilities.away < 0.3);
        let p = r.probabilities;
        assert_relative_eq!(p.home + p.draw + p.away, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_strength_is_uninformative() {
        let r = fuse(&flat_prior(), &[home_evidence(10.0, 0.0)]);
        assert_relative_eq!(r.probabilities.home, 0.4, epsilon = 1e-12);
    }

    #[test]
    fn extreme_evidence_stays_in_bounds() {
        let evidence: Vec<Evidence> = (0..50)
            .map(|i| Evidence {
                kind: EvidenceKind::MarketMovement,
                likelihood: if i % 2 == 0 { 1e12 } else { -5.0 },
                strength: 7.0,
                direction: if i % 3 == 0 { Outcome::Away } else { Outcome::Home },
            })
            .chain(std::iter::once(home_evidence(f64::NAN, 1.0)))
            .collect();
        let r = fuse(&flat_prior(), &evidence);
        for p in [r.probabilities.home, r.probabilities.draw, r.probabilities.away] {
            assert!((0.0..=1.0).contains(&p), "out of range: {}", p);
        }
        assert!((0.01..=0.99).contains(&r.confidence));
    }

    #[test]
    fn confidence_trail_depends_on_order() {
        let home = home_evidence(3.0, 1.0);
        let draw = Evidence {
            direction: Outcome::Draw,
            ..home_evidence(1.2, 1.0)
        };
        let draw_first = fuse(&flat_prior(), &[draw.clone(), home.clone()]);
        let home_first = fuse(&flat_prior(), &[home, draw]);
        assert_relative_eq!(
            draw_first.probabilities.home,
            home_first.probabilities.home,
            epsilon = 1e-9
        );
        assert_relative_eq!(draw_first.confidence, 0.6, epsilon = 1e-9);
        assert_relative_eq!(home_first.confidence, 0.7, epsilon = 1e-9);
    }

    #[test]
    fn seeded_sampling_is_reproducible() {
        let evidence = vec![home_evidence(1.5, 0.8), home_evidence(1.2, 0.5)];
        let mut rng1 = StdRng::seed_from_u64(7);
        let mut rng2 = StdRng::seed_from_u64(7);
        let s1 = sample_posterior(&flat_prior(), &evidence, 500, 0.05, &mut rng1);
        let s2 = sample_posterior(&flat_prior(), &evidence, 500, 0.05, &mut rng2);
        assert_relative_eq!(s1.mean, s2.mean);
        assert!(s1.lower_95 <= s1.mean && s1.mean <= s1.upper_95);
        assert!(s1.variance >= 0.0);
    }

    #[test]
    fn zero_samples_collapse_to_point() {
        let mut rng = StdRng::seed_from_u64(1);
        let s = sample_posterior(&flat_prior(), &[home_evidence(2.0, 1.0)], 0, 0.05, &mut rng);
        assert_relative_eq!(s.variance, 0.0);
        assert_relative_eq!(s.lower_95, s.upper_95);
    }

    #[test]
    fn box_muller_is_roughly_standard() {
        let mut rng = StdRng::seed_from_u64(42);
        let draws: Vec<f64> = (0..20_000).map(|_| standard_normal(&mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        let var = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / draws.len() as f64;
        assert!(mean.abs() < 0.05);
        assert!((var - 1.0).abs() < 0.05);
    }

    #[test]
    fn market_comparison_classifies() {
        let strong = compare_with_market(0.70, 0.50, 0.68);
        assert!(strong.bayes_factor > 1.0);
        assert_eq!(strong.classification, EdgeClassification::Strong);

        let none = compare_with_market(0.45, 0.50, 0.68);
        assert_eq!(none.classification, EdgeClassification::NoBet);
        assert!(none.edge_significance < 0.0);
    }
}
