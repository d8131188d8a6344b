//! Correlation-aware subset search.
//!
//! Every k-combination of the candidate pool is scored, so the cost grows as
//! C(n, k). The pool is cut to `max_pool` candidates (highest expected return
//! first) before enumeration to keep the worst case bounded.

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::{debug, warn};

use super::correlation::{average_correlation, correlation_matrix};
use super::kelly::{leg_stake, StakeSizing};
use crate::config::OptimizerConfig;
use crate::error::{EngineError, Result};
use crate::models::{BundleAsset, OptimizedPortfolio};

/// Kickoff span (hours) that counts as fully spread out.
const FULL_TIME_SPREAD_HOURS: f64 = 24.0;
/// Largest candidate pool any configuration may enumerate over.
pub const MAX_POOL: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct PortfolioOptimizer {
    config: OptimizerConfig,
}

/// Risk/return figures for one candidate combination.
struct Scored {
    indices: Vec<usize>,
    sharpe: f64,
}

impl PortfolioOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        PortfolioOptimizer { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Highest-Sharpe subset of `min_assets..=max_assets` legs whose combined
    /// odds land within the return tolerance of `target_odds` and whose mean
    /// correlation stays under the cap.
    pub fn optimize(
        &self,
        candidates: &[BundleAsset],
        target_odds: f64,
        max_assets: usize,
    ) -> Result<OptimizedPortfolio> {
        let pool = self.bounded_pool(candidates, |a| a.expected_return)?;
        let min_k = self.config.min_assets.max(2);
        let max_k = max_assets.min(pool.len());

        let mut best: Option<Scored> = None;
        let mut examined = 0usize;
        for k in min_k..=max_k {
            for_each_combination(pool.len(), k, |indices| {
                examined += 1;
                let Some(sharpe) = self.score(&pool, indices, target_odds) else {
                    return;
                };
                let better = best.as_ref().map_or(true, |b| {
                    sharpe.partial_cmp(&b.sharpe) == Some(Ordering::Greater)
                });
                if better {
                    best = Some(Scored {
                        indices: indices.to_vec(),
                        sharpe,
                    });
                }
            });
        }
        debug!(
            "Examined {} combination(s) over a pool of {}",
            examined,
            pool.len()
        );

        match best {
            Some(scored) => {
                let assets = scored.indices.iter().map(|i| pool[*i].clone()).collect();
                Ok(self.build_portfolio(assets, false))
            }
            None => Err(EngineError::NoCombinationFound {
                target_odds,
                tolerance: self.config.return_tolerance,
                candidates: pool.len(),
            }),
        }
    }

    /// `optimize`, falling back to the top expected-return legs when no
    /// combination qualifies. The fallback is flagged on the portfolio.
    pub fn optimize_or_fallback(
        &self,
        candidates: &[BundleAsset],
        target_odds: f64,
        max_assets: usize,
    ) -> Result<OptimizedPortfolio> {
        match self.optimize(candidates, target_odds, max_assets) {
            Err(EngineError::NoCombinationFound { candidates: n, .. }) => {
                warn!(
                    "No combination of {} candidate(s) met target odds {:.2}; \
                     using top expected-return fallback",
                    n, target_odds
                );
                Ok(self.fallback(candidates, max_assets))
            }
            other => other,
        }
    }

    /// Top `max_assets` legs by expected return, flagged as a fallback.
    pub fn fallback(&self, candidates: &[BundleAsset], max_assets: usize) -> OptimizedPortfolio {
        let mut sorted = distinct_assets(candidates);
        sorted.sort_by(|a, b| b.expected_return.total_cmp(&a.expected_return));
        sorted.truncate(max_assets.max(1));
        self.build_portfolio(sorted, true)
    }

    /// Kelly stake per leg, in portfolio order.
    pub fn stakes(&self, portfolio: &OptimizedPortfolio) -> Vec<f64> {
        let sizing = StakeSizing {
            fraction: self.config.fractional_kelly,
            max_stake: self.config.max_stake_fraction,
        };
        portfolio
            .assets
            .iter()
            .map(|a| {
                leg_stake(
                    a.probability,
                    a.odds,
                    a.confidence,
                    portfolio.correlation_risk,
                    sizing,
                )
            })
            .collect()
    }

    /// Full metrics for a fixed set of legs.
    pub fn build_portfolio(
        &self,
        assets: Vec<BundleAsset>,
        fallback_used: bool,
    ) -> OptimizedPortfolio {
        let refs: Vec<&BundleAsset> = assets.iter().collect();
        let matrix = correlation_matrix(&refs);
        let correlation_risk = average_correlation(&matrix);
        let combined_odds = combined_odds(&refs);
        let expected_return = expected_return(&refs);
        let portfolio_variance = portfolio_variance(&refs, &matrix);
        let sharpe_ratio = sharpe(expected_return, portfolio_variance);
        let diversification_score = diversification_score(&refs);
        let k = assets.len().max(1);
        OptimizedPortfolio {
            weights: vec![1.0 / k as f64; assets.len()],
            assets,
            expected_return,
            combined_odds,
            portfolio_variance,
            sharpe_ratio,
            diversification_score,
            correlation_risk,
            quality_score: quality_score(
                sharpe_ratio,
                diversification_score,
                correlation_risk,
                expected_return,
            ),
            fallback_used,
        }
    }

    /// Distinct candidates, cut to the configured pool size by
    /// `rank` (highest first).
    pub fn bounded_pool<F>(
        &self,
        candidates: &[BundleAsset],
        rank: F,
    ) -> Result<Vec<BundleAsset>>
    where
        F: Fn(&BundleAsset) -> f64,
    {
        let mut pool = distinct_assets(candidates);
        let required = self.config.min_assets.max(2);
        if pool.len() < required {
            return Err(EngineError::InsufficientData {
                qualified: pool.len(),
                required,
            });
        }
        let cap = self.config.max_pool.min(MAX_POOL);
        if pool.len() > cap {
            warn!(
                "Candidate pool of {} exceeds {}; keeping the highest ranked",
                pool.len(),
                cap
            );
            pool.sort_by(|a, b| rank(b).total_cmp(&rank(a)));
            pool.truncate(cap);
        }
        Ok(pool)
    }

    /// Sharpe ratio of a combination, or `None` if it breaks a constraint.
    fn score(&self, pool: &[BundleAsset], indices: &[usize], target_odds: f64) -> Option<f64> {
        let refs: Vec<&BundleAsset> = indices.iter().map(|i| &pool[*i]).collect();
        let matrix = correlation_matrix(&refs);
        if average_correlation(&matrix) > self.config.max_correlation {
            return None;
        }
        let odds = combined_odds(&refs);
        if ((odds - target_odds) / target_odds).abs() > self.config.return_tolerance {
            return None;
        }
        let variance = portfolio_variance(&refs, &matrix);
        Some(sharpe(expected_return(&refs), variance))
    }
}

/// Keeps the first asset seen for each game id, in input order.
pub fn distinct_assets(candidates: &[BundleAsset]) -> Vec<BundleAsset> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .filter(|a| seen.insert(a.id.as_str()))
        .cloned()
        .collect()
}

/// Calls `f` with every strictly increasing k-subset of `0..n`.
pub(crate) fn for_each_combination<F: FnMut(&[usize])>(n: usize, k: usize, mut f: F) {
    if k == 0 || k > n {
        return;
    }
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        f(&idx);
        // Rightmost position that can still advance.
        let mut i = k;
        loop {
            if i == 0 {
                return;
            }
            i -= 1;
            if idx[i] < n - k + i {
                break;
            }
            if i == 0 {
                return;
            }
        }
        idx[i] += 1;
        for j in (i + 1)..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}

pub fn combined_odds(assets: &[&BundleAsset]) -> f64 {
    assets.iter().map(|a| a.odds).product()
}

/// Probability that every leg wins times the combined payout.
pub fn expected_return(assets: &[&BundleAsset]) -> f64 {
    assets.iter().map(|a| a.probability).product::<f64>() * combined_odds(assets)
}

/// Σ_i Σ_j w_i w_j σ_i σ_j ρ_ij with equal weights.
pub fn portfolio_variance(assets: &[&BundleAsset], matrix: &[Vec<f64>]) -> f64 {
    let n = assets.len();
    if n == 0 {
        return 0.0;
    }
    let w = 1.0 / n as f64;
    let mut variance = 0.0;
    for i in 0..n {
        for j in 0..n {
            variance += w * w * assets[i].std_dev() * assets[j].std_dev() * matrix[i][j];
        }
    }
    variance.max(0.0)
}

pub fn sharpe(expected_return: f64, variance: f64) -> f64 {
    if variance <= 0.0 {
        return 0.0;
    }
    (expected_return - 1.0) / variance.sqrt()
}

/// Mean of sport spread, league spread and kickoff spread over 24 hours.
pub fn diversification_score(assets: &[&BundleAsset]) -> f64 {
    if assets.is_empty() {
        return 0.0;
    }
    let k = assets.len() as f64;
    let sports: HashSet<_> = assets.iter().map(|a| a.sport).collect();
    let leagues: HashSet<&str> = assets.iter().map(|a| a.league.as_str()).collect();
    let earliest = assets.iter().map(|a| a.game_time).min();
    let latest = assets.iter().map(|a| a.game_time).max();
    let span_hours = match (earliest, latest) {
        (Some(first), Some(last)) => (last - first).num_minutes() as f64 / 60.0,
        _ => 0.0,
    };
    let time = (span_hours / FULL_TIME_SPREAD_HOURS).min(1.0);
    (sports.len() as f64 / k + leagues.len() as f64 / k + time) / 3.0
}

/// 0–100 blend of Sharpe, diversification, correlation and return.
pub fn quality_score(
    sharpe: f64,
    diversification: f64,
    correlation_risk: f64,
    expected_return: f64,
) -> f64 {
    let sharpe_part = (sharpe * 20.0 + 50.0).clamp(0.0, 100.0);
    let return_part = (expected_return / 1.5 * 100.0).clamp(0.0, 100.0);
    let score = 0.3 * sharpe_part
        + 0.25 * diversification * 100.0
        + 0.25 * (1.0 - correlation_risk) * 100.0
        + 0.2 * return_part;
    score.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Recommendation, Sport};
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn asset(id: &str, league: &str, hours: i64, odds: f64, p: f64, conf: f64) -> BundleAsset {
        BundleAsset {
            id: id.into(),
            label: id.into(),
            expected_return: p * odds,
            variance: p * (1.0 - p) * odds * odds,
            probability: p,
            odds,
            confidence: conf,
            risk_score: 0.3,
            edge: p - 1.0 / odds,
            recommendation: Recommendation::Recommended,
            sport: Sport::Soccer,
            league: league.into(),
            game_time: Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap() + Duration::hours(hours),
        }
    }

    #[test]
    fn enumerates_every_combination() {
        let mut seen = Vec::new();
        for_each_combination(5, 3, |c| seen.push(c.to_vec()));
        assert_eq!(seen.len(), 10);
        assert_eq!(seen.first().unwrap(), &vec![0, 1, 2]);
        assert_eq!(seen.last().unwrap(), &vec![2, 3, 4]);
        let mut count = 0;
        for_each_combination(4, 4, |_| count += 1);
        assert_eq!(count, 1);
        for_each_combination(3, 4, |_| panic!("k > n"));
    }

    #[test]
    fn picks_pair_near_target() {
        let assets = vec![
            asset("a", "EPL", 0, 1.6, 0.70, 80.0),
            asset("b", "Serie A", 3, 1.7, 0.66, 82.0),
        ];
        let opt = PortfolioOptimizer::default();
        let p = opt.optimize(&assets, 2.7, 2).unwrap();
        assert_eq!(p.assets.len(), 2);
        assert!(!p.fallback_used);
        assert_relative_eq!(p.combined_odds, 1.6 * 1.7, epsilon = 1e-12);
        assert_relative_eq!(p.correlation_risk, 0.5, epsilon = 1e-12);
        assert_relative_eq!(p.expected_return, 0.70 * 0.66 * 2.72, epsilon = 1e-9);
        assert!(p.sharpe_ratio > 0.0);
        assert!((0.0..=100.0).contains(&p.quality_score));
    }

    #[test]
    fn crowded_slate_falls_back() {
        let assets = vec![
            asset("a", "EPL", 0, 1.5, 0.72, 75.0),
            asset("b", "EPL", 0, 1.6, 0.70, 75.0),
            asset("c", "EPL", 0, 1.8, 0.65, 75.0),
        ];
        let opt = PortfolioOptimizer::default();
        assert!(matches!(
            opt.optimize(&assets, 2.5, 3),
            Err(EngineError::NoCombinationFound { .. })
        ));
        let p = opt.optimize_or_fallback(&assets, 2.5, 3).unwrap();
        assert!(p.fallback_used);
        assert!(p.correlation_risk > 0.6);
        assert_eq!(p.assets[0].id, "c");
    }

    #[test]
    fn too_few_candidates() {
        let opt = PortfolioOptimizer::default();
        let one = vec![asset("a", "EPL", 0, 1.5, 0.7, 70.0)];
        assert!(matches!(
            opt.optimize_or_fallback(&one, 2.0, 3),
            Err(EngineError::InsufficientData { qualified: 1, .. })
        ));
    }

    #[test]
    fn pool_is_bounded() {
        let assets: Vec<BundleAsset> = (0..30)
            .map(|i| {
                let odds = 1.3 + i as f64 * 0.01;
                asset(&format!("g{}", i), &format!("L{}", i), i * 7, odds, 0.8, 70.0)
            })
            .collect();
        let opt = PortfolioOptimizer::new(OptimizerConfig {
            max_pool: 8,
            ..Default::default()
        });
        let pool = opt.bounded_pool(&assets, |a| a.expected_return).unwrap();
        assert_eq!(pool.len(), 8);
        assert_eq!(pool[0].id, "g29");

        // an oversized configured pool is still held to the hard limit
        let opt = PortfolioOptimizer::new(OptimizerConfig {
            max_pool: 200,
            ..Default::default()
        });
        assert_eq!(opt.bounded_pool(&assets, |a| a.confidence).unwrap().len(), MAX_POOL);
    }

    #[test]
    fn repeated_game_is_one_candidate() {
        let a = asset("a", "EPL", 0, 1.8, 0.7, 80.0);
        let mut again = a.clone();
        again.odds = 2.0;
        let assets = vec![a.clone(), again, asset("b", "Serie A", 8, 1.5, 0.75, 80.0)];

        let distinct = distinct_assets(&assets);
        let ids: Vec<&str> = distinct.iter().map(|x| x.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(distinct[0].odds, 1.8);

        let opt = PortfolioOptimizer::default();
        let p = opt.optimize_or_fallback(&assets, 20.0, 3).unwrap();
        assert!(p.fallback_used);
        assert_eq!(p.assets.len(), 2);
        assert_ne!(p.assets[0].id, p.assets[1].id);
        assert!(p.correlation_risk <= 0.95);

        let twice = vec![a.clone(), a];
        assert!(matches!(
            opt.optimize_or_fallback(&twice, 3.24, 2),
            Err(EngineError::InsufficientData { qualified: 1, .. })
        ));
    }

    #[test]
    fn stakes_are_capped_and_zero_without_edge() {
        let mut assets = vec![
            asset("a", "EPL", 0, 1.6, 0.70, 80.0),
            asset("b", "Serie A", 3, 1.7, 0.40, 82.0),
        ];
        assets[0].probability = 0.99;
        let opt = PortfolioOptimizer::default();
        let p = opt.build_portfolio(assets, false);
        let stakes = opt.stakes(&p);
        assert!(stakes[0] <= 0.10 + 1e-12);
        assert!(stakes[0] > 0.0);
        assert_eq!(stakes[1], 0.0);
    }

    #[test]
    fn diversification_rewards_spread() {
        let spread = [
            asset("a", "EPL", 0, 1.6, 0.7, 80.0),
            asset("b", "NBA", 30, 1.7, 0.7, 80.0),
        ];
        let packed = [
            asset("a", "EPL", 0, 1.6, 0.7, 80.0),
            asset("b", "EPL", 0, 1.7, 0.7, 80.0),
        ];
        let s: Vec<&BundleAsset> = spread.iter().collect();
        let p: Vec<&BundleAsset> = packed.iter().collect();
        assert!(diversification_score(&s) > diversification_score(&p));
        // both soccer: 0.5 sports, 1.0 leagues, 1.0 time
        assert_relative_eq!(diversification_score(&s), 2.5 / 3.0, epsilon = 1e-12);
    }
}
