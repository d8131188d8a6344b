//! Interchangeable ways of choosing bundle legs from qualified candidates.

use std::cmp::Ordering;

use tracing::debug;

use crate::error::{EngineError, Result};
use crate::models::{BundleAsset, OptimizedPortfolio};
use crate::portfolio::optimizer::{combined_odds, diversification_score, for_each_combination};
use crate::portfolio::PortfolioOptimizer;

pub trait SelectionStrategy: Send + Sync {
    /// Pick legs whose combined odds land near `target_odds`.
    fn select(
        &self,
        candidates: &[BundleAsset],
        target_odds: f64,
        max_games: usize,
    ) -> Result<OptimizedPortfolio>;

    /// Relative odds tolerance the strategy accepts.
    fn tolerance(&self) -> f64;

    /// A looser copy to retry with after `NoCombinationFound`, if the
    /// strategy supports one.
    fn relaxed(&self) -> Option<Box<dyn SelectionStrategy>> {
        None
    }

    fn name(&self) -> &str;
}

// ── Portfolio ────────────────────────────────────────────────────────────────

/// Max-Sharpe subset under a correlation cap, with the optimizer's flagged
/// top-expected-return fallback.
#[derive(Debug, Clone, Default)]
pub struct PortfolioStrategy {
    optimizer: PortfolioOptimizer,
}

impl PortfolioStrategy {
    pub fn new(optimizer: PortfolioOptimizer) -> Self {
        PortfolioStrategy { optimizer }
    }
}

impl SelectionStrategy for PortfolioStrategy {
    fn select(
        &self,
        candidates: &[BundleAsset],
        target_odds: f64,
        max_games: usize,
    ) -> Result<OptimizedPortfolio> {
        self.optimizer
            .optimize_or_fallback(candidates, target_odds, max_games)
    }

    fn tolerance(&self) -> f64 {
        self.optimizer.config().return_tolerance
    }

    fn name(&self) -> &str {
        "portfolio"
    }
}

// ── Legacy ───────────────────────────────────────────────────────────────────

/// Exhaustive search ranked by `confidence × 0.5 + diversity × 0.3 −
/// risk × 0.2`, accepting combinations within `tolerance` of the target.
#[derive(Debug, Clone)]
pub struct LegacyStrategy {
    tolerance: f64,
    optimizer: PortfolioOptimizer,
}

impl LegacyStrategy {
    pub fn new(tolerance: f64, optimizer: PortfolioOptimizer) -> Self {
        LegacyStrategy {
            tolerance,
            optimizer,
        }
    }

    fn score(assets: &[&BundleAsset]) -> f64 {
        let k = assets.len() as f64;
        let confidence = assets.iter().map(|a| a.confidence).sum::<f64>() / k / 100.0;
        let risk = assets.iter().map(|a| a.risk_score).sum::<f64>() / k;
        confidence * 0.5 + diversification_score(assets) * 0.3 - risk * 0.2
    }
}

impl SelectionStrategy for LegacyStrategy {
    fn select(
        &self,
        candidates: &[BundleAsset],
        target_odds: f64,
        max_games: usize,
    ) -> Result<OptimizedPortfolio> {
        let pool = self.optimizer.bounded_pool(candidates, |a| a.confidence)?;

        let mut best: Option<(f64, Vec<usize>)> = None;
        for k in 2..=max_games.min(pool.len()) {
            for_each_combination(pool.len(), k, |indices| {
                let combo: Vec<&BundleAsset> = indices.iter().map(|i| &pool[*i]).collect();
                let odds = combined_odds(&combo);
                if ((odds - target_odds) / target_odds).abs() > self.tolerance {
                    return;
                }
                let score = Self::score(&combo);
                let better = best
                    .as_ref()
                    .map_or(true, |(s, _)| score.partial_cmp(s) == Some(Ordering::Greater));
                if better {
                    best = Some((score, indices.to_vec()));
                }
            });
        }

        match best {
            Some((score, indices)) => {
                debug!("Legacy selection scored {:.3} with {} legs", score, indices.len());
                let assets = indices.iter().map(|i| pool[*i].clone()).collect();
                Ok(self.optimizer.build_portfolio(assets, false))
            }
            None => Err(EngineError::NoCombinationFound {
                target_odds,
                tolerance: self.tolerance,
                candidates: pool.len(),
            }),
        }
    }

    fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn relaxed(&self) -> Option<Box<dyn SelectionStrategy>> {
        Some(Box::new(LegacyStrategy::new(
            self.tolerance * 2.0,
            self.optimizer.clone(),
        )))
    }

    fn name(&self) -> &str {
        "legacy"
    }
}
