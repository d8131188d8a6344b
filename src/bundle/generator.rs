//! End-to-end bundle pipeline: fetch, predict, qualify, select, size.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::selection::{PortfolioStrategy, SelectionStrategy};
use super::source::{GameQuery, GameSource};
use crate::config::EngineConfig;
use crate::engine::{PredictionEngine, WeightStore};
use crate::error::{EngineError, Result};
use crate::models::{
    BundleAsset, BundleLeg, BundleMetadata, BundleRequest, GameData, GeneratedBundle,
    OptimizedPortfolio, PortfolioMetrics, PredictionOutput, SelectionCriteria,
};
use crate::portfolio::PortfolioOptimizer;

/// Smallest per-leg expected return worth including.
const MIN_EXPECTED_RETURN: f64 = 1.01;
const MIN_LEGS: usize = 2;

/// What the caller shows when asking for a bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BundleOutcome {
    Generated(GeneratedBundle),
    Unavailable { reason: String },
}

pub struct BundleGenerator {
    engine: Arc<PredictionEngine>,
    weights: Arc<WeightStore>,
    source: Arc<dyn GameSource>,
    strategy: Arc<dyn SelectionStrategy>,
    optimizer: PortfolioOptimizer,
}

impl BundleGenerator {
    /// Generator using the portfolio strategy.
    pub fn new(
        config: EngineConfig,
        weights: Arc<WeightStore>,
        source: Arc<dyn GameSource>,
    ) -> Self {
        let optimizer = PortfolioOptimizer::new(config.optimizer.clone());
        BundleGenerator {
            strategy: Arc::new(PortfolioStrategy::new(optimizer.clone())),
            engine: Arc::new(PredictionEngine::new(config)),
            weights,
            source,
            optimizer,
        }
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn SelectionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn engine(&self) -> &PredictionEngine {
        &self.engine
    }

    pub fn optimizer(&self) -> &PortfolioOptimizer {
        &self.optimizer
    }

    /// Predict every game concurrently against one weight snapshot. Games
    /// that fail validation or panic are logged and left out.
    pub async fn predict_all(&self, games: Vec<GameData>) -> Vec<PredictionOutput> {
        let weights = self.weights.snapshot();
        let tasks: Vec<_> = games
            .into_iter()
            .map(|game| {
                let engine = Arc::clone(&self.engine);
                let weights = Arc::clone(&weights);
                let game_id = game.id.clone();
                async move {
                    let res =
                        tokio::task::spawn_blocking(move || engine.predict(&game, &weights)).await;
                    (game_id, res)
                }
            })
            .collect();

        let mut predictions = Vec::new();
        for (game_id, res) in futures_util::future::join_all(tasks).await {
            match res {
                Ok(Ok(prediction)) => predictions.push(prediction),
                Ok(Err(e)) => warn!("Prediction failed for game {}: {}", game_id, e),
                Err(e) => warn!("Prediction task for game {} aborted: {}", game_id, e),
            }
        }
        predictions
    }

    /// Predictions that clear every threshold, as optimizer inputs. A game
    /// id seen more than once keeps its first prediction.
    pub fn qualify(
        &self,
        predictions: &[PredictionOutput],
        request: &BundleRequest,
    ) -> Vec<BundleAsset> {
        let thresholds = &self.engine.config().thresholds;
        let mut seen = HashSet::new();
        predictions
            .iter()
            .filter(|p| {
                let first = seen.insert(p.game_id.as_str());
                if !first {
                    warn!("Duplicate prediction for game {} ignored", p.game_id);
                }
                first
            })
            .filter(|p| {
                p.confidence >= request.min_confidence
                    && p.edge_over_market > thresholds.min_edge
                    && p.recommended_stake > 0.0
                    && p.expected_return >= MIN_EXPECTED_RETURN
                    && p.risk_score <= thresholds.max_risk
            })
            .map(BundleAsset::from_prediction)
            .collect()
    }

    pub async fn generate(&self, request: &BundleRequest) -> Result<GeneratedBundle> {
        request.validate()?;
        let max_pool = self.optimizer.config().max_pool;
        if request.max_games > max_pool {
            return Err(EngineError::Validation(format!(
                "max games {} exceeds the candidate pool of {}",
                request.max_games, max_pool
            )));
        }
        let query = GameQuery {
            sports: request.sports.clone(),
            date: request.date,
        };
        let games = self
            .source
            .fetch_games(&query)
            .await
            .map_err(|e| EngineError::Source(format!("{}: {:#}", self.source.name(), e)))?;
        let fetched = games.len();
        info!("Fetched {} game(s) from '{}'", fetched, self.source.name());

        let predictions = self.predict_all(games).await;
        let assets = self.qualify(&predictions, request);
        info!(
            "{} of {} prediction(s) qualified (min confidence {:.0})",
            assets.len(),
            predictions.len(),
            request.min_confidence
        );
        if assets.len() < MIN_LEGS {
            return Err(EngineError::InsufficientData {
                qualified: assets.len(),
                required: MIN_LEGS,
            });
        }
        self.build_bundle(request, &assets, fetched)
    }

    /// Select legs from already-qualified assets and size them. Retries once
    /// with a relaxed strategy when no combination is found.
    pub fn build_bundle(
        &self,
        request: &BundleRequest,
        assets: &[BundleAsset],
        candidates: usize,
    ) -> Result<GeneratedBundle> {
        let selected = self
            .strategy
            .select(assets, request.target_odds, request.max_games);
        let (portfolio, tolerance, strategy_name) = match (selected, self.strategy.relaxed()) {
            (Ok(p), _) => (p, self.strategy.tolerance(), self.strategy.name().to_string()),
            (Err(EngineError::NoCombinationFound { .. }), Some(relaxed)) => {
                info!(
                    "No combination within {:.0}% of {:.2}; retrying at {:.0}%",
                    self.strategy.tolerance() * 100.0,
                    request.target_odds,
                    relaxed.tolerance() * 100.0
                );
                let p = relaxed.select(assets, request.target_odds, request.max_games)?;
                (p, relaxed.tolerance(), format!("{} (relaxed)", relaxed.name()))
            }
            (Err(e), _) => return Err(e),
        };

        let stakes = self.optimizer.stakes(&portfolio);
        Ok(self.assemble(
            request,
            portfolio,
            &stakes,
            tolerance,
            strategy_name,
            candidates,
            assets.len(),
        ))
    }

    /// Like `generate`, but failures become a user-facing reason.
    pub async fn generate_or_report(&self, request: &BundleRequest) -> BundleOutcome {
        match self.generate(request).await {
            Ok(bundle) => BundleOutcome::Generated(bundle),
            Err(e) => {
                warn!("Bundle generation failed: {}", e);
                BundleOutcome::Unavailable {
                    reason: format!("No bundle could be generated: {}", e),
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        request: &BundleRequest,
        portfolio: OptimizedPortfolio,
        stakes: &[f64],
        tolerance: f64,
        strategy: String,
        candidates: usize,
        qualified: usize,
    ) -> GeneratedBundle {
        let stake_total: f64 = stakes.iter().sum();
        let weighted_confidence = if stake_total > 0.0 {
            portfolio
                .assets
                .iter()
                .zip(stakes)
                .map(|(a, s)| a.confidence * s)
                .sum::<f64>()
                / stake_total
        } else {
            portfolio.assets.iter().map(|a| a.confidence).sum::<f64>()
                / portfolio.assets.len().max(1) as f64
        };

        let games = portfolio
            .assets
            .iter()
            .zip(stakes)
            .map(|(a, stake)| BundleLeg {
                game_id: a.id.clone(),
                label: a.label.clone(),
                sport: a.sport,
                league: a.league.clone(),
                scheduled_at: a.game_time,
                selection: "HOME".to_string(),
                odds: a.odds,
                probability: a.probability,
                confidence: a.confidence,
                stake: *stake,
                recommendation: a.recommendation,
            })
            .collect();

        GeneratedBundle {
            name: format!(
                "{} Bundle @ {:.2}",
                request.bundle_type.display_name(),
                portfolio.combined_odds
            ),
            bundle_type: request.bundle_type,
            confidence: weighted_confidence.max(request.min_confidence),
            expected_return: portfolio.combined_odds,
            games,
            metadata: BundleMetadata {
                selection_criteria: SelectionCriteria {
                    strategy,
                    target_odds: request.target_odds,
                    tolerance,
                    min_confidence: request.min_confidence,
                    max_games: request.max_games,
                    candidates,
                    qualified,
                },
                portfolio_metrics: PortfolioMetrics {
                    sharpe_ratio: portfolio.sharpe_ratio,
                    portfolio_variance: portfolio.portfolio_variance,
                    diversification_score: portfolio.diversification_score,
                    correlation_risk: portfolio.correlation_risk,
                    quality_score: portfolio.quality_score,
                    model_expected_return: portfolio.expected_return,
                    fallback_used: portfolio.fallback_used,
                },
                generated_at: Utc::now(),
            },
        }
    }
}
