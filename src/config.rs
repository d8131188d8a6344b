use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::engine::ModelWeights;
use crate::error::{EngineError, Result};
use crate::models::{BundleRequest, BundleType, Sport};
use crate::portfolio::optimizer::MAX_POOL;

// ── Engine configuration ─────────────────────────────────────────────────────

/// Gates applied when turning predictions into bundle candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Thresholds {
    /// Minimum prediction confidence (0–100) for a stake
    pub min_confidence: f64,
    /// Minimum edge over the market for a candidate
    pub min_edge: f64,
    /// Maximum risk score (0–1) for a candidate
    pub max_risk: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            min_confidence: 60.0,
            min_edge: 0.0,
            max_risk: 0.75,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureFlags {
    pub contextual_adjustments: bool,
    pub bayesian_fusion: bool,
    pub market_efficiency: bool,
    /// Monte Carlo posterior summary per game
    pub posterior_sampling: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        FeatureFlags {
            contextual_adjustments: true,
            bayesian_fusion: true,
            market_efficiency: true,
            posterior_sampling: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BayesianConfig {
    pub samples: usize,
    pub noise_sigma: f64,
    /// Prior belief in the model's accuracy for the market comparison
    pub prior_accuracy: f64,
    /// Fixes the sampling RNG; mixed with each game id
    pub seed: Option<u64>,
}

impl Default for BayesianConfig {
    fn default() -> Self {
        BayesianConfig {
            samples: 500,
            noise_sigma: 0.05,
            prior_accuracy: 0.68,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizerConfig {
    /// Cap on mean pairwise correlation of a combination
    pub max_correlation: f64,
    /// Kelly multiplier (0.0–1.0)
    pub fractional_kelly: f64,
    /// Largest stake on one leg as a fraction of bankroll
    pub max_stake_fraction: f64,
    /// Allowed relative deviation of combined odds from the target
    pub return_tolerance: f64,
    /// Candidates kept before combinations are enumerated
    pub max_pool: usize,
    pub min_assets: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            max_correlation: 0.6,
            fractional_kelly: 0.25,
            max_stake_fraction: 0.10,
            return_tolerance: 0.20,
            max_pool: 20,
            min_assets: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyConfig {
    pub odds_tolerance: f64,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        LegacyConfig {
            odds_tolerance: 0.15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LearningConfig {
    pub history_cap: usize,
    /// Records required before weights are updated
    pub min_records: usize,
    /// Most recent records used per update
    pub window: usize,
    pub learning_rate: f64,
    pub calibration_bins: usize,
    /// Size of each window compared for drift
    pub drift_window: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        LearningConfig {
            history_cap: 10_000,
            min_records: 100,
            window: 500,
            learning_rate: 0.1,
            calibration_bins: 10,
            drift_window: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub layer_weights: ModelWeights,
    pub thresholds: Thresholds,
    pub features: FeatureFlags,
    /// Multiplicative nudge applied when the blend disagrees with the market
    /// by more than five points
    pub market_adjustment: f64,
    pub bayesian: BayesianConfig,
    pub optimizer: OptimizerConfig,
    pub legacy: LegacyConfig,
    pub learning: LearningConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            layer_weights: ModelWeights::default(),
            thresholds: Thresholds::default(),
            features: FeatureFlags::default(),
            market_adjustment: 0.05,
            bayesian: BayesianConfig::default(),
            optimizer: OptimizerConfig::default(),
            legacy: LegacyConfig::default(),
            learning: LearningConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        let config: EngineConfig = serde_json::from_str(&raw)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.layer_weights
            .validate()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        let t = &self.thresholds;
        if !(0.0..=100.0).contains(&t.min_confidence) {
            return Err(EngineError::Config(
                "thresholds.minConfidence must be between 0 and 100".into(),
            ));
        }
        if !(0.0..=1.0).contains(&t.max_risk) {
            return Err(EngineError::Config(
                "thresholds.maxRisk must be between 0.0 and 1.0".into(),
            ));
        }
        if !(0.0..=0.5).contains(&self.market_adjustment) {
            return Err(EngineError::Config(
                "marketAdjustment must be between 0.0 and 0.5".into(),
            ));
        }
        let b = &self.bayesian;
        if b.noise_sigma < 0.0 || !b.noise_sigma.is_finite() {
            return Err(EngineError::Config("bayesian.noiseSigma must be non-negative".into()));
        }
        if !(0.0..1.0).contains(&b.prior_accuracy) || b.prior_accuracy == 0.0 {
            return Err(EngineError::Config(
                "bayesian.priorAccuracy must be strictly between 0.0 and 1.0".into(),
            ));
        }
        let o = &self.optimizer;
        if !(0.0..=0.95).contains(&o.max_correlation) {
            return Err(EngineError::Config(
                "optimizer.maxCorrelation must be between 0.0 and 0.95".into(),
            ));
        }
        if !(0.0..=1.0).contains(&o.fractional_kelly) {
            return Err(EngineError::Config(
                "optimizer.fractionalKelly must be between 0.0 and 1.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&o.max_stake_fraction) {
            return Err(EngineError::Config(
                "optimizer.maxStakeFraction must be between 0.0 and 1.0".into(),
            ));
        }
        if o.return_tolerance <= 0.0 || !o.return_tolerance.is_finite() {
            return Err(EngineError::Config("optimizer.returnTolerance must be positive".into()));
        }
        if o.min_assets < 2 || o.max_pool < o.min_assets {
            return Err(EngineError::Config(
                "optimizer needs minAssets >= 2 and maxPool >= minAssets".into(),
            ));
        }
        if o.max_pool > MAX_POOL {
            return Err(EngineError::Config(format!(
                "optimizer.maxPool must be at most {}, got {}",
                MAX_POOL, o.max_pool
            )));
        }
        if self.legacy.odds_tolerance <= 0.0 {
            return Err(EngineError::Config("legacy.oddsTolerance must be positive".into()));
        }
        let l = &self.learning;
        if l.min_records == 0 || l.window == 0 || l.calibration_bins == 0 || l.drift_window == 0 {
            return Err(EngineError::Config(
                "learning windows and bin counts must be positive".into(),
            ));
        }
        if l.history_cap < l.window {
            return Err(EngineError::Config(
                "learning.historyCap must be at least learning.window".into(),
            ));
        }
        if !(l.learning_rate > 0.0 && l.learning_rate <= 1.0) {
            return Err(EngineError::Config(
                "learning.learningRate must be within (0.0, 1.0]".into(),
            ));
        }
        Ok(())
    }
}

// ── Command line ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyKind {
    Portfolio,
    Legacy,
}

/// Builds a bundle from a file of fixtures
#[derive(Parser, Debug, Clone)]
#[command(name = "gambo-engine", version, about)]
pub struct Config {
    /// JSON file holding an array of games
    #[arg(long, env = "GAMES_PATH")]
    pub games: PathBuf,

    /// JSON file holding settled prediction records
    #[arg(long, env = "HISTORY_PATH")]
    pub history: Option<PathBuf>,

    /// JSON engine configuration; defaults apply when omitted
    #[arg(long, env = "ENGINE_CONFIG")]
    pub engine_config: Option<PathBuf>,

    /// Bundle type (safe, balanced, value, high-risk, custom)
    #[arg(long, env = "BUNDLE_TYPE", default_value = "balanced")]
    pub bundle_type: String,

    /// Combined decimal odds the bundle should land near
    #[arg(long, env = "TARGET_ODDS", default_value = "3.0")]
    pub target_odds: f64,

    /// Minimum confidence (0–100) for a leg
    #[arg(long, env = "MIN_CONFIDENCE", default_value = "60.0")]
    pub min_confidence: f64,

    /// Maximum number of legs
    #[arg(long, env = "MAX_GAMES", default_value = "4")]
    pub max_games: usize,

    /// Comma-separated sports to include; all when empty
    #[arg(long, env = "SPORTS", value_delimiter = ',')]
    pub sports: Vec<String>,

    /// Only games scheduled on this UTC date (YYYY-MM-DD)
    #[arg(long, env = "BUNDLE_DATE")]
    pub date: Option<chrono::NaiveDate>,

    /// Selection strategy
    #[arg(long, env = "STRATEGY", value_enum, default_value = "portfolio")]
    pub strategy: StrategyKind,

    /// Seed for posterior sampling
    #[arg(long, env = "SEED")]
    pub seed: Option<u64>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.target_odds.is_finite() || self.target_odds <= 1.0 {
            anyhow::bail!("target_odds must be greater than 1.0");
        }
        if !(0.0..=100.0).contains(&self.min_confidence) {
            anyhow::bail!("min_confidence must be between 0 and 100");
        }
        if !(2..=MAX_POOL).contains(&self.max_games) {
            anyhow::bail!("max_games must be between 2 and {}", MAX_POOL);
        }
        Ok(())
    }

    pub fn bundle_request(&self) -> anyhow::Result<BundleRequest> {
        let bundle_type: BundleType = self.bundle_type.parse()?;
        let sports = self
            .sports
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<Sport>())
            .collect::<Result<Vec<_>>>()?;
        Ok(BundleRequest {
            bundle_type,
            target_odds: self.target_odds,
            min_confidence: self.min_confidence,
            max_games: self.max_games,
            sports,
            date: self.date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.optimizer.max_pool, 20);
        assert_eq!(config.learning.history_cap, 10_000);
        assert!(!config.features.posterior_sampling);
        assert_eq!(config.market_adjustment, 0.05);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"thresholds": {"minConfidence": 70}, "bayesian": {"seed": 7}}"#,
        )
        .unwrap();
        assert_eq!(config.thresholds.min_confidence, 70.0);
        assert_eq!(config.thresholds.max_risk, 0.75);
        assert_eq!(config.bayesian.seed, Some(7));
        assert_eq!(config.bayesian.samples, 500);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        let mut config = EngineConfig::default();
        config.layer_weights.market = 0.5;
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
    }

    #[test]
    fn rejects_unbounded_candidate_pool() {
        let mut config = EngineConfig::default();
        config.optimizer.max_pool = 200;
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
        config.optimizer.max_pool = MAX_POOL;
        config.validate().unwrap();

        let parsed: EngineConfig =
            serde_json::from_str(r#"{"optimizer": {"maxPool": 21}}"#).unwrap();
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn cli_rejects_too_many_games() {
        let config = Config::parse_from(["gambo-engine", "--games", "g.json", "--max-games", "25"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn cli_builds_request() {
        let config = Config::parse_from([
            "gambo-engine",
            "--games",
            "games.json",
            "--bundle-type",
            "high-risk",
            "--sports",
            "soccer,nba",
            "--target-odds",
            "4.5",
        ]);
        config.validate().unwrap();
        let request = config.bundle_request().unwrap();
        assert_eq!(request.bundle_type, BundleType::HighRisk);
        assert_eq!(request.sports, vec![Sport::Soccer, Sport::Basketball]);
        assert_eq!(request.target_odds, 4.5);
        assert_eq!(config.strategy, StrategyKind::Portfolio);
    }
}
