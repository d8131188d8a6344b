//! Gambo prediction and bundle engine.
//!
//! Per-game `predict()` runs four probability layers, Bayesian evidence
//! fusion and a market-efficiency read; qualified predictions feed a
//! correlation-aware portfolio optimizer that assembles Kelly-sized bundles.
//! Settled predictions flow back into the learning system, which updates the
//! shared model weights.

pub mod bundle;
pub mod config;
pub mod engine;
pub mod error;
pub mod learning;
pub mod models;
pub mod portfolio;

#[cfg(test)]
mod testing;

pub use bundle::{BundleGenerator, BundleOutcome, GameSource};
pub use config::EngineConfig;
pub use engine::{ModelWeights, PredictionEngine, WeightStore};
pub use error::{EngineError, Result};
pub use learning::LearningSystem;
pub use portfolio::PortfolioOptimizer;
