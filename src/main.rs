use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

use gambo_engine::bundle::{JsonFileGameSource, LegacyStrategy, SelectionStrategy};
use gambo_engine::config::{Config, StrategyKind};
use gambo_engine::models::PredictionRecord;
use gambo_engine::{
    BundleGenerator, BundleOutcome, EngineConfig, LearningSystem, PortfolioOptimizer, WeightStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let mut engine_config = match config.engine_config.as_ref() {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if config.seed.is_some() {
        engine_config.bayesian.seed = config.seed;
    }
    engine_config.validate()?;

    let weights = Arc::new(WeightStore::new(engine_config.layer_weights));

    // Learn from settled history before predicting, when there is any.
    if let Some(path) = config.history.as_ref() {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading history {}", path.display()))?;
        let records: Vec<PredictionRecord> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing history {}", path.display()))?;
        info!("Loaded {} settled prediction(s)", records.len());

        let learning = LearningSystem::new(engine_config.learning.clone(), Arc::clone(&weights));
        learning.extend(records);
        match learning.update_model_weights() {
            Ok(updated) => info!("Using learned weights {:?}", updated),
            Err(e) => warn!("Keeping configured weights: {}", e),
        }
        let report = learning.report();
        info!(
            "History: Brier {:.4}, log loss {:.4}",
            report.brier_score, report.log_loss
        );
    }

    let source = Arc::new(JsonFileGameSource::new(config.games.clone()));
    let mut generator = BundleGenerator::new(engine_config.clone(), weights, source);
    if config.strategy == StrategyKind::Legacy {
        let legacy: Arc<dyn SelectionStrategy> = Arc::new(LegacyStrategy::new(
            engine_config.legacy.odds_tolerance,
            PortfolioOptimizer::new(engine_config.optimizer.clone()),
        ));
        generator = generator.with_strategy(legacy);
    }

    let request = config.bundle_request()?;
    let outcome = generator.generate_or_report(&request).await;
    if let BundleOutcome::Generated(bundle) = &outcome {
        info!(
            "Generated '{}' with {} leg(s), confidence {:.1}",
            bundle.name,
            bundle.games.len(),
            bundle.confidence
        );
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
