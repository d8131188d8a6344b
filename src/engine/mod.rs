pub mod aggregator;
pub mod bayesian;
pub mod layers;
pub mod market_efficiency;
pub mod weights;

pub use aggregator::PredictionEngine;
pub use weights::{ModelWeights, WeightStore};
