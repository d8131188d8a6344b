pub mod bundle;
pub mod game;
pub mod prediction;
pub mod record;

pub use bundle::{
    BundleAsset, BundleLeg, BundleMetadata, BundleRequest, BundleType, GeneratedBundle,
    OptimizedPortfolio, PortfolioMetrics, SelectionCriteria,
};
pub use game::{
    FormResult, GameData, HeadToHead, Injury, InjurySeverity, MatchContext, Odds,
    OddsObservation, OpeningOdds, Outcome, Side, Sport, TeamStats, Weather, NEUTRAL_RATE,
};
pub use prediction::{
    LayerProbabilities, MarketSignalSummary, PredictionOutput, Recommendation, SecondaryMarket,
};
pub use record::PredictionRecord;

pub use crate::engine::bayesian::EdgeClassification;
pub use crate::engine::layers::LineMovement;
pub use crate::engine::market_efficiency::{ClvRating, MarketDirection};
pub use crate::learning::drift::DriftSeverity;
