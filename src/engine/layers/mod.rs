//! The four probability layers that feed the final aggregation.
//!
//! Every layer estimates P(home win) and reports how much it trusts that
//! estimate; [`LayerEstimate`] is the shared capability the aggregator reads.

pub mod contextual;
pub mod market;
pub mod ml;
pub mod statistical;

pub use contextual::ContextResult;
pub use market::{LineMovement, MarketResult};
pub use ml::{MlFeatures, MlResult};
pub use statistical::{GoalMarkets, StatisticalResult, SubModel, SubModelEstimate};

/// Lowest probability any layer may emit.
pub const PROB_FLOOR: f64 = 0.05;
/// Highest probability any layer may emit.
pub const PROB_CEIL: f64 = 0.95;

/// Common read-side view of a layer result.
pub trait LayerEstimate {
    /// Estimated P(home win), within [`PROB_FLOOR`, `PROB_CEIL`].
    fn probability(&self) -> f64;
    /// Trust in the estimate, 0.0–1.0.
    fn confidence(&self) -> f64;
}

pub fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        return 0.5;
    }
    p.clamp(PROB_FLOOR, PROB_CEIL)
}

/// Standard logistic sigmoid.
pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Confidence contributed by sample size: 0.4 with no games, 0.9 once both
/// teams have 20 or more.
pub(crate) fn sample_confidence(home_games: u32, away_games: u32) -> f64 {
    let games = home_games.min(away_games) as f64;
    0.4 + 0.5 * (games / 20.0).min(1.0)
}
