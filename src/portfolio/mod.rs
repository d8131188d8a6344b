pub mod correlation;
pub mod kelly;
pub mod optimizer;

pub use correlation::{correlation_matrix, pairwise_correlation};
pub use kelly::{kelly_fraction, leg_stake, StakeSizing};
pub use optimizer::PortfolioOptimizer;
