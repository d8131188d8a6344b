//! Kelly Criterion stake sizing for decimal odds.
//!
//!   f* = (b·p − q) / b
//! where
//!   b  = net odds received on the bet (decimal odds − 1)
//!   p  = estimated probability of winning
//!   q  = 1 − p
//!
//! A fractional multiplier trades some growth for much lower variance.

/// Full Kelly fraction. Returns `0.0` when there is no edge or the price is
/// not a valid decimal price.
pub fn kelly_fraction(win_prob: f64, decimal_odds: f64) -> f64 {
    if decimal_odds.is_nan() || decimal_odds <= 1.0 || !(0.0..=1.0).contains(&win_prob) {
        return 0.0;
    }
    let b = decimal_odds - 1.0;
    let p = win_prob;
    let q = 1.0 - p;
    let f = (b * p - q) / b;
    if f <= 0.0 {
        return 0.0;
    }
    f.min(1.0)
}

/// Inputs scaling the full Kelly fraction down to a bundle leg stake.
#[derive(Debug, Clone, Copy)]
pub struct StakeSizing {
    /// Fractional Kelly multiplier (0.0–1.0)
    pub fraction: f64,
    /// Hard cap on a single leg, as a fraction of bankroll
    pub max_stake: f64,
}

/// Stake for one leg: fractional Kelly scaled by confidence (0–100) and
/// discounted by the bundle's correlation risk, clamped to `[0, max_stake]`.
pub fn leg_stake(
    win_prob: f64,
    decimal_odds: f64,
    confidence: f64,
    correlation_risk: f64,
    sizing: StakeSizing,
) -> f64 {
    let full = kelly_fraction(win_prob, decimal_odds);
    let scaled = full
        * sizing.fraction
        * (confidence / 100.0).clamp(0.0, 1.0)
        * (1.0 - correlation_risk.clamp(0.0, 1.0) * 0.3);
    scaled.clamp(0.0, sizing.max_stake.max(0.0))
}

/// Edge of a bet: win probability minus the price's implied probability.
pub fn edge(win_prob: f64, decimal_odds: f64) -> f64 {
    if decimal_odds <= 0.0 {
        return 0.0;
    }
    win_prob - 1.0 / decimal_odds
}
