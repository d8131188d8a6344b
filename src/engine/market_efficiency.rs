//! Market efficiency signals from the home-price history: steam moves,
//! reverse line movement, sharp-money confidence, arbitrage and closing-line
//! value.

use serde::{Deserialize, Serialize};

use crate::models::GameData;

/// Relative change that counts as a significant single move.
const STEAM_MOVE_THRESHOLD: f64 = 0.02;
/// Transitions inspected for steam.
const STEAM_WINDOW: usize = 5;
/// Significant moves within the window that constitute steam.
const STEAM_MIN_MOVES: usize = 3;
/// Overall relative move below which the market is considered flat.
const NEUTRAL_MOVE: f64 = 0.05;
const SHARP_CONFIDENCE_GATE: f64 = 0.65;
/// Public share above which a side is considered heavily backed.
const PUBLIC_HEAVY_PCT: f64 = 65.0;
/// Public share below which a side is considered faded.
const PUBLIC_LIGHT_PCT: f64 = 35.0;

/// One observation in a price series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OddsTick {
    pub price: f64,
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketDirection {
    SharpHome,
    SharpAway,
    PublicHome,
    PublicAway,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClvRating {
    Excellent,
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosingLineValue {
    pub clv_pct: f64,
    pub rating: ClvRating,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitrageCheck {
    pub is_opportunity: bool,
    /// Σ 1/odds over the outcomes
    pub book_sum: f64,
    /// (1 − book_sum) × 100, meaningful only when an opportunity exists
    pub profit_margin_pct: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSignal {
    pub steam_move: bool,
    pub reverse_line_movement: bool,
    pub sharp_confidence: f64,
    pub direction: MarketDirection,
    /// Relative price change over the series (last vs first)
    pub price_change: f64,
    pub volatility: f64,
    pub efficiency: f64,
    pub value_opportunity: f64,
}

impl MarketSignal {
    /// Signal for a market with no usable history.
    pub fn flat(bookmaker_count: u32) -> Self {
        MarketSignal {
            steam_move: false,
            reverse_line_movement: false,
            sharp_confidence: 0.5,
            direction: MarketDirection::Neutral,
            price_change: 0.0,
            volatility: 0.0,
            efficiency: efficiency(0.0, bookmaker_count),
            value_opportunity: 0.0,
        }
    }
}

fn relative_changes(ticks: &[OddsTick]) -> Vec<f64> {
    ticks
        .windows(2)
        .filter(|w| w[0].price > 0.0)
        .map(|w| (w[1].price - w[0].price) / w[0].price)
        .collect()
}

/// At least three of the last five transitions moved by more than 2%.
pub fn detect_steam_move(ticks: &[OddsTick]) -> bool {
    let changes = relative_changes(ticks);
    let start = changes.len().saturating_sub(STEAM_WINDOW);
    changes[start..]
        .iter()
        .filter(|c| c.abs() > STEAM_MOVE_THRESHOLD)
        .count()
        >= STEAM_MIN_MOVES
}

/// The price moved against a heavily backed side, or towards a faded one.
/// `public_pct` is the share of public money on the side whose price this is.
pub fn detect_reverse_line_movement(ticks: &[OddsTick], public_pct: f64) -> bool {
    let (Some(first), Some(last)) = (ticks.first(), ticks.last()) else {
        return false;
    };
    if first.price <= 0.0 {
        return false;
    }
    let change = (last.price - first.price) / first.price;
    // A lengthening price means money went the other way.
    let drifted_out = change > 0.01;
    let shortened = change < -0.01;
    (public_pct > PUBLIC_HEAVY_PCT && drifted_out) || (public_pct < PUBLIC_LIGHT_PCT && shortened)
}

/// Share of transitions moving the same way as the overall move.
fn directional_consistency(changes: &[f64], overall: f64) -> f64 {
    if changes.is_empty() || overall == 0.0 {
        return 0.0;
    }
    let aligned = changes
        .iter()
        .filter(|c| c.signum() == overall.signum() && **c != 0.0)
        .count();
    aligned as f64 / changes.len() as f64
}

/// Growth in matched volume across the series, 0.0–1.0.
fn volume_trend(ticks: &[OddsTick]) -> f64 {
    let volumes: Vec<f64> = ticks.iter().filter_map(|t| t.volume).collect();
    match (volumes.first(), volumes.last()) {
        (Some(first), Some(last)) if volumes.len() >= 2 && *first > 0.0 => {
            ((last - first) / first).clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}

fn volatility(changes: &[f64]) -> f64 {
    if changes.len() < 2 {
        return changes.first().map_or(0.0, |c| c.abs());
    }
    let n = changes.len() as f64;
    let mean = changes.iter().sum::<f64>() / n;
    (changes.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n).sqrt()
}

fn efficiency(volatility: f64, bookmaker_count: u32) -> f64 {
    0.6 * (1.0 - (volatility / 0.5).min(1.0)) + 0.4 * (bookmaker_count as f64 / 5.0).min(1.0)
}

/// Analyse a time-ordered home-price series.
pub fn analyze(ticks: &[OddsTick], public_pct: f64, bookmaker_count: u32) -> MarketSignal {
    if ticks.len() < 2 {
        return MarketSignal::flat(bookmaker_count);
    }
    let changes = relative_changes(ticks);
    let first = ticks[0].price;
    let last = ticks[ticks.len() - 1].price;
    let price_change = if first > 0.0 { (last - first) / first } else { 0.0 };

    let steam_move = detect_steam_move(ticks);
    let reverse_line_movement = detect_reverse_line_movement(ticks, public_pct);

    let mut sharp_confidence = 0.5;
    if steam_move {
        sharp_confidence += 0.25;
    }
    if reverse_line_movement {
        sharp_confidence += 0.30;
    }
    sharp_confidence += 0.15 * directional_consistency(&changes, price_change);
    sharp_confidence += 0.10 * volume_trend(ticks);
    let sharp_confidence = sharp_confidence.clamp(0.01, 0.99);

    // Shortening home price means money arrived on the home side.
    let direction = if price_change.abs() < NEUTRAL_MOVE {
        MarketDirection::Neutral
    } else {
        let sharp = sharp_confidence > SHARP_CONFIDENCE_GATE;
        match (price_change < 0.0, sharp) {
            (true, true) => MarketDirection::SharpHome,
            (true, false) => MarketDirection::PublicHome,
            (false, true) => MarketDirection::SharpAway,
            (false, false) => MarketDirection::PublicAway,
        }
    };

    let volatility = volatility(&changes);
    let efficiency = efficiency(volatility, bookmaker_count);
    let value_opportunity =
        (price_change * 100.0).abs() * sharp_confidence * (1.0 + (1.0 - efficiency) * 0.5) / 100.0;

    MarketSignal {
        steam_move,
        reverse_line_movement,
        sharp_confidence,
        direction,
        price_change,
        volatility,
        efficiency,
        value_opportunity,
    }
}

/// Analyse a game's home-price history. Without a public-money estimate the
/// public is assumed to follow the implied probability.
pub fn analyze_game(game: &GameData) -> MarketSignal {
    let odds = &game.odds;
    let mut ticks: Vec<OddsTick> = Vec::with_capacity(odds.movement.len() + 2);
    if let Some(open) = odds.opening.as_ref() {
        ticks.push(OddsTick {
            price: open.home_win,
            volume: None,
        });
    }
    ticks.extend(odds.movement.iter().map(|o| OddsTick {
        price: o.home_win,
        volume: o.volume,
    }));
    if ticks
        .last()
        .map_or(true, |t| (t.price - odds.home_win).abs() > 1e-12)
    {
        ticks.push(OddsTick {
            price: odds.home_win,
            volume: None,
        });
    }
    let public_pct = odds
        .public_home_pct
        .unwrap_or_else(|| 100.0 / odds.home_win)
        .clamp(0.0, 100.0);
    analyze(&ticks, public_pct, odds.bookmaker_count.unwrap_or(1))
}

/// Arbitrage exists when the implied probabilities sum to less than one.
pub fn check_arbitrage(prices: &[f64]) -> ArbitrageCheck {
    let valid: Vec<f64> = prices.iter().copied().filter(|p| *p > 1.0 && p.is_finite()).collect();
    if valid.len() < 2 || valid.len() != prices.len() {
        return ArbitrageCheck {
            is_opportunity: false,
            book_sum: f64::INFINITY,
            profit_margin_pct: 0.0,
        };
    }
    let book_sum: f64 = valid.iter().map(|p| 1.0 / p).sum();
    let is_opportunity = book_sum < 1.0;
    ArbitrageCheck {
        is_opportunity,
        book_sum,
        profit_margin_pct: if is_opportunity {
            (1.0 - book_sum) * 100.0
        } else {
            0.0
        },
    }
}

pub fn closing_line_value(bet_odds: f64, closing_odds: f64) -> ClosingLineValue {
    let clv_pct = if closing_odds > 0.0 {
        (bet_odds - closing_odds) / closing_odds * 100.0
    } else {
        0.0
    };
    let rating = match clv_pct {
        c if c > 5.0 => ClvRating::Excellent,
        c if c > 2.0 => ClvRating::Good,
        c if c > -2.0 => ClvRating::Fair,
        _ => ClvRating::Poor,
    };
    ClosingLineValue { clv_pct, rating }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn series(prices: &[f64]) -> Vec<OddsTick> {
        prices
            .iter()
            .map(|p| OddsTick {
                price: *p,
                volume: None,
            })
            .collect()
    }

    #[test]
    fn three_consecutive_moves_are_steam() {
        let ticks = series(&[2.20, 2.10, 2.00, 1.90]);
        assert!(detect_steam_move(&ticks));
    }

    #[test]
    fn flat_series_is_not_steam() {
        let ticks = series(&[2.0, 2.0, 2.0, 2.0, 2.0, 2.0]);
        assert!(!detect_steam_move(&ticks));
        let s = analyze(&ticks, 50.0, 3);
        assert_eq!(s.direction, MarketDirection::Neutral);
        assert_relative_eq!(s.value_opportunity, 0.0);
    }

    #[test]
    fn only_last_five_transitions_count() {
        // Big early moves followed by five quiet transitions.
        let ticks = series(&[3.0, 2.7, 2.4, 2.1, 2.1, 2.1, 2.1, 2.1, 2.1]);
        assert!(!detect_steam_move(&ticks));
    }

    #[test]
    fn reverse_line_movement_against_public() {
        let ticks = series(&[1.80, 1.90]);
        assert!(detect_reverse_line_movement(&ticks, 75.0));
        assert!(!detect_reverse_line_movement(&ticks, 50.0));
        let ticks = series(&[2.5, 2.3]);
        assert!(detect_reverse_line_movement(&ticks, 20.0));
    }

    #[test]
    fn steam_towards_home_is_sharp_home() {
        let ticks = series(&[2.40, 2.30, 2.20, 2.10, 2.00]);
        let s = analyze(&ticks, 30.0, 5);
        assert!(s.steam_move);
        assert!(s.reverse_line_movement);
        assert!(s.sharp_confidence > SHARP_CONFIDENCE_GATE);
        assert_eq!(s.direction, MarketDirection::SharpHome);
        assert!(s.value_opportunity > 0.0);
        assert!(s.sharp_confidence <= 0.99);
    }

    #[test]
    fn drift_without_conviction_is_public() {
        let ticks = series(&[2.00, 2.05, 2.04, 2.12]);
        let s = analyze(&ticks, 50.0, 2);
        assert!(!s.steam_move);
        assert_eq!(s.direction, MarketDirection::PublicAway);
    }

    #[test]
    fn efficiency_rewards_depth_and_calm() {
        assert_relative_eq!(efficiency(0.0, 5), 1.0, epsilon = 1e-12);
        assert_relative_eq!(efficiency(0.5, 0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn arbitrage_requires_book_under_one() {
        let arb = check_arbitrage(&[2.2, 2.2]);
        assert!(arb.is_opportunity);
        assert_relative_eq!(arb.profit_margin_pct, (1.0 - 2.0 / 2.2) * 100.0, epsilon = 1e-9);
        let none = check_arbitrage(&[1.9, 1.9]);
        assert!(!none.is_opportunity);
        assert_relative_eq!(none.profit_margin_pct, 0.0);
    }

    #[test]
    fn clv_categories() {
        assert_eq!(closing_line_value(2.2, 2.0).rating, ClvRating::Excellent);
        assert_eq!(closing_line_value(2.06, 2.0).rating, ClvRating::Good);
        assert_eq!(closing_line_value(2.0, 2.0).rating, ClvRating::Fair);
        assert_eq!(closing_line_value(1.8, 2.0).rating, ClvRating::Poor);
        assert_relative_eq!(closing_line_value(2.2, 2.0).clv_pct, 10.0, epsilon = 1e-9);
    }
}
