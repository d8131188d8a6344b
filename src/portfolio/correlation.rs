//! Heuristic pairwise correlation between bundle legs.
//!
//! These are hand-tuned attribute scores, not correlations estimated from
//! historical co-movement. They rank combinations by shared exposure and
//! nothing more.

use crate::models::BundleAsset;

const SAME_SPORT: f64 = 0.3;
const SAME_LEAGUE: f64 = 0.4;
const KICKOFF_WITHIN_2H: f64 = 0.2;
const KICKOFF_WITHIN_6H: f64 = 0.1;
const SIMILAR_ODDS: f64 = 0.1;
/// Price gap under which two legs count as similarly priced.
const SIMILAR_ODDS_GAP: f64 = 0.5;
pub const MAX_CORRELATION: f64 = 0.95;

pub fn pairwise_correlation(a: &BundleAsset, b: &BundleAsset) -> f64 {
    if a.id == b.id {
        return 1.0;
    }
    let mut rho = 0.0;
    if a.sport == b.sport {
        rho += SAME_SPORT;
    }
    if a.league == b.league {
        rho += SAME_LEAGUE;
    }
    let gap_minutes = (a.game_time - b.game_time).num_minutes().abs();
    if gap_minutes <= 120 {
        rho += KICKOFF_WITHIN_2H;
    } else if gap_minutes <= 360 {
        rho += KICKOFF_WITHIN_6H;
    }
    if (a.odds - b.odds).abs() < SIMILAR_ODDS_GAP {
        rho += SIMILAR_ODDS;
    }
    rho.min(MAX_CORRELATION)
}

/// Symmetric matrix with unit diagonal.
pub fn correlation_matrix(assets: &[&BundleAsset]) -> Vec<Vec<f64>> {
    let n = assets.len();
    let mut m = vec![vec![0.0; n]; n];
    for i in 0..n {
        m[i][i] = 1.0;
        for j in (i + 1)..n {
            let rho = pairwise_correlation(assets[i], assets[j]);
            m[i][j] = rho;
            m[j][i] = rho;
        }
    }
    m
}

/// Mean of the off-diagonal entries; 0.0 for fewer than two assets.
pub fn average_correlation(matrix: &[Vec<f64>]) -> f64 {
    let n = matrix.len();
    if n < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            total += matrix[i][j];
        }
    }
    total / (n * (n - 1) / 2) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Recommendation, Sport};
    use chrono::{Duration, TimeZone, Utc};

    fn asset(id: &str, sport: Sport, league: &str, hours: i64, odds: f64) -> BundleAsset {
        let p = 0.6;
        BundleAsset {
            id: id.into(),
            label: id.into(),
            expected_return: p * odds,
            variance: p * (1.0 - p) * odds * odds,
            probability: p,
            odds,
            confidence: 70.0,
            risk_score: 0.3,
            edge: 0.05,
            recommendation: Recommendation::SmallStake,
            sport,
            league: league.into(),
            game_time: Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap() + Duration::hours(hours),
        }
    }

    #[test]
    fn same_slot_same_league_is_capped() {
        let a = asset("a", Sport::Soccer, "EPL", 0, 1.8);
        let b = asset("b", Sport::Soccer, "EPL", 1, 1.9);
        assert_eq!(pairwise_correlation(&a, &b), MAX_CORRELATION);
    }

    #[test]
    fn unrelated_legs_are_uncorrelated() {
        let a = asset("a", Sport::Soccer, "EPL", 0, 1.5);
        let b = asset("b", Sport::Tennis, "ATP", 24, 3.0);
        assert_eq!(pairwise_correlation(&a, &b), 0.0);
    }

    #[test]
    fn matrix_is_symmetric_with_unit_diagonal() {
        let assets = vec![
            asset("a", Sport::Soccer, "EPL", 0, 1.5),
            asset("b", Sport::Soccer, "La Liga", 3, 1.7),
            asset("c", Sport::Basketball, "NBA", 10, 2.5),
        ];
        let refs: Vec<&BundleAsset> = assets.iter().collect();
        let m = correlation_matrix(&refs);
        for i in 0..3 {
            assert_eq!(m[i][i], 1.0);
            for j in 0..3 {
                assert_eq!(m[i][j], m[j][i]);
                if i != j {
                    assert!((0.0..=MAX_CORRELATION).contains(&m[i][j]));
                }
            }
        }
        // sport + 6h window + similar price
        assert!((m[0][1] - 0.5).abs() < 1e-12);
        assert!((average_correlation(&m) - 0.5 / 3.0).abs() < 1e-12);
    }
}
