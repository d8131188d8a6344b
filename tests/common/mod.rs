#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use gambo_engine::models::{BundleAsset, GameData, Odds, Recommendation, Sport, TeamStats};

pub fn stats(games: u32, wins: u32, draws: u32, goals_for: f64, goals_against: f64) -> TeamStats {
    TeamStats {
        games_played: games,
        wins,
        draws,
        losses: games - wins - draws,
        goals_for,
        goals_against,
        ..Default::default()
    }
}

/// Soccer fixture kicking off `hours` after noon on 2024-03-09.
pub fn game(
    id: &str,
    league: &str,
    hours: i64,
    home: TeamStats,
    away: TeamStats,
    odds: Odds,
) -> GameData {
    GameData {
        id: id.to_string(),
        sport: Sport::Soccer,
        home_team: format!("{} Home", id),
        away_team: format!("{} Away", id),
        league: league.to_string(),
        scheduled_at: Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap() + Duration::hours(hours),
        home_stats: home,
        away_stats: away,
        head_to_head: Vec::new(),
        injuries: Vec::new(),
        weather: None,
        odds,
        context: None,
    }
}

/// Home side 16 wins from 20, away side 1 win from 20.
pub fn mismatch(id: &str, league: &str, hours: i64, odds: Odds) -> GameData {
    game(
        id,
        league,
        hours,
        stats(20, 16, 2, 45.0, 12.0),
        stats(20, 1, 4, 12.0, 40.0),
        odds,
    )
}

pub fn asset(
    id: &str,
    league: &str,
    hours: i64,
    odds: f64,
    p: f64,
    confidence: f64,
) -> BundleAsset {
    BundleAsset {
        id: id.into(),
        label: id.into(),
        expected_return: p * odds,
        variance: p * (1.0 - p) * odds * odds,
        probability: p,
        odds,
        confidence,
        risk_score: 0.2,
        edge: p - 1.0 / odds,
        recommendation: Recommendation::Recommended,
        sport: Sport::Soccer,
        league: league.into(),
        game_time: Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap() + Duration::hours(hours),
    }
}
