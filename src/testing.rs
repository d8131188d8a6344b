//! Shared fixtures for unit tests.

use chrono::{TimeZone, Utc};

use crate::models::{GameData, Odds, Sport, TeamStats};

/// A mid-table soccer fixture with complete season stats and three-way odds.
pub fn sample_game(id: &str) -> GameData {
    GameData {
        id: id.to_string(),
        sport: Sport::Soccer,
        home_team: "Home FC".into(),
        away_team: "Away United".into(),
        league: "Premier League".into(),
        scheduled_at: Utc.with_ymd_and_hms(2024, 3, 9, 15, 0, 0).unwrap(),
        home_stats: TeamStats {
            games_played: 20,
            wins: 10,
            draws: 5,
            losses: 5,
            goals_for: 30.0,
            goals_against: 20.0,
            ..Default::default()
        },
        away_stats: TeamStats {
            games_played: 20,
            wins: 7,
            draws: 6,
            losses: 7,
            goals_for: 25.0,
            goals_against: 25.0,
            ..Default::default()
        },
        head_to_head: Vec::new(),
        injuries: Vec::new(),
        weather: None,
        odds: Odds::new(2.0, Some(3.4), 3.8),
        context: None,
    }
}
