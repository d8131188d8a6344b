use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Sports the engine knows how to model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sport {
    Soccer,
    Basketball,
    Football,
    Tennis,
    Hockey,
}

impl Sport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sport::Soccer => "SOCCER",
            Sport::Basketball => "BASKETBALL",
            Sport::Football => "FOOTBALL",
            Sport::Tennis => "TENNIS",
            Sport::Hockey => "HOCKEY",
        }
    }

    /// Whether weather conditions can affect the result.
    pub fn is_outdoor(&self) -> bool {
        matches!(self, Sport::Soccer | Sport::Football | Sport::Tennis)
    }

    /// Whether a regulation draw is a possible outcome.
    pub fn allows_draw(&self) -> bool {
        matches!(self, Sport::Soccer | Sport::Hockey)
    }

    /// Whether scoring is low enough for a goals-based Poisson model.
    pub fn is_goal_based(&self) -> bool {
        matches!(self, Sport::Soccer | Sport::Hockey)
    }
}

impl std::str::FromStr for Sport {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "soccer" | "football_eu" => Ok(Sport::Soccer),
            "basketball" | "nba" => Ok(Sport::Basketball),
            "football" | "american_football" | "nfl" => Ok(Sport::Football),
            "tennis" => Ok(Sport::Tennis),
            "hockey" | "ice_hockey" | "nhl" => Ok(Sport::Hockey),
            other => Err(EngineError::Validation(format!("unknown sport '{}'", other))),
        }
    }
}

/// One of the three match outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

/// Home or away team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Home,
    Away,
}

/// Result of a recent match, newest last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormResult {
    #[serde(rename = "W")]
    Win,
    #[serde(rename = "D")]
    Draw,
    #[serde(rename = "L")]
    Loss,
}

impl FormResult {
    fn points(&self) -> f64 {
        match self {
            FormResult::Win => 3.0,
            FormResult::Draw => 1.0,
            FormResult::Loss => 0.0,
        }
    }
}

/// Season statistics for one team.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamStats {
    pub games_played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    /// Total goals (or points) scored over `games_played`
    pub goals_for: f64,
    /// Total goals (or points) conceded over `games_played`
    pub goals_against: f64,
    /// Expected goals per game
    pub xg: Option<f64>,
    /// Expected goals against per game
    pub xga: Option<f64>,
    /// Average possession percentage (0–100)
    pub possession: Option<f64>,
    pub recent_form: Vec<FormResult>,
    /// Relative attacking strength, 1.0 = league average
    pub attack_strength: Option<f64>,
    /// Relative defensive weakness, 1.0 = league average (lower is better)
    pub defense_strength: Option<f64>,
    /// Share of goals scored from set pieces (0.0–1.0)
    pub set_piece_efficiency: Option<f64>,
}

/// Rate used when a team has no games on record.
pub const NEUTRAL_RATE: f64 = 0.5;

impl TeamStats {
    pub fn win_rate(&self) -> f64 {
        self.rate(self.wins)
    }

    pub fn draw_rate(&self) -> f64 {
        if self.games_played == 0 {
            return 0.0;
        }
        self.draws as f64 / self.games_played as f64
    }

    pub fn loss_rate(&self) -> f64 {
        self.rate(self.losses)
    }

    fn rate(&self, count: u32) -> f64 {
        if self.games_played == 0 {
            NEUTRAL_RATE
        } else {
            count as f64 / self.games_played as f64
        }
    }

    /// Goals scored per game, or `fallback` when no games were played.
    pub fn goals_per_game(&self, fallback: f64) -> f64 {
        if self.games_played == 0 {
            fallback
        } else {
            self.goals_for / self.games_played as f64
        }
    }

    /// Goals conceded per game, or `fallback` when no games were played.
    pub fn conceded_per_game(&self, fallback: f64) -> f64 {
        if self.games_played == 0 {
            fallback
        } else {
            self.goals_against / self.games_played as f64
        }
    }

    /// Share of available points earned over the recent-form window (0.0–1.0).
    /// Neutral when there is no form data.
    pub fn form_score(&self) -> f64 {
        if self.recent_form.is_empty() {
            return NEUTRAL_RATE;
        }
        let earned: f64 = self.recent_form.iter().map(FormResult::points).sum();
        earned / (3.0 * self.recent_form.len() as f64)
    }

    pub fn recent_count(&self, result: FormResult) -> usize {
        self.recent_form.iter().filter(|r| **r == result).count()
    }
}

/// A previous meeting, scored from the perspective of the current fixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadToHead {
    pub home_team_goals: u32,
    pub away_team_goals: u32,
    #[serde(default)]
    pub played_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InjurySeverity {
    Minor,
    Moderate,
    Major,
    Out,
}

impl InjurySeverity {
    /// Multiplier applied to a player's impact rating.
    pub fn weight(&self) -> f64 {
        match self {
            InjurySeverity::Minor => 0.25,
            InjurySeverity::Moderate => 0.5,
            InjurySeverity::Major => 0.8,
            InjurySeverity::Out => 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Injury {
    pub player: String,
    pub team: Side,
    pub severity: InjurySeverity,
    /// Importance of the player to the team (0–10)
    pub impact: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weather {
    pub temperature_c: f64,
    #[serde(default)]
    pub wind_kph: f64,
    #[serde(default)]
    pub precipitation_mm: f64,
    #[serde(default)]
    pub condition: Option<String>,
}

/// Opening three-way prices.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpeningOdds {
    pub home_win: f64,
    #[serde(default)]
    pub draw: Option<f64>,
    pub away_win: f64,
}

/// A single timestamped price snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OddsObservation {
    pub observed_at: DateTime<Utc>,
    pub home_win: f64,
    pub away_win: f64,
    #[serde(default)]
    pub draw: Option<f64>,
    /// Matched volume at this snapshot, when the feed provides it
    #[serde(default)]
    pub volume: Option<f64>,
}

/// Decimal odds for the fixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Odds {
    pub home_win: f64,
    #[serde(default)]
    pub draw: Option<f64>,
    pub away_win: f64,
    #[serde(default, rename = "over2_5")]
    pub over_2_5: Option<f64>,
    #[serde(default, rename = "under2_5")]
    pub under_2_5: Option<f64>,
    #[serde(default)]
    pub btts_yes: Option<f64>,
    #[serde(default)]
    pub btts_no: Option<f64>,
    #[serde(default)]
    pub opening: Option<OpeningOdds>,
    /// Time-ordered price history, oldest first
    #[serde(default)]
    pub movement: Vec<OddsObservation>,
    /// Closing home price, known only after kickoff
    #[serde(default)]
    pub closing_home_win: Option<f64>,
    /// Estimated share of public tickets on the home side (0–100)
    #[serde(default)]
    pub public_home_pct: Option<f64>,
    /// Number of bookmakers quoting the market
    #[serde(default)]
    pub bookmaker_count: Option<u32>,
}

impl Odds {
    /// Three-way prices with no history or side markets.
    pub fn new(home_win: f64, draw: Option<f64>, away_win: f64) -> Self {
        Odds {
            home_win,
            draw,
            away_win,
            over_2_5: None,
            under_2_5: None,
            btts_yes: None,
            btts_no: None,
            opening: None,
            movement: Vec::new(),
            closing_home_win: None,
            public_home_pct: None,
            bookmaker_count: None,
        }
    }

    /// Opening home price, falling back to the first observed snapshot.
    pub fn opening_home_win(&self) -> Option<f64> {
        self.opening
            .as_ref()
            .map(|o| o.home_win)
            .or_else(|| self.movement.first().map(|o| o.home_win))
    }

    /// Relative drift of the home price from open to now. Negative means the
    /// home price shortened.
    pub fn home_drift(&self) -> f64 {
        match self.opening_home_win() {
            Some(open) if open > 1.0 => (self.home_win - open) / open,
            _ => 0.0,
        }
    }
}

/// Situational information that is not part of season statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchContext {
    /// Distance travelled by the away team
    pub travel_distance_km: Option<f64>,
    pub home_motivated: bool,
    pub away_motivated: bool,
}

/// Everything the engine needs to price one fixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameData {
    pub id: String,
    pub sport: Sport,
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub home_stats: TeamStats,
    #[serde(default)]
    pub away_stats: TeamStats,
    #[serde(default)]
    pub head_to_head: Vec<HeadToHead>,
    #[serde(default)]
    pub injuries: Vec<Injury>,
    #[serde(default)]
    pub weather: Option<Weather>,
    pub odds: Odds,
    #[serde(default)]
    pub context: Option<MatchContext>,
}

impl GameData {
    /// Reject records the engine cannot price. Missing optional sections are
    /// fine; inconsistent or non-finite numbers are not.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(EngineError::Validation("game id is empty".into()));
        }
        if self.home_team.trim().is_empty() || self.away_team.trim().is_empty() {
            return Err(EngineError::Validation(format!(
                "game {}: team names are required",
                self.id
            )));
        }
        check_price(&self.id, "homeWin", self.odds.home_win)?;
        check_price(&self.id, "awayWin", self.odds.away_win)?;
        if let Some(draw) = self.odds.draw {
            check_price(&self.id, "draw", draw)?;
        }
        for obs in &self.odds.movement {
            check_price(&self.id, "movement.homeWin", obs.home_win)?;
            check_price(&self.id, "movement.awayWin", obs.away_win)?;
        }
        if let Some(open) = self.odds.opening.as_ref() {
            check_price(&self.id, "opening.homeWin", open.home_win)?;
            check_price(&self.id, "opening.awayWin", open.away_win)?;
        }
        for (label, stats) in [("homeStats", &self.home_stats), ("awayStats", &self.away_stats)] {
            let decided = stats.wins + stats.draws + stats.losses;
            if decided > stats.games_played {
                return Err(EngineError::Validation(format!(
                    "game {}: {} records {} results over {} games",
                    self.id, label, decided, stats.games_played
                )));
            }
            if !stats.goals_for.is_finite()
                || !stats.goals_against.is_finite()
                || stats.goals_for < 0.0
                || stats.goals_against < 0.0
            {
                return Err(EngineError::Validation(format!(
                    "game {}: {} goal totals must be non-negative",
                    self.id, label
                )));
            }
        }
        for injury in &self.injuries {
            if !(0.0..=10.0).contains(&injury.impact) {
                return Err(EngineError::Validation(format!(
                    "game {}: injury impact for {} must be within 0-10",
                    self.id, injury.player
                )));
            }
        }
        Ok(())
    }
}

fn check_price(game_id: &str, field: &str, price: f64) -> Result<()> {
    if !price.is_finite() || price <= 1.0 {
        return Err(EngineError::Validation(format!(
            "game {}: {} price {} is not a valid decimal price",
            game_id, field, price
        )));
    }
    Ok(())
}
