use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{GameData, Sport};

/// Which fixtures a bundle run wants.
#[derive(Debug, Clone, Default)]
pub struct GameQuery {
    /// Empty means every sport
    pub sports: Vec<Sport>,
    /// UTC kickoff date
    pub date: Option<NaiveDate>,
}

impl GameQuery {
    pub fn matches(&self, game: &GameData) -> bool {
        let sport_ok = self.sports.is_empty() || self.sports.contains(&game.sport);
        let date_ok = self
            .date
            .map_or(true, |d| game.scheduled_at.date_naive() == d);
        sport_ok && date_ok
    }
}

/// Trait that every fixture supplier must implement.
#[async_trait]
pub trait GameSource: Send + Sync {
    /// Fixtures matching `query`, with whatever stats and odds are known.
    async fn fetch_games(&self, query: &GameQuery) -> Result<Vec<GameData>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Fixed in-memory slate, used by tests and embedding callers.
#[derive(Debug, Clone, Default)]
pub struct StaticGameSource {
    games: Vec<GameData>,
}

impl StaticGameSource {
    pub fn new(games: Vec<GameData>) -> Self {
        StaticGameSource { games }
    }
}

#[async_trait]
impl GameSource for StaticGameSource {
    async fn fetch_games(&self, query: &GameQuery) -> Result<Vec<GameData>> {
        Ok(self
            .games
            .iter()
            .filter(|g| query.matches(g))
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Reads a JSON array of games from disk on every fetch.
#[derive(Debug, Clone)]
pub struct JsonFileGameSource {
    path: PathBuf,
}

impl JsonFileGameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileGameSource { path: path.into() }
    }
}

#[async_trait]
impl GameSource for JsonFileGameSource {
    async fn fetch_games(&self, query: &GameQuery) -> Result<Vec<GameData>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))?;
        let games: Vec<GameData> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing games from {}", self.path.display()))?;
        Ok(games.into_iter().filter(|g| query.matches(g)).collect())
    }

    fn name(&self) -> &str {
        "json-file"
    }
}
