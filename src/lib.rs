//! Fantasy football points prediction
//!
//! Turns per-match player statistics into a leakage-free, chronologically
//! ordered feature table, trains a points regressor on it and scores upcoming
//! gameweeks with the same feature logic.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod training;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::features::FeatureSet;

/// Unique identifier for a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub i64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player({})", self.0)
    }
}

/// Unique identifier for a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamId(pub i64);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Team({})", self.0)
    }
}

/// Unique identifier for a fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FixtureId(pub i64);

impl fmt::Display for FixtureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixture({})", self.0)
    }
}

/// Playing position (FPL `element_type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

impl Position {
    pub fn code(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "GKP",
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Forward => "FWD",
        }
    }

    pub fn from_element_type(element_type: i64) -> Option<Self> {
        match element_type {
            1 => Some(Position::Goalkeeper),
            2 => Some(Position::Defender),
            3 => Some(Position::Midfielder),
            4 => Some(Position::Forward),
            _ => None,
        }
    }

    pub fn element_type(&self) -> i64 {
        match self {
            Position::Goalkeeper => 1,
            Position::Defender => 2,
            Position::Midfielder => 3,
            Position::Forward => 4,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A Premier League team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub short_name: String,
    /// Coarse 1-5 strength rating, when the source provides one
    pub strength: Option<f64>,
}

/// A player and their current club
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub first_name: String,
    pub second_name: String,
    pub team_id: TeamId,
    pub position: Option<Position>,
}

impl Player {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.second_name)
            .trim()
            .to_string()
    }
}

/// A scheduled match between two teams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: FixtureId,
    /// Gameweek; `None` while the fixture is unscheduled
    pub event: Option<u32>,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub kickoff_time: Option<DateTime<Utc>>,
}

impl Fixture {
    /// Get the opponent for a given team
    pub fn opponent(&self, team: TeamId) -> Option<TeamId> {
        if team == self.home_team {
            Some(self.away_team)
        } else if team == self.away_team {
            Some(self.home_team)
        } else {
            None
        }
    }
}

/// One player's performance in one fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub player_id: PlayerId,
    pub fixture_id: FixtureId,
    pub minutes: u32,
    pub goals: u32,
    pub assists: u32,
    pub total_points: i32,
    pub xg: Option<f64>,
    pub xa: Option<f64>,
    pub shots: Option<u32>,
}

/// Availability flag for a player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjuryStatus {
    pub player_id: PlayerId,
    pub is_injured: bool,
    /// e.g. "Doubtful", "Injured", "Unavailable"
    pub status: Option<String>,
    /// Gameweek the player is expected back
    pub expected_return: Option<u32>,
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum FplError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Player not found with ID: {0}")]
    PlayerNotFound(PlayerId),

    #[error("Fixture not found with ID: {0}")]
    FixtureNotFound(FixtureId),

    #[error("{0} has no gameweek assigned")]
    FixtureUnscheduled(FixtureId),

    #[error("No trained model at {0} - run `fpl train` first")]
    NoModel(String),

    #[error("Feature list mismatch: model expects {expected:?}, feature file lists {found:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Unknown feature name: {0}")]
    UnknownFeature(String),

    #[error("Not enough data: {0}")]
    InsufficientData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, FplError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub features: FeatureConfig,
    pub training: TrainingConfig,
    pub prediction: PredictionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
    /// Directory holding the downloaded JSON dumps
    pub raw_dir: String,
    /// Directory holding model.json and features.txt
    pub model_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Preset name: "basic" or "enhanced"
    pub set: String,
    /// Explicit ordered feature list; overrides `set` when present
    #[serde(default)]
    pub names: Option<Vec<String>>,
    /// Rolling window for the windowed calculators
    pub window: usize,
}

impl FeatureConfig {
    /// Resolve the configured, ordered feature set
    pub fn feature_set(&self) -> Result<FeatureSet> {
        match &self.names {
            Some(names) => FeatureSet::from_names(names),
            None => FeatureSet::preset(&self.set),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub test_size: f64,
    pub seed: u64,
    /// Ridge penalty on standardised coefficients
    pub l2: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    pub top_n: usize,
    pub include_unavailable: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data: DataConfig {
                database_path: "data/fpl.db".to_string(),
                raw_dir: "data/raw".to_string(),
                model_dir: "model".to_string(),
            },
            features: FeatureConfig {
                set: "enhanced".to_string(),
                names: None,
                window: 5,
            },
            training: TrainingConfig {
                test_size: 0.2,
                seed: 42,
                l2: 1.0,
            },
            prediction: PredictionConfig {
                top_n: 20,
                include_unavailable: false,
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FplError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| FplError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| FplError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
