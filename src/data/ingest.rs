//! Loader for previously downloaded FPL and Understat JSON dumps
//!
//! Expected layout under the raw directory:
//! - `bootstrap_static.json`: teams and players (`elements`)
//! - `fixtures.json`: every fixture of the season
//! - `player_<id>.json`: per-player match history
//! - `understat_team_stats.json` (optional): season xG totals per team

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::data::database::Database;
use crate::features::TeamXgContext;
use crate::{
    Fixture, FixtureId, FplError, InjuryStatus, MatchRecord, Player, PlayerId, Position, Result,
    Team, TeamId,
};

/// Raw team from bootstrap-static
#[derive(Debug, Clone, Deserialize)]
pub struct RawTeam {
    pub id: i64,
    pub name: String,
    pub short_name: String,
    #[serde(default)]
    pub strength: Option<f64>,
}

/// Raw player (`element`) from bootstrap-static
#[derive(Debug, Clone, Deserialize)]
pub struct RawElement {
    pub id: i64,
    pub first_name: String,
    pub second_name: String,
    pub team: i64,
    pub element_type: i64,
    /// a = available, d = doubtful, i = injured, u = unavailable, s = suspended
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub news_return_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBootstrap {
    #[serde(default)]
    pub teams: Vec<RawTeam>,
    #[serde(default)]
    pub elements: Vec<RawElement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawFixture {
    pub id: i64,
    pub event: Option<u32>,
    pub team_h: i64,
    pub team_a: i64,
    #[serde(default)]
    pub kickoff_time: Option<String>,
}

/// One row of a player's `history`
#[derive(Debug, Clone, Deserialize)]
pub struct RawHistoryRow {
    pub fixture: i64,
    pub minutes: u32,
    pub goals_scored: u32,
    pub assists: u32,
    pub total_points: i32,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub expected_goals: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub expected_assists: Option<f64>,
    #[serde(default)]
    pub shots_on_target: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPlayerSummary {
    #[serde(default)]
    pub history: Vec<RawHistoryRow>,
}

/// FPL serialises expected stats as strings ("0.45"); accept either form
fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Lenient>::deserialize(deserializer)? {
        Some(Lenient::Number(n)) => Some(n),
        Some(Lenient::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

impl RawTeam {
    pub fn to_team(&self) -> Team {
        Team {
            id: TeamId(self.id),
            name: self.name.clone(),
            short_name: self.short_name.clone(),
            strength: self.strength,
        }
    }
}

impl RawElement {
    pub fn to_player(&self) -> Player {
        Player {
            id: PlayerId(self.id),
            first_name: self.first_name.clone(),
            second_name: self.second_name.clone(),
            team_id: TeamId(self.team),
            position: Position::from_element_type(self.element_type),
        }
    }

    /// Availability flag; anything other than "a" counts as injured
    pub fn to_injury(&self, fixtures: &[Fixture]) -> InjuryStatus {
        let code = self.status.as_deref().unwrap_or("a");
        let label = match code {
            "a" => None,
            "d" => Some("Doubtful".to_string()),
            "i" => Some("Injured".to_string()),
            "u" => Some("Unavailable".to_string()),
            "s" => Some("Suspended".to_string()),
            "n" => Some("Not available".to_string()),
            other => Some(other.to_string()),
        };
        let expected_return = self
            .news_return_date
            .as_deref()
            .and_then(parse_date)
            .and_then(|date| gameweek_on_or_after(fixtures, date));

        InjuryStatus {
            player_id: PlayerId(self.id),
            is_injured: code != "a",
            status: label,
            expected_return,
        }
    }
}

impl RawFixture {
    pub fn to_fixture(&self) -> Fixture {
        Fixture {
            id: FixtureId(self.id),
            event: self.event,
            home_team: TeamId(self.team_h),
            away_team: TeamId(self.team_a),
            kickoff_time: self.kickoff_time.as_deref().and_then(parse_timestamp),
        }
    }
}

impl RawHistoryRow {
    pub fn to_record(&self, player_id: PlayerId) -> MatchRecord {
        MatchRecord {
            player_id,
            fixture_id: FixtureId(self.fixture),
            minutes: self.minutes,
            goals: self.goals_scored,
            assists: self.assists,
            total_points: self.total_points,
            xg: self.expected_goals,
            xa: self.expected_assists,
            shots: self.shots_on_target,
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    parse_timestamp(s)
        .map(|t| t.date_naive())
        .or_else(|| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}

/// First gameweek with a kickoff on or after `date`
fn gameweek_on_or_after(fixtures: &[Fixture], date: NaiveDate) -> Option<u32> {
    fixtures
        .iter()
        .filter_map(|f| match (f.event, f.kickoff_time) {
            (Some(event), Some(kickoff)) if kickoff.date_naive() >= date => Some(event),
            _ => None,
        })
        .min()
}

/// Counts from one load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestSummary {
    pub teams: usize,
    pub players: usize,
    pub fixtures: usize,
    pub match_records: usize,
    pub injured: usize,
    pub team_xg: usize,
    /// Players whose history file was unreadable
    pub skipped_players: usize,
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Teams:          {}", self.teams)?;
        writeln!(f, "Players:        {}", self.players)?;
        writeln!(f, "Fixtures:       {}", self.fixtures)?;
        writeln!(f, "Match records:  {}", self.match_records)?;
        writeln!(f, "Flagged:        {}", self.injured)?;
        writeln!(f, "Team xG rows:   {}", self.team_xg)?;
        write!(f, "Skipped:        {}", self.skipped_players)
    }
}

/// Reads the dump directory and upserts it into the database
pub struct DumpLoader {
    raw_dir: PathBuf,
}

impl DumpLoader {
    pub fn new<P: AsRef<Path>>(raw_dir: P) -> Self {
        DumpLoader {
            raw_dir: raw_dir.as_ref().to_path_buf(),
        }
    }

    fn read_json<T: DeserializeOwned>(&self, file_name: &str) -> Result<T> {
        let path = self.raw_dir.join(file_name);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            FplError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| FplError::Parse(format!("{}: {}", path.display(), e)))
    }

    pub fn load_bootstrap(&self) -> Result<RawBootstrap> {
        self.read_json("bootstrap_static.json")
    }

    pub fn load_fixtures(&self) -> Result<Vec<RawFixture>> {
        self.read_json("fixtures.json")
    }

    /// A player's history; `None` when no file was downloaded for them
    pub fn load_player_history(&self, player: PlayerId) -> Result<Option<RawPlayerSummary>> {
        let file_name = format!("player_{}.json", player.0);
        if !self.raw_dir.join(&file_name).exists() {
            return Ok(None);
        }
        self.read_json(&file_name).map(Some)
    }

    /// Understat totals keyed by team name; empty when the file is absent
    pub fn load_team_xg(&self) -> Result<HashMap<String, TeamXgContext>> {
        let file_name = "understat_team_stats.json";
        if !self.raw_dir.join(file_name).exists() {
            log::info!("No {} found, xG context disabled", file_name);
            return Ok(HashMap::new());
        }
        self.read_json(file_name)
    }

    /// Load everything into the database. Re-running is idempotent.
    pub fn load_into(&self, db: &Database) -> Result<IngestSummary> {
        let mut summary = IngestSummary::default();

        log::info!("Loading dumps from {}", self.raw_dir.display());
        let bootstrap = self.load_bootstrap()?;
        let fixtures: Vec<Fixture> = self
            .load_fixtures()?
            .iter()
            .map(RawFixture::to_fixture)
            .collect();

        for raw in &bootstrap.teams {
            db.upsert_team(&raw.to_team())?;
            summary.teams += 1;
        }

        for fixture in &fixtures {
            db.upsert_fixture(fixture)?;
            summary.fixtures += 1;
        }

        for raw in &bootstrap.elements {
            db.upsert_player(&raw.to_player())?;
            let injury = raw.to_injury(&fixtures);
            if injury.is_injured {
                summary.injured += 1;
            }
            db.upsert_injury(&injury)?;
            summary.players += 1;
        }

        for raw in &bootstrap.elements {
            let player_id = PlayerId(raw.id);
            match self.load_player_history(player_id) {
                Ok(Some(history)) => {
                    let records: Vec<MatchRecord> = history
                        .history
                        .iter()
                        .map(|row| row.to_record(player_id))
                        .collect();
                    summary.match_records += db.upsert_match_records(&records)?;
                }
                Ok(None) => log::debug!("No history file for {}", player_id),
                Err(e) => {
                    log::warn!("Skipping history for {}: {}", player_id, e);
                    summary.skipped_players += 1;
                }
            }
        }

        for (name, stats) in self.load_team_xg()? {
            db.upsert_team_xg(&name, &stats)?;
            summary.team_xg += 1;
        }

        log::info!(
            "Loaded {} teams, {} players, {} fixtures, {} match records",
            summary.teams,
            summary.players,
            summary.fixtures,
            summary.match_records
        );
        Ok(summary)
    }
}
