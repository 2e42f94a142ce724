//! SQLite storage for FPL data and computed features

use crate::features::{FeatureRecord, TeamXgContext};
use crate::{
    Fixture, FixtureId, InjuryStatus, MatchRecord, Player, PlayerId, Position, Result,
    Team, TeamId,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

/// Destination for computed feature records, keyed by (player, fixture)
pub trait FeatureSink {
    /// Insert or replace the record for its (player, fixture) pair
    fn store_feature_record(&mut self, record: &FeatureRecord) -> Result<()>;
}

/// In-memory feature store
#[derive(Debug, Default)]
pub struct MemoryFeatureStore {
    records: HashMap<(PlayerId, FixtureId), FeatureRecord>,
}

impl MemoryFeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, player: PlayerId, fixture: FixtureId) -> Option<&FeatureRecord> {
        self.records.get(&(player, fixture))
    }
}

impl FeatureSink for MemoryFeatureStore {
    fn store_feature_record(&mut self, record: &FeatureRecord) -> Result<()> {
        self.records
            .insert((record.player_id, record.fixture_id), record.clone());
        Ok(())
    }
}

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS teams (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                short_name TEXT NOT NULL,
                strength REAL
            );

            CREATE TABLE IF NOT EXISTS players (
                id INTEGER PRIMARY KEY,
                first_name TEXT NOT NULL,
                second_name TEXT NOT NULL,
                team_id INTEGER NOT NULL REFERENCES teams(id),
                element_type INTEGER
            );

            CREATE TABLE IF NOT EXISTS fixtures (
                id INTEGER PRIMARY KEY,
                event INTEGER,
                team_h INTEGER NOT NULL REFERENCES teams(id),
                team_a INTEGER NOT NULL REFERENCES teams(id),
                kickoff_time TEXT
            );

            CREATE TABLE IF NOT EXISTS player_stats (
                player_id INTEGER NOT NULL REFERENCES players(id),
                fixture_id INTEGER NOT NULL REFERENCES fixtures(id),
                minutes INTEGER NOT NULL,
                goals_scored INTEGER NOT NULL,
                assists INTEGER NOT NULL,
                total_points INTEGER NOT NULL,
                expected_goals REAL,
                expected_assists REAL,
                shots INTEGER,
                UNIQUE(player_id, fixture_id)
            );

            CREATE TABLE IF NOT EXISTS injury_status (
                player_id INTEGER PRIMARY KEY REFERENCES players(id),
                is_injured INTEGER NOT NULL,
                status TEXT,
                expected_return INTEGER
            );

            CREATE TABLE IF NOT EXISTS team_xg (
                team_name TEXT PRIMARY KEY,
                xg_for REAL NOT NULL,
                xg_against REAL NOT NULL,
                matches_played INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS model_features (
                player_id INTEGER NOT NULL,
                fixture_id INTEGER NOT NULL,
                event INTEGER NOT NULL,
                features TEXT NOT NULL,
                total_points REAL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY(player_id, fixture_id)
            );

            CREATE INDEX IF NOT EXISTS idx_fixtures_event ON fixtures(event);
            CREATE INDEX IF NOT EXISTS idx_players_team ON players(team_id);
            CREATE INDEX IF NOT EXISTS idx_stats_player ON player_stats(player_id);
            "#,
        )?;
        Ok(())
    }

    // ==================== Team Operations ====================

    /// Insert or update a team
    pub fn upsert_team(&self, team: &Team) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO teams (id, name, short_name, strength)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                short_name = excluded.short_name,
                strength = COALESCE(excluded.strength, strength)
            "#,
            params![team.id.0, team.name, team.short_name, team.strength],
        )?;
        Ok(())
    }

    /// Get all teams
    pub fn get_all_teams(&self) -> Result<Vec<Team>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, short_name, strength FROM teams ORDER BY id")?;

        let teams = stmt
            .query_map([], |row| {
                Ok(Team {
                    id: TeamId(row.get(0)?),
                    name: row.get(1)?,
                    short_name: row.get(2)?,
                    strength: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(teams)
    }

    // ==================== Player Operations ====================

    /// Insert or update a player; a transfer moves them to the new team
    pub fn upsert_player(&self, player: &Player) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO players (id, first_name, second_name, team_id, element_type)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                first_name = excluded.first_name,
                second_name = excluded.second_name,
                team_id = excluded.team_id,
                element_type = COALESCE(excluded.element_type, element_type)
            "#,
            params![
                player.id.0,
                player.first_name,
                player.second_name,
                player.team_id.0,
                player.position.map(|p| p.element_type()),
            ],
        )?;
        Ok(())
    }

    /// Get all players
    pub fn get_all_players(&self) -> Result<Vec<Player>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, first_name, second_name, team_id, element_type FROM players ORDER BY id",
        )?;

        let players = stmt
            .query_map([], Self::row_to_player)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(players)
    }

    fn row_to_player(row: &rusqlite::Row) -> rusqlite::Result<Player> {
        let element_type: Option<i64> = row.get(4)?;
        Ok(Player {
            id: PlayerId(row.get(0)?),
            first_name: row.get(1)?,
            second_name: row.get(2)?,
            team_id: TeamId(row.get(3)?),
            position: element_type.and_then(Position::from_element_type),
        })
    }

    // ==================== Fixture Operations ====================

    /// Insert or update a fixture; rescheduling may change or clear its event
    pub fn upsert_fixture(&self, fixture: &Fixture) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO fixtures (id, event, team_h, team_a, kickoff_time)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                event = excluded.event,
                team_h = excluded.team_h,
                team_a = excluded.team_a,
                kickoff_time = excluded.kickoff_time
            "#,
            params![
                fixture.id.0,
                fixture.event,
                fixture.home_team.0,
                fixture.away_team.0,
                fixture.kickoff_time.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Get all fixtures, scheduled ones first by gameweek
    pub fn get_all_fixtures(&self) -> Result<Vec<Fixture>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event, team_h, team_a, kickoff_time
             FROM fixtures
             ORDER BY event IS NULL, event, id",
        )?;

        let fixtures = stmt
            .query_map([], |row| {
                let kickoff: Option<String> = row.get(4)?;
                Ok(Fixture {
                    id: FixtureId(row.get(0)?),
                    event: row.get(1)?,
                    home_team: TeamId(row.get(2)?),
                    away_team: TeamId(row.get(3)?),
                    kickoff_time: kickoff.as_deref().and_then(parse_timestamp),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(fixtures)
    }

    // ==================== Match Stat Operations ====================

    /// Insert or update a player's stats for one fixture
    pub fn upsert_match_record(&self, record: &MatchRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO player_stats (player_id, fixture_id, minutes, goals_scored, assists,
                                      total_points, expected_goals, expected_assists, shots)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(player_id, fixture_id) DO UPDATE SET
                minutes = excluded.minutes,
                goals_scored = excluded.goals_scored,
                assists = excluded.assists,
                total_points = excluded.total_points,
                expected_goals = COALESCE(excluded.expected_goals, expected_goals),
                expected_assists = COALESCE(excluded.expected_assists, expected_assists),
                shots = COALESCE(excluded.shots, shots)
            "#,
            params![
                record.player_id.0,
                record.fixture_id.0,
                record.minutes,
                record.goals,
                record.assists,
                record.total_points,
                record.xg,
                record.xa,
                record.shots,
            ],
        )?;
        Ok(())
    }

    /// Insert multiple match records in one transaction
    pub fn upsert_match_records(&self, records: &[MatchRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;
        for record in records {
            self.upsert_match_record(record)?;
            count += 1;
        }
        tx.commit()?;
        Ok(count)
    }

    /// Get every stored match record
    pub fn get_all_match_records(&self) -> Result<Vec<MatchRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT player_id, fixture_id, minutes, goals_scored, assists, total_points,
                    expected_goals, expected_assists, shots
             FROM player_stats
             ORDER BY player_id, fixture_id",
        )?;

        let records = stmt
            .query_map([], |row| {
                Ok(MatchRecord {
                    player_id: PlayerId(row.get(0)?),
                    fixture_id: FixtureId(row.get(1)?),
                    minutes: row.get(2)?,
                    goals: row.get(3)?,
                    assists: row.get(4)?,
                    total_points: row.get(5)?,
                    xg: row.get(6)?,
                    xa: row.get(7)?,
                    shots: row.get(8)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    // ==================== Injury Operations ====================

    /// Insert or update a player's availability
    pub fn upsert_injury(&self, status: &InjuryStatus) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO injury_status (player_id, is_injured, status, expected_return)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(player_id) DO UPDATE SET
                is_injured = excluded.is_injured,
                status = excluded.status,
                expected_return = excluded.expected_return
            "#,
            params![
                status.player_id.0,
                status.is_injured,
                status.status,
                status.expected_return,
            ],
        )?;
        Ok(())
    }

    /// Get every availability flag
    pub fn get_all_injuries(&self) -> Result<Vec<InjuryStatus>> {
        let mut stmt = self.conn.prepare(
            "SELECT player_id, is_injured, status, expected_return FROM injury_status ORDER BY player_id",
        )?;

        let injuries = stmt
            .query_map([], |row| {
                Ok(InjuryStatus {
                    player_id: PlayerId(row.get(0)?),
                    is_injured: row.get(1)?,
                    status: row.get(2)?,
                    expected_return: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(injuries)
    }

    // ==================== Team xG Operations ====================

    /// Insert or update a team's season expected-goals totals
    pub fn upsert_team_xg(&self, team_name: &str, stats: &TeamXgContext) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO team_xg (team_name, xg_for, xg_against, matches_played)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(team_name) DO UPDATE SET
                xg_for = excluded.xg_for,
                xg_against = excluded.xg_against,
                matches_played = excluded.matches_played
            "#,
            params![team_name, stats.xg_for, stats.xg_against, stats.matches_played],
        )?;
        Ok(())
    }

    /// Get expected-goals totals keyed by team name
    pub fn get_team_xg(&self) -> Result<HashMap<String, TeamXgContext>> {
        let mut stmt = self
            .conn
            .prepare("SELECT team_name, xg_for, xg_against, matches_played FROM team_xg")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    TeamXgContext {
                        xg_for: row.get(1)?,
                        xg_against: row.get(2)?,
                        matches_played: row.get(3)?,
                    },
                ))
            })?
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;

        Ok(rows)
    }

    // ==================== Feature Store Operations ====================

    /// Remove every stored feature record
    pub fn clear_feature_records(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM model_features", [])?)
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", table),
                [],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        };

        let injured_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM injury_status WHERE is_injured = 1",
            [],
            |row| row.get(0),
        )?;

        let latest_gameweek: Option<u32> = self
            .conn
            .query_row(
                "SELECT MAX(f.event) FROM player_stats s JOIN fixtures f ON f.id = s.fixture_id",
                [],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        Ok(DatabaseStats {
            team_count: count("teams")?,
            player_count: count("players")?,
            fixture_count: count("fixtures")?,
            stat_count: count("player_stats")?,
            feature_count: count("model_features")?,
            injured_count: injured_count as usize,
            latest_gameweek,
        })
    }
}

impl FeatureSink for Database {
    fn store_feature_record(&mut self, record: &FeatureRecord) -> Result<()> {
        let json = serde_json::to_string(&record.values)?;
        self.conn.execute(
            r#"
            INSERT INTO model_features (player_id, fixture_id, event, features, total_points)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(player_id, fixture_id) DO UPDATE SET
                event = excluded.event,
                features = excluded.features,
                total_points = excluded.total_points,
                created_at = datetime('now')
            "#,
            params![
                record.player_id.0,
                record.fixture_id.0,
                record.event,
                json,
                record.label,
            ],
        )?;
        Ok(())
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub team_count: usize,
    pub player_count: usize,
    pub fixture_count: usize,
    pub stat_count: usize,
    pub feature_count: usize,
    pub injured_count: usize,
    /// Latest gameweek with recorded player stats
    pub latest_gameweek: Option<u32>,
}
