//! Read-only, per-run view of all source data
//!
//! Everything a training or inference run needs is read from the database
//! once and indexed by id. Player histories are sorted by gameweek, and the
//! only way to hand a slice of one to the feature code is through a
//! `HistoryPrefix` cut at a gameweek or a position.

use std::collections::HashMap;

use crate::data::database::Database;
use crate::features::TeamContext;
use crate::{Fixture, FixtureId, InjuryStatus, MatchRecord, Player, PlayerId, Result, Team, TeamId};

/// A match record tagged with its fixture's gameweek
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub event: u32,
    pub record: MatchRecord,
}

/// One player's records in chronological order
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    /// Sort by gameweek, ties broken by fixture id
    pub fn new(mut entries: Vec<HistoryEntry>) -> Self {
        entries.sort_by_key(|e| (e.event, e.record.fixture_id));
        History { entries }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Matches from gameweeks strictly earlier than `event`
    pub fn before(&self, event: u32) -> HistoryPrefix<'_> {
        let end = self.entries.partition_point(|e| e.event < event);
        HistoryPrefix {
            entries: &self.entries[..end],
        }
    }
}

/// A strict prefix of a player's history
#[derive(Debug, Clone, Copy)]
pub struct HistoryPrefix<'a> {
    entries: &'a [HistoryEntry],
}

impl<'a> HistoryPrefix<'a> {
    pub fn records(&self) -> impl Iterator<Item = &'a MatchRecord> {
        self.entries.iter().map(|e| &e.record)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Pre-fetched source data for one run
#[derive(Debug, Default)]
pub struct Snapshot {
    players: HashMap<PlayerId, Player>,
    teams: HashMap<TeamId, Team>,
    fixtures: HashMap<FixtureId, Fixture>,
    histories: HashMap<PlayerId, History>,
    injuries: HashMap<PlayerId, InjuryStatus>,
    context: TeamContext,
    empty: History,
}

impl Snapshot {
    /// Read every table once
    pub fn load(db: &Database) -> Result<Self> {
        let teams = db.get_all_teams()?;
        let context = TeamContext::from_teams(&teams, db.get_team_xg()?);
        let snapshot = Snapshot::from_parts(
            db.get_all_players()?,
            teams,
            db.get_all_fixtures()?,
            db.get_all_match_records()?,
            db.get_all_injuries()?,
            context,
        );
        log::info!(
            "Loaded snapshot: {} players, {} teams, {} fixtures, {} histories, xG for {} teams",
            snapshot.players.len(),
            snapshot.teams.len(),
            snapshot.fixtures.len(),
            snapshot.histories.len(),
            snapshot.context.xg_team_count()
        );
        Ok(snapshot)
    }

    pub fn from_parts(
        players: Vec<Player>,
        teams: Vec<Team>,
        fixtures: Vec<Fixture>,
        records: Vec<MatchRecord>,
        injuries: Vec<InjuryStatus>,
        context: TeamContext,
    ) -> Self {
        let fixtures: HashMap<FixtureId, Fixture> =
            fixtures.into_iter().map(|f| (f.id, f)).collect();

        let mut grouped: HashMap<PlayerId, Vec<HistoryEntry>> = HashMap::new();
        let mut unscheduled = 0;
        for record in records {
            // Records for unscheduled or unknown fixtures have no place in time
            match fixtures.get(&record.fixture_id).and_then(|f| f.event) {
                Some(event) => grouped
                    .entry(record.player_id)
                    .or_default()
                    .push(HistoryEntry { event, record }),
                None => unscheduled += 1,
            }
        }
        if unscheduled > 0 {
            log::debug!("Skipped {} records without a scheduled fixture", unscheduled);
        }

        Snapshot {
            players: players.into_iter().map(|p| (p.id, p)).collect(),
            teams: teams.into_iter().map(|t| (t.id, t)).collect(),
            fixtures,
            histories: grouped
                .into_iter()
                .map(|(id, entries)| (id, History::new(entries)))
                .collect(),
            injuries: injuries.into_iter().map(|i| (i.player_id, i)).collect(),
            context,
            empty: History::default(),
        }
    }

    /// A player's chronological history; empty when unknown
    pub fn history(&self, player: PlayerId) -> &History {
        self.histories.get(&player).unwrap_or(&self.empty)
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn team(&self, id: TeamId) -> Option<&Team> {
        self.teams.get(&id)
    }

    pub fn fixture(&self, id: FixtureId) -> Option<&Fixture> {
        self.fixtures.get(&id)
    }

    pub fn injury(&self, player: PlayerId) -> Option<&InjuryStatus> {
        self.injuries.get(&player)
    }

    pub fn is_injured(&self, player: PlayerId) -> bool {
        self.injury(player).map(|s| s.is_injured).unwrap_or(false)
    }

    pub fn context(&self) -> &TeamContext {
        &self.context
    }

    /// Ids of every player with recorded matches, ascending
    pub fn history_player_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.histories.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Fixtures of one gameweek, by fixture id
    pub fn fixtures_in_gameweek(&self, event: u32) -> Vec<&Fixture> {
        let mut fixtures: Vec<&Fixture> = self
            .fixtures
            .values()
            .filter(|f| f.event == Some(event))
            .collect();
        fixtures.sort_by_key(|f| f.id);
        fixtures
    }

    /// Current squad of a team, by player id
    pub fn roster(&self, team: TeamId) -> Vec<&Player> {
        let mut players: Vec<&Player> = self
            .players
            .values()
            .filter(|p| p.team_id == team)
            .collect();
        players.sort_by_key(|p| p.id);
        players
    }

    /// Latest gameweek any player has a recorded match in
    pub fn latest_played_gameweek(&self) -> Option<u32> {
        self.histories
            .values()
            .filter_map(|h| h.entries().last().map(|e| e.event))
            .max()
    }
}
