//! Point-in-time training dataset
//!
//! Each player's history is replayed forward. The row for a match is built
//! from the buffers as they stood before that match, labelled with the points
//! it produced, and only then is the match pushed into the buffers. Pushes
//! wait for the gameweek to close, matching the `event < g` cut at inference.

use std::fmt;

use crate::data::database::FeatureSink;
use crate::data::snapshot::Snapshot;
use crate::features::{FeatureAssembler, FeatureRecord, FeatureSet, RollingHistory};
use crate::{FplError, MatchRecord, PlayerId, Result};

/// Counts from one generation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetSummary {
    pub players: usize,
    pub rows: usize,
    pub skipped_pairs: usize,
    pub skipped_players: usize,
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows from {} players ({} pairs skipped, {} players skipped)",
            self.rows, self.players, self.skipped_pairs, self.skipped_players
        )
    }
}

/// Feature rows with realised points, one per (player, fixture)
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    rows: Vec<FeatureRecord>,
    summary: DatasetSummary,
    window: usize,
}

impl TrainingDataset {
    /// Replay every player's history in ascending player order
    pub fn generate(snapshot: &Snapshot, window: usize) -> Self {
        let assembler = FeatureAssembler::new(snapshot, window);
        let mut rows = Vec::new();
        let mut summary = DatasetSummary::default();

        for player_id in snapshot.history_player_ids() {
            match Self::replay_player(snapshot, &assembler, player_id, &mut summary) {
                Ok(player_rows) => {
                    summary.players += 1;
                    rows.extend(player_rows);
                }
                Err(e) => {
                    log::warn!("Skipping {}: {}", player_id, e);
                    summary.skipped_players += 1;
                }
            }
        }

        summary.rows = rows.len();
        log::info!("Generated training dataset: {}", summary);
        TrainingDataset {
            rows,
            summary,
            window: assembler.window(),
        }
    }

    fn replay_player(
        snapshot: &Snapshot,
        assembler: &FeatureAssembler<'_>,
        player_id: PlayerId,
        summary: &mut DatasetSummary,
    ) -> Result<Vec<FeatureRecord>> {
        if snapshot.player(player_id).is_none() {
            return Err(FplError::PlayerNotFound(player_id));
        }

        let mut buffers = RollingHistory::new();
        let mut pending: Vec<&MatchRecord> = Vec::new();
        let mut pending_event = None;
        let mut rows = Vec::new();

        for entry in snapshot.history(player_id).entries() {
            let record = &entry.record;
            // A double gameweek's matches stay out of each other's features
            if pending_event != Some(entry.event) {
                for earlier in pending.drain(..) {
                    buffers.push(earlier);
                }
                pending_event = Some(entry.event);
            }
            // Features first, from matches before this one
            match assembler.assemble(player_id, record.fixture_id, &buffers) {
                Ok(mut row) => {
                    row.label = Some(record.total_points as f64);
                    rows.push(row);
                }
                Err(e) => {
                    log::warn!("Skipping {} at {}: {}", player_id, record.fixture_id, e);
                    summary.skipped_pairs += 1;
                }
            }
            pending.push(record);
        }

        Ok(rows)
    }

    pub fn rows(&self) -> &[FeatureRecord] {
        &self.rows
    }

    pub fn summary(&self) -> &DatasetSummary {
        &self.summary
    }

    /// Rolling window the rows were built with
    pub fn window(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Model inputs and labels for rows carrying every feature in `set`
    pub fn matrix(&self, set: &FeatureSet) -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for row in &self.rows {
            if let (Some(vector), Some(label)) = (set.vector(&row.values), row.label) {
                features.push(vector);
                labels.push(label);
            }
        }

        let dropped = self.rows.len() - features.len();
        if dropped > 0 {
            log::info!(
                "Dropped {} of {} rows with missing features",
                dropped,
                self.rows.len()
            );
        }
        (features, labels)
    }

    /// Write every row, complete or not, to the feature store
    pub fn persist<S: FeatureSink>(&self, sink: &mut S) -> Result<usize> {
        for row in &self.rows {
            sink.store_feature_record(row)?;
        }
        Ok(self.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::database::MemoryFeatureStore;
    use crate::features::{Feature, TeamContext};
    use crate::{Fixture, FixtureId, Player, Position, TeamId};

    fn fixtures(n: i64) -> Vec<Fixture> {
        (1..=n)
            .map(|gw| Fixture {
                id: FixtureId(gw * 10),
                event: Some(gw as u32),
                home_team: TeamId(if gw % 2 == 0 { 1 } else { 2 }),
                away_team: TeamId(if gw % 2 == 0 { 2 } else { 1 }),
                kickoff_time: None,
            })
            .collect()
    }

    fn player(id: i64) -> Player {
        Player {
            id: PlayerId(id),
            first_name: "P".to_string(),
            second_name: id.to_string(),
            team_id: TeamId(1),
            position: Some(Position::Forward),
        }
    }

    fn record(player: i64, gw: i64, minutes: u32, points: i32) -> MatchRecord {
        MatchRecord {
            player_id: PlayerId(player),
            fixture_id: FixtureId(gw * 10),
            minutes,
            goals: if points > 5 { 1 } else { 0 },
            assists: 0,
            total_points: points,
            xg: Some(0.1 * gw as f64),
            xa: None,
            shots: Some(1),
        }
    }

    fn snapshot(records: Vec<MatchRecord>) -> Snapshot {
        Snapshot::from_parts(
            vec![player(1), player(2)],
            vec![],
            fixtures(8),
            records,
            vec![],
            TeamContext::new(),
        )
    }

    fn history() -> Vec<MatchRecord> {
        vec![
            record(1, 1, 90, 2),
            record(1, 2, 90, 6),
            record(1, 3, 60, 1),
            record(1, 4, 0, 0),
            record(1, 5, 90, 9),
            record(2, 1, 20, 1),
            record(2, 3, 90, 3),
        ]
    }

    #[test]
    fn test_rows_use_only_earlier_matches() {
        let dataset = TrainingDataset::generate(&snapshot(history()), 5);
        let rows: Vec<&FeatureRecord> = dataset
            .rows()
            .iter()
            .filter(|r| r.player_id == PlayerId(1))
            .collect();

        assert_eq!(rows.len(), 5);
        // first match has no past at all
        assert_eq!(rows[0].values.avg_points_last_5, 0.0);
        assert_eq!(rows[0].values.rotation_risk, 0.5);
        assert_eq!(rows[0].label, Some(2.0));
        // gw4 row sees [2, 6, 1]
        assert_eq!(rows[3].values.form, 3.0);
        assert_eq!(rows[3].label, Some(0.0));
    }

    #[test]
    fn test_appending_later_matches_leaves_earlier_rows_unchanged() {
        let base = vec![record(1, 1, 90, 2), record(1, 2, 90, 6), record(1, 3, 90, 1), record(1, 4, 90, 4)];
        let before = TrainingDataset::generate(&snapshot(base.clone()), 5);

        let mut extended = base;
        extended.push(record(1, 5, 90, 10));
        let after = TrainingDataset::generate(&snapshot(extended), 5);

        assert_eq!(after.len(), before.len() + 1);
        assert_eq!(&after.rows()[..before.len()], before.rows());
        assert_eq!(after.rows()[3].values.form, 3.0);
    }

    #[test]
    fn test_mutating_a_match_only_affects_later_rows() {
        let original = TrainingDataset::generate(&snapshot(history()), 5);

        let mut changed = history();
        // gw3 for player 1
        changed[2].minutes = 0;
        changed[2].total_points = 15;
        changed[2].xg = Some(2.0);
        let mutated = TrainingDataset::generate(&snapshot(changed), 5);

        for i in 0..=2 {
            assert_eq!(original.rows()[i].values, mutated.rows()[i].values);
        }
        assert_ne!(original.rows()[2].label, mutated.rows()[2].label);
        assert_ne!(original.rows()[3].values, mutated.rows()[3].values);
    }

    #[test]
    fn test_double_gameweek_matches_do_not_see_each_other() {
        let mut fixture_list = fixtures(8);
        fixture_list.push(Fixture {
            id: FixtureId(25),
            event: Some(2),
            home_team: TeamId(1),
            away_team: TeamId(2),
            kickoff_time: None,
        });
        let mut extra = record(1, 2, 90, 12);
        extra.fixture_id = FixtureId(25);
        let records = vec![record(1, 1, 90, 2), record(1, 2, 90, 6), extra, record(1, 3, 90, 1)];

        let dataset = TrainingDataset::generate(
            &Snapshot::from_parts(
                vec![player(1)],
                vec![],
                fixture_list,
                records,
                vec![],
                TeamContext::new(),
            ),
            5,
        );
        let rows = dataset.rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].fixture_id, FixtureId(20));
        assert_eq!(rows[2].fixture_id, FixtureId(25));
        // both gameweek 2 rows see only gameweek 1
        assert_eq!(rows[1].values.form, 2.0);
        assert_eq!(rows[2].values.form, 2.0);
        assert_eq!(rows[2].label, Some(12.0));
        // gameweek 3 sees both
        assert_eq!(rows[3].values.form, (2.0 + 6.0 + 12.0) / 3.0);
    }

    #[test]
    fn test_generation_is_idempotent() {
        let snapshot = snapshot(history());
        let first = TrainingDataset::generate(&snapshot, 5);
        let second = TrainingDataset::generate(&snapshot, 5);
        assert_eq!(first.rows(), second.rows());

        let mut store = MemoryFeatureStore::new();
        first.persist(&mut store).unwrap();
        second.persist(&mut store).unwrap();
        assert_eq!(store.len(), first.len());
    }

    #[test]
    fn test_unknown_player_is_skipped() {
        let mut records = history();
        records.push(record(99, 1, 90, 5));
        let dataset = TrainingDataset::generate(&snapshot(records), 5);

        assert_eq!(dataset.summary().skipped_players, 1);
        assert_eq!(dataset.summary().players, 2);
        assert!(dataset.rows().iter().all(|r| r.player_id != PlayerId(99)));
    }

    #[test]
    fn test_matrix_drops_incomplete_rows() {
        let dataset = TrainingDataset::generate(&snapshot(history()), 5);

        let basic = FeatureSet::basic();
        let (x, y) = dataset.matrix(&basic);
        assert_eq!(x.len(), dataset.len());
        assert_eq!(y.len(), x.len());
        assert_eq!(x[0].len(), basic.len());

        // first rows have no xG history yet
        let xg_only = FeatureSet::new(vec![Feature::AvgXgLast5]);
        let (x, _) = dataset.matrix(&xg_only);
        assert_eq!(x.len(), dataset.len() - 2);
    }
}
