//! Gameweek inference
//!
//! Scores every rostered player of a target gameweek with features built
//! from earlier gameweeks only.

use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

use crate::data::snapshot::Snapshot;
use crate::features::{Feature, FeatureAssembler, FeatureSet};
use crate::model::{LinearModel, PointsModel};
use crate::{Fixture, FixtureId, PlayerId, Result, TeamId};

/// Predicted points for one player in one fixture
#[derive(Debug, Clone, Serialize)]
pub struct PlayerPrediction {
    pub player_id: PlayerId,
    pub player_name: String,
    pub team: String,
    pub opponent: String,
    pub position: String,
    pub is_home: bool,
    pub fixture_id: FixtureId,
    pub predicted_points: f64,
    /// Display only
    pub avg_points_last_5: f64,
}

/// A player left out because they are flagged
#[derive(Debug, Clone, Serialize)]
pub struct UnavailablePlayer {
    pub player_id: PlayerId,
    pub player_name: String,
    pub status: Option<String>,
    pub expected_return: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GameweekPredictions {
    pub gameweek: u32,
    pub predictions: Vec<PlayerPrediction>,
    pub unavailable: Vec<UnavailablePlayer>,
}

/// Gameweek after the latest one with recorded stats
pub fn next_gameweek(snapshot: &Snapshot) -> u32 {
    snapshot.latest_played_gameweek().map_or(1, |g| g + 1)
}

/// Scores players with a trained model and its persisted feature order
pub struct Predictor<M: PointsModel = LinearModel> {
    model: M,
    feature_set: FeatureSet,
    window: usize,
}

impl Predictor<LinearModel> {
    /// Load `model.json` and `features.txt` from the model directory
    pub fn load<P: AsRef<Path>>(model_dir: P) -> Result<Self> {
        Predictor::new(LinearModel::load(model_dir)?)
    }
}

impl<M: PointsModel> Predictor<M> {
    /// The model's own feature names fix the vector order and its window
    /// fixes the rolling calculations
    pub fn new(model: M) -> Result<Self> {
        let feature_set = FeatureSet::from_names(model.feature_names())?;
        let window = model.window();
        Ok(Predictor {
            model,
            feature_set,
            window,
        })
    }

    pub fn feature_set(&self) -> &FeatureSet {
        &self.feature_set
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Predict every rostered player of `gameweek`, best first.
    ///
    /// No fixtures in the gameweek yields an empty result.
    pub fn predict_gameweek(
        &self,
        snapshot: &Snapshot,
        gameweek: u32,
        top_n: usize,
        include_unavailable: bool,
    ) -> Result<GameweekPredictions> {
        let fixtures = snapshot.fixtures_in_gameweek(gameweek);
        if fixtures.is_empty() {
            log::info!("No fixtures found for gameweek {}", gameweek);
            return Ok(GameweekPredictions {
                gameweek,
                ..Default::default()
            });
        }

        let assembler = FeatureAssembler::new(snapshot, self.window);
        let mut predictions = Vec::new();
        let mut unavailable = Vec::new();
        let mut flagged: HashSet<PlayerId> = HashSet::new();

        for fixture in &fixtures {
            for team in [fixture.home_team, fixture.away_team] {
                for player in snapshot.roster(team) {
                    if let Some(status) = snapshot.injury(player.id).filter(|s| s.is_injured) {
                        if !include_unavailable {
                            if flagged.insert(player.id) {
                                unavailable.push(UnavailablePlayer {
                                    player_id: player.id,
                                    player_name: player.full_name(),
                                    status: status.status.clone(),
                                    expected_return: status.expected_return,
                                });
                            }
                            continue;
                        }
                    }

                    match self.predict_player(snapshot, &assembler, player.id, fixture) {
                        Ok(Some(prediction)) => predictions.push(prediction),
                        Ok(None) => log::debug!(
                            "Skipping {}: missing features for {}",
                            player.id,
                            fixture.id
                        ),
                        Err(e) => log::warn!("Skipping {} at {}: {}", player.id, fixture.id, e),
                    }
                }
            }
        }

        // Stable, so ties keep roster order
        predictions.sort_by(|a, b| b.predicted_points.total_cmp(&a.predicted_points));
        predictions.truncate(top_n);

        log::info!(
            "Gameweek {}: {} predictions, {} unavailable",
            gameweek,
            predictions.len(),
            unavailable.len()
        );
        Ok(GameweekPredictions {
            gameweek,
            predictions,
            unavailable,
        })
    }

    fn predict_player(
        &self,
        snapshot: &Snapshot,
        assembler: &FeatureAssembler<'_>,
        player_id: PlayerId,
        fixture: &Fixture,
    ) -> Result<Option<PlayerPrediction>> {
        let record = assembler.assemble_before(player_id, fixture.id)?;
        let Some(vector) = self.feature_set.vector(&record.values) else {
            return Ok(None);
        };
        let predicted_points = self.model.predict(&vector)?.max(0.0);

        let player = snapshot.player(player_id);
        let is_home = record.get(Feature::IsHome) == Some(1.0);
        let (team_id, opponent_id) = if is_home {
            (fixture.home_team, fixture.away_team)
        } else {
            (fixture.away_team, fixture.home_team)
        };
        let short_name = |id: TeamId| {
            snapshot
                .team(id)
                .map(|t| t.short_name.clone())
                .unwrap_or_else(|| id.to_string())
        };

        Ok(Some(PlayerPrediction {
            player_id,
            player_name: player.map(|p| p.full_name()).unwrap_or_default(),
            team: short_name(team_id),
            opponent: short_name(opponent_id),
            position: player
                .and_then(|p| p.position)
                .map(|p| p.code().to_string())
                .unwrap_or_else(|| "-".to_string()),
            is_home,
            fixture_id: fixture.id,
            predicted_points,
            avg_points_last_5: record.values.avg_points_last_5,
        }))
    }
}

/// Format predictions as a table
pub fn format_table(result: &GameweekPredictions) -> String {
    let mut out = String::new();
    out.push_str(&format!("\nGameweek {} predictions\n", result.gameweek));
    out.push_str("┌──────┬──────────────────────────┬──────┬──────────┬─────┬────────┬────────┐\n");
    out.push_str("│ Rank │ Player                   │ Pos  │ Fixture  │ H/A │ Avg L5 │ Pred   │\n");
    out.push_str("├──────┼──────────────────────────┼──────┼──────────┼─────┼────────┼────────┤\n");
    for (i, p) in result.predictions.iter().enumerate() {
        out.push_str(&format!(
            "│ {:>4} │ {:<24} │ {:<4} │ {:<8} │ {:<3} │ {:>6.2} │ {:>6.2} │\n",
            i + 1,
            truncate(&p.player_name, 24),
            p.position,
            format!("{}-{}", p.team, p.opponent),
            if p.is_home { "H" } else { "A" },
            p.avg_points_last_5,
            p.predicted_points
        ));
    }
    out.push_str("└──────┴──────────────────────────┴──────┴──────────┴─────┴────────┴────────┘\n");

    if !result.unavailable.is_empty() {
        out.push_str(&format!("\nUnavailable ({}):\n", result.unavailable.len()));
        for u in &result.unavailable {
            let back = u
                .expected_return
                .map(|g| format!(", back GW{}", g))
                .unwrap_or_default();
            out.push_str(&format!(
                "  {} ({}{})\n",
                u.player_name,
                u.status.as_deref().unwrap_or("flagged"),
                back
            ));
        }
    }
    out
}

/// Format predictions as CSV
pub fn format_csv(result: &GameweekPredictions) -> String {
    let mut out = String::from(
        "rank,player_id,player_name,position,team,opponent,is_home,avg_points_last_5,predicted_points\n",
    );
    for (i, p) in result.predictions.iter().enumerate() {
        out.push_str(&format!(
            "{},{},\"{}\",{},{},{},{},{:.2},{:.2}\n",
            i + 1,
            p.player_id.0,
            p.player_name.replace('"', "\"\""),
            p.position,
            p.team,
            p.opponent,
            p.is_home,
            p.avg_points_last_5,
            p.predicted_points
        ));
    }
    out
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(width - 1).collect();
        cut.push('…');
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::TeamContext;
    use crate::{FplError, InjuryStatus, MatchRecord, Player, Position, Team};

    /// Predicts `scale * avg_points_last_5 + offset`
    struct FormModel {
        names: Vec<String>,
        scale: f64,
        offset: f64,
        window: usize,
    }

    impl FormModel {
        fn new(scale: f64, offset: f64) -> Self {
            FormModel {
                names: vec!["avg_points_last_5".to_string(), "is_home".to_string()],
                scale,
                offset,
                window: 5,
            }
        }
    }

    impl PointsModel for FormModel {
        fn feature_names(&self) -> &[String] {
            &self.names
        }

        fn window(&self) -> usize {
            self.window
        }

        fn predict(&self, features: &[f64]) -> Result<f64> {
            Ok(self.scale * features[0] + self.offset)
        }
    }

    /// Fails for any player whose recent average matches `reject`
    struct PickyModel {
        inner: FormModel,
        reject: f64,
    }

    impl PointsModel for PickyModel {
        fn feature_names(&self) -> &[String] {
            self.inner.feature_names()
        }

        fn window(&self) -> usize {
            self.inner.window()
        }

        fn predict(&self, features: &[f64]) -> Result<f64> {
            if features[0] == self.reject {
                return Err(FplError::Parse("cannot score".to_string()));
            }
            self.inner.predict(features)
        }
    }

    fn team(id: i64, short: &str) -> Team {
        Team {
            id: TeamId(id),
            name: short.to_string(),
            short_name: short.to_string(),
            strength: None,
        }
    }

    fn player(id: i64, team: i64) -> Player {
        Player {
            id: PlayerId(id),
            first_name: "Player".to_string(),
            second_name: id.to_string(),
            team_id: TeamId(team),
            position: Some(Position::Defender),
        }
    }

    fn record(player: i64, fixture: i64, points: i32) -> MatchRecord {
        MatchRecord {
            player_id: PlayerId(player),
            fixture_id: FixtureId(fixture),
            minutes: 90,
            goals: 0,
            assists: 0,
            total_points: points,
            xg: None,
            xa: None,
            shots: None,
        }
    }

    fn snapshot() -> Snapshot {
        let fixtures = vec![
            Fixture {
                id: FixtureId(1),
                event: Some(1),
                home_team: TeamId(1),
                away_team: TeamId(2),
                kickoff_time: None,
            },
            Fixture {
                id: FixtureId(2),
                event: Some(2),
                home_team: TeamId(2),
                away_team: TeamId(1),
                kickoff_time: None,
            },
        ];
        Snapshot::from_parts(
            vec![player(1, 1), player(2, 1), player(3, 2), player(4, 2)],
            vec![team(1, "ARS"), team(2, "CHE")],
            fixtures,
            vec![
                record(1, 1, 2),
                record(2, 1, 8),
                record(3, 1, 5),
                record(4, 1, 1),
                // gameweek 2 has already been played; it must not leak into GW2 features
                record(1, 2, 20),
            ],
            vec![InjuryStatus {
                player_id: PlayerId(4),
                is_injured: true,
                status: Some("Injured".to_string()),
                expected_return: Some(5),
            }],
            TeamContext::new(),
        )
    }

    #[test]
    fn test_predictions_sorted_and_injured_listed() {
        let snapshot = snapshot();
        let predictor = Predictor::new(FormModel::new(1.0, 0.0)).unwrap();
        let result = predictor.predict_gameweek(&snapshot, 2, 10, false).unwrap();

        let ids: Vec<PlayerId> = result.predictions.iter().map(|p| p.player_id).collect();
        assert_eq!(ids, vec![PlayerId(2), PlayerId(3), PlayerId(1)]);
        assert_eq!(result.predictions[0].predicted_points, 8.0);
        // player 1 scored 20 in GW2 itself, which is not visible
        assert_eq!(result.predictions[2].predicted_points, 2.0);
        assert_eq!(result.predictions[0].team, "ARS");
        assert_eq!(result.predictions[0].opponent, "CHE");
        assert!(!result.predictions[0].is_home);
        assert!(result.predictions[1].is_home);

        assert_eq!(result.unavailable.len(), 1);
        assert_eq!(result.unavailable[0].player_id, PlayerId(4));
        assert_eq!(result.unavailable[0].expected_return, Some(5));
    }

    #[test]
    fn test_include_unavailable_and_top_n() {
        let snapshot = snapshot();
        let predictor = Predictor::new(FormModel::new(1.0, 0.0)).unwrap();

        let all = predictor.predict_gameweek(&snapshot, 2, 10, true).unwrap();
        assert_eq!(all.predictions.len(), 4);
        assert!(all.unavailable.is_empty());

        let top = predictor.predict_gameweek(&snapshot, 2, 2, true).unwrap();
        assert_eq!(top.predictions.len(), 2);
        assert_eq!(top.predictions[0].player_id, PlayerId(2));
    }

    #[test]
    fn test_predictions_are_never_negative() {
        let snapshot = snapshot();
        let predictor = Predictor::new(FormModel::new(1.0, -100.0)).unwrap();
        let result = predictor.predict_gameweek(&snapshot, 2, 10, true).unwrap();
        assert!(!result.predictions.is_empty());
        assert!(result.predictions.iter().all(|p| p.predicted_points == 0.0));
    }

    #[test]
    fn test_gameweek_without_fixtures_is_empty() {
        let snapshot = snapshot();
        let predictor = Predictor::new(FormModel::new(1.0, 0.0)).unwrap();
        let result = predictor.predict_gameweek(&snapshot, 30, 10, false).unwrap();
        assert!(result.predictions.is_empty());
        assert!(result.unavailable.is_empty());
    }

    #[test]
    fn test_unknown_feature_in_model_is_fatal() {
        let model = FormModel {
            names: vec!["form".to_string(), "vibes".to_string()],
            ..FormModel::new(1.0, 0.0)
        };
        assert!(matches!(
            Predictor::new(model),
            Err(FplError::UnknownFeature(name)) if name == "vibes"
        ));
    }

    #[test]
    fn test_failing_player_is_skipped_not_fatal() {
        let snapshot = snapshot();
        let model = PickyModel {
            inner: FormModel::new(1.0, 0.0),
            reject: 8.0,
        };
        let result = Predictor::new(model)
            .unwrap()
            .predict_gameweek(&snapshot, 2, 10, false)
            .unwrap();

        let ids: Vec<PlayerId> = result.predictions.iter().map(|p| p.player_id).collect();
        assert_eq!(ids, vec![PlayerId(3), PlayerId(1)]);
        assert_eq!(result.unavailable.len(), 1);
    }

    #[test]
    fn test_predictor_uses_the_trained_window() {
        let dir = tempfile::tempdir().unwrap();
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![(i % 4) as f64]).collect();
        let y: Vec<f64> = x.iter().map(|r| 1.0 + r[0]).collect();
        LinearModel::fit(vec!["rotation_risk".to_string()], 3, &x, &y, 1.0)
            .unwrap()
            .save(dir.path())
            .unwrap();

        let predictor = Predictor::load(dir.path()).unwrap();
        assert_eq!(predictor.window(), 3);

        let custom = FormModel {
            window: 2,
            ..FormModel::new(1.0, 0.0)
        };
        assert_eq!(Predictor::new(custom).unwrap().window(), 2);
    }

    #[test]
    fn test_window_changes_rotation_features() {
        // [0, 90, 90, 90, 90]: the early blank only counts in a five-match window
        let fixtures: Vec<Fixture> = (1..=6)
            .map(|gw| Fixture {
                id: FixtureId(gw),
                event: Some(gw as u32),
                home_team: TeamId(1),
                away_team: TeamId(2),
                kickoff_time: None,
            })
            .collect();
        let records: Vec<MatchRecord> = (1..=5)
            .map(|gw| MatchRecord {
                minutes: if gw == 1 { 0 } else { 90 },
                ..record(1, gw, 2)
            })
            .collect();
        let snapshot = Snapshot::from_parts(
            vec![player(1, 1)],
            vec![team(1, "ARS"), team(2, "CHE")],
            fixtures,
            records,
            vec![],
            TeamContext::new(),
        );

        let rotation = |window: usize| {
            FeatureAssembler::new(&snapshot, window)
                .assemble_before(PlayerId(1), FixtureId(6))
                .unwrap()
                .values
                .rotation_risk
        };
        assert!((rotation(5) - 0.14).abs() < 1e-9);
        assert_eq!(rotation(3), 0.0);
    }

    #[test]
    fn test_next_gameweek() {
        assert_eq!(next_gameweek(&snapshot()), 3);
        assert_eq!(next_gameweek(&Snapshot::default()), 1);
    }

    #[test]
    fn test_formatters() {
        let snapshot = snapshot();
        let predictor = Predictor::new(FormModel::new(1.0, 0.0)).unwrap();
        let result = predictor.predict_gameweek(&snapshot, 2, 10, false).unwrap();

        let table = format_table(&result);
        assert!(table.contains("Gameweek 2"));
        assert!(table.contains("Player 2"));
        assert!(table.contains("Unavailable (1)"));

        let csv = format_csv(&result);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("1,2,\"Player 2\",DEF,ARS,CHE,false"));
    }
}
