//! Feature assembly for one (player, fixture) pair
//!
//! The same assembler feeds the training dataset and the inference driver, so
//! a feature is computed one way only. A `FeatureSet` selects and orders the
//! features handed to the model; it never changes how they are computed.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::snapshot::{HistoryPrefix, Snapshot};
use crate::features::rolling;
use crate::{FixtureId, FplError, MatchRecord, PlayerId, Result};

/// Every feature the assembler knows how to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    AvgPointsLast5,
    AvgPointsLast10,
    Form,
    OpponentDifficulty,
    IsHome,
    MinutesConsistency,
    MinutesStd,
    GoalThreat,
    InjuryRisk,
    AvgMinutesLast5,
    MinutesTrend,
    MinutesVariance,
    GamesWithMinutes,
    MinutesMomentum,
    RotationRisk,
    StarterProbability,
    PlayingTimeReliability,
    MinutesPer90,
    AvgXgLast5,
    AvgXaLast5,
    AvgShotsLast5,
    XgOutperformance,
    TeamXg,
    OpponentXga,
}

impl Feature {
    pub const ALL: [Feature; 24] = [
        Feature::AvgPointsLast5,
        Feature::AvgPointsLast10,
        Feature::Form,
        Feature::OpponentDifficulty,
        Feature::IsHome,
        Feature::MinutesConsistency,
        Feature::MinutesStd,
        Feature::GoalThreat,
        Feature::InjuryRisk,
        Feature::AvgMinutesLast5,
        Feature::MinutesTrend,
        Feature::MinutesVariance,
        Feature::GamesWithMinutes,
        Feature::MinutesMomentum,
        Feature::RotationRisk,
        Feature::StarterProbability,
        Feature::PlayingTimeReliability,
        Feature::MinutesPer90,
        Feature::AvgXgLast5,
        Feature::AvgXaLast5,
        Feature::AvgShotsLast5,
        Feature::XgOutperformance,
        Feature::TeamXg,
        Feature::OpponentXga,
    ];

    /// Stable column name, shared by the feature store and `features.txt`
    pub fn name(&self) -> &'static str {
        match self {
            Feature::AvgPointsLast5 => "avg_points_last_5",
            Feature::AvgPointsLast10 => "avg_points_last_10",
            Feature::Form => "form",
            Feature::OpponentDifficulty => "opponent_difficulty",
            Feature::IsHome => "is_home",
            Feature::MinutesConsistency => "minutes_consistency",
            Feature::MinutesStd => "minutes_std",
            Feature::GoalThreat => "goal_threat",
            Feature::InjuryRisk => "injury_risk",
            Feature::AvgMinutesLast5 => "avg_minutes_last_5",
            Feature::MinutesTrend => "minutes_trend",
            Feature::MinutesVariance => "minutes_variance",
            Feature::GamesWithMinutes => "games_with_minutes",
            Feature::MinutesMomentum => "minutes_momentum",
            Feature::RotationRisk => "rotation_risk",
            Feature::StarterProbability => "starter_probability",
            Feature::PlayingTimeReliability => "playing_time_reliability",
            Feature::MinutesPer90 => "minutes_per_90",
            Feature::AvgXgLast5 => "avg_xg_last_5",
            Feature::AvgXaLast5 => "avg_xa_last_5",
            Feature::AvgShotsLast5 => "avg_shots_last_5",
            Feature::XgOutperformance => "xg_outperformance",
            Feature::TeamXg => "team_xg",
            Feature::OpponentXga => "opponent_xga",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Feature::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// Whether the value can be absent (xG-derived features)
    pub fn is_optional(&self) -> bool {
        matches!(
            self,
            Feature::AvgXgLast5
                | Feature::AvgXaLast5
                | Feature::AvgShotsLast5
                | Feature::XgOutperformance
                | Feature::TeamXg
                | Feature::OpponentXga
        )
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered selection of features fed to a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSet {
    features: Vec<Feature>,
}

impl FeatureSet {
    pub fn new(features: Vec<Feature>) -> Self {
        FeatureSet { features }
    }

    /// Points, form, fixture and availability signals
    pub fn basic() -> Self {
        FeatureSet::new(vec![
            Feature::AvgPointsLast5,
            Feature::AvgPointsLast10,
            Feature::Form,
            Feature::OpponentDifficulty,
            Feature::IsHome,
            Feature::MinutesConsistency,
            Feature::GoalThreat,
            Feature::InjuryRisk,
        ])
    }

    /// Basic set plus playing-time analysis and expected-goals context
    pub fn enhanced() -> Self {
        let mut features = FeatureSet::basic().features;
        features.extend([
            Feature::AvgMinutesLast5,
            Feature::MinutesTrend,
            Feature::MinutesVariance,
            Feature::GamesWithMinutes,
            Feature::MinutesMomentum,
            Feature::RotationRisk,
            Feature::StarterProbability,
            Feature::PlayingTimeReliability,
            Feature::MinutesPer90,
            Feature::AvgXgLast5,
            Feature::AvgXaLast5,
            Feature::AvgShotsLast5,
            Feature::XgOutperformance,
            Feature::TeamXg,
            Feature::OpponentXga,
        ]);
        FeatureSet::new(features)
    }

    pub fn preset(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "basic" => Ok(FeatureSet::basic()),
            "enhanced" => Ok(FeatureSet::enhanced()),
            other => Err(FplError::Config(format!(
                "Unknown feature set '{}'. Use 'basic' or 'enhanced'",
                other
            ))),
        }
    }

    /// Parse an ordered name list, e.g. the lines of `features.txt`
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let features = names
            .iter()
            .map(|name| {
                let name = name.as_ref().trim();
                Feature::from_name(name).ok_or_else(|| FplError::UnknownFeature(name.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        if features.is_empty() {
            return Err(FplError::Config("Feature list is empty".to_string()));
        }
        Ok(FeatureSet::new(features))
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.features.iter().map(|f| f.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Ordered model input; `None` when any selected feature is absent
    pub fn vector(&self, values: &FeatureValues) -> Option<Vec<f64>> {
        self.features.iter().map(|&f| values.get(f)).collect()
    }
}

/// Computed features for one (player, fixture) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureValues {
    pub avg_points_last_5: f64,
    pub avg_points_last_10: f64,
    /// Mean points over the last 3 matches
    pub form: f64,
    pub opponent_difficulty: f64,
    /// 1.0 at home, 0.0 away
    pub is_home: f64,
    pub minutes_consistency: f64,
    pub minutes_std: f64,
    pub goal_threat: f64,
    pub injury_risk: f64,
    pub avg_minutes_last_5: f64,
    pub minutes_trend: f64,
    pub minutes_variance: f64,
    pub games_with_minutes: f64,
    pub minutes_momentum: f64,
    pub rotation_risk: f64,
    pub starter_probability: f64,
    pub playing_time_reliability: f64,
    pub minutes_per_90: f64,
    pub avg_xg_last_5: Option<f64>,
    pub avg_xa_last_5: Option<f64>,
    pub avg_shots_last_5: Option<f64>,
    pub xg_outperformance: Option<f64>,
    pub team_xg: Option<f64>,
    pub opponent_xga: Option<f64>,
}

impl FeatureValues {
    pub fn get(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::AvgPointsLast5 => Some(self.avg_points_last_5),
            Feature::AvgPointsLast10 => Some(self.avg_points_last_10),
            Feature::Form => Some(self.form),
            Feature::OpponentDifficulty => Some(self.opponent_difficulty),
            Feature::IsHome => Some(self.is_home),
            Feature::MinutesConsistency => Some(self.minutes_consistency),
            Feature::MinutesStd => Some(self.minutes_std),
            Feature::GoalThreat => Some(self.goal_threat),
            Feature::InjuryRisk => Some(self.injury_risk),
            Feature::AvgMinutesLast5 => Some(self.avg_minutes_last_5),
            Feature::MinutesTrend => Some(self.minutes_trend),
            Feature::MinutesVariance => Some(self.minutes_variance),
            Feature::GamesWithMinutes => Some(self.games_with_minutes),
            Feature::MinutesMomentum => Some(self.minutes_momentum),
            Feature::RotationRisk => Some(self.rotation_risk),
            Feature::StarterProbability => Some(self.starter_probability),
            Feature::PlayingTimeReliability => Some(self.playing_time_reliability),
            Feature::MinutesPer90 => Some(self.minutes_per_90),
            Feature::AvgXgLast5 => self.avg_xg_last_5,
            Feature::AvgXaLast5 => self.avg_xa_last_5,
            Feature::AvgShotsLast5 => self.avg_shots_last_5,
            Feature::XgOutperformance => self.xg_outperformance,
            Feature::TeamXg => self.team_xg,
            Feature::OpponentXga => self.opponent_xga,
        }
    }
}

/// One row of the feature table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub player_id: PlayerId,
    pub fixture_id: FixtureId,
    /// Gameweek of the target fixture
    pub event: u32,
    pub values: FeatureValues,
    /// Realised points, present for training rows
    pub label: Option<f64>,
}

impl FeatureRecord {
    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.values.get(feature)
    }
}

/// Past-only input buffers for the rolling calculators
#[derive(Debug, Clone, Default)]
pub struct RollingHistory {
    points: Vec<f64>,
    minutes: Vec<f64>,
    goals: Vec<f64>,
    assists: Vec<f64>,
    xg: Vec<Option<f64>>,
    xa: Vec<Option<f64>>,
    shots: Vec<Option<f64>>,
}

impl RollingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers holding exactly the matches of a history prefix
    pub fn from_prefix(prefix: HistoryPrefix<'_>) -> Self {
        let mut history = RollingHistory::new();
        for record in prefix.records() {
            history.push(record);
        }
        history
    }

    /// Append a match once its row has been emitted
    pub fn push(&mut self, record: &MatchRecord) {
        self.points.push(record.total_points as f64);
        self.minutes.push(record.minutes as f64);
        self.goals.push(record.goals as f64);
        self.assists.push(record.assists as f64);
        self.xg.push(record.xg);
        self.xa.push(record.xa);
        self.shots.push(record.shots.map(|s| s as f64));
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn minutes(&self) -> &[f64] {
        &self.minutes
    }

    fn contributions(&self) -> Vec<f64> {
        self.goals
            .iter()
            .zip(&self.assists)
            .map(|(g, a)| g + a)
            .collect()
    }
}

/// Builds feature records against a pre-fetched snapshot
pub struct FeatureAssembler<'a> {
    snapshot: &'a Snapshot,
    window: usize,
}

impl<'a> FeatureAssembler<'a> {
    pub fn new(snapshot: &'a Snapshot, window: usize) -> Self {
        FeatureAssembler {
            snapshot,
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Features for `player` ahead of `fixture`, computed from `history` only.
    ///
    /// `history` must hold matches strictly before the fixture; the caller
    /// owns that cut.
    pub fn assemble(
        &self,
        player_id: PlayerId,
        fixture_id: FixtureId,
        history: &RollingHistory,
    ) -> Result<FeatureRecord> {
        let player = self
            .snapshot
            .player(player_id)
            .ok_or(FplError::PlayerNotFound(player_id))?;
        let fixture = self
            .snapshot
            .fixture(fixture_id)
            .ok_or(FplError::FixtureNotFound(fixture_id))?;
        let event = fixture
            .event
            .ok_or(FplError::FixtureUnscheduled(fixture_id))?;

        let is_home = player.team_id == fixture.home_team;
        // A team on neither side (transfer since the fixture) is scored as away
        let opponent = fixture
            .opponent(player.team_id)
            .unwrap_or(fixture.home_team);

        let context = self.snapshot.context();
        let window = self.window;
        let points = history.points();
        let minutes = history.minutes();
        let goals = &history.goals;

        let values = FeatureValues {
            avg_points_last_5: rolling::form(points, 5),
            avg_points_last_10: rolling::form(points, 10),
            form: rolling::form(points, 3),
            opponent_difficulty: context.strength(opponent),
            is_home: if is_home { 1.0 } else { 0.0 },
            minutes_consistency: rolling::minutes_consistency(minutes, window),
            minutes_std: rolling::minutes_std(minutes, window),
            goal_threat: rolling::goal_threat(&history.contributions(), window),
            injury_risk: rolling::injury_risk(minutes, window),
            avg_minutes_last_5: rolling::mean_minutes(minutes, 5),
            minutes_trend: rolling::minutes_trend(minutes, window),
            minutes_variance: rolling::minutes_variance(minutes, window),
            games_with_minutes: rolling::games_with_minutes(minutes, window),
            minutes_momentum: rolling::minutes_momentum(minutes, 3),
            rotation_risk: rolling::rotation_risk(minutes, window),
            starter_probability: rolling::starter_probability(minutes, window),
            playing_time_reliability: rolling::playing_time_reliability(minutes, window),
            minutes_per_90: rolling::minutes_per_90(minutes),
            avg_xg_last_5: rolling::optional_mean(&history.xg, 5),
            avg_xa_last_5: rolling::optional_mean(&history.xa, 5),
            avg_shots_last_5: rolling::optional_mean(&history.shots, 5),
            xg_outperformance: rolling::xg_outperformance(&history.xg, goals, window),
            team_xg: context.team_xg(player.team_id),
            opponent_xga: context.team_xga(opponent),
        };

        Ok(FeatureRecord {
            player_id,
            fixture_id,
            event,
            values,
            label: None,
        })
    }

    /// Features for `player` ahead of `fixture`, using every recorded match
    /// from earlier gameweeks
    pub fn assemble_before(&self, player_id: PlayerId, fixture_id: FixtureId) -> Result<FeatureRecord> {
        let fixture = self
            .snapshot
            .fixture(fixture_id)
            .ok_or(FplError::FixtureNotFound(fixture_id))?;
        let event = fixture
            .event
            .ok_or(FplError::FixtureUnscheduled(fixture_id))?;

        let prefix = self.snapshot.history(player_id).before(event);
        let history = RollingHistory::from_prefix(prefix);
        self.assemble(player_id, fixture_id, &history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::context::{TeamContext, TeamXgContext};
    use crate::{Fixture, Player, Position, TeamId};

    fn player(id: i64, team: i64) -> Player {
        Player {
            id: PlayerId(id),
            first_name: "Test".to_string(),
            second_name: format!("Player{}", id),
            team_id: TeamId(team),
            position: Some(Position::Midfielder),
        }
    }

    fn fixture(id: i64, event: Option<u32>, home: i64, away: i64) -> Fixture {
        Fixture {
            id: FixtureId(id),
            event,
            home_team: TeamId(home),
            away_team: TeamId(away),
            kickoff_time: None,
        }
    }

    fn record(player: i64, fixture: i64, minutes: u32, points: i32) -> MatchRecord {
        MatchRecord {
            player_id: PlayerId(player),
            fixture_id: FixtureId(fixture),
            minutes,
            goals: 0,
            assists: 0,
            total_points: points,
            xg: None,
            xa: None,
            shots: None,
        }
    }

    fn snapshot() -> Snapshot {
        let context = TeamContext::new()
            .with_strength(TeamId(2), 4.0)
            .with_xg(
                TeamId(1),
                "Home FC",
                TeamXgContext {
                    xg_for: 15.0,
                    xg_against: 10.0,
                    matches_played: 10,
                },
            );
        Snapshot::from_parts(
            vec![player(1, 1)],
            vec![],
            vec![
                fixture(10, Some(1), 1, 2),
                fixture(11, Some(2), 3, 1),
                fixture(12, None, 1, 3),
                fixture(13, Some(3), 2, 3),
            ],
            vec![record(1, 10, 90, 6)],
            vec![],
            context,
        )
    }

    #[test]
    fn test_feature_names_round_trip() {
        for feature in Feature::ALL {
            assert_eq!(Feature::from_name(feature.name()), Some(feature));
        }
        assert_eq!(Feature::from_name("not_a_feature"), None);
    }

    #[test]
    fn test_presets() {
        assert_eq!(FeatureSet::basic().len(), 8);
        assert_eq!(FeatureSet::enhanced().len(), 23);
        assert_eq!(FeatureSet::enhanced().names()[..8], FeatureSet::basic().names()[..]);
        assert!(FeatureSet::preset("Enhanced").is_ok());
        assert!(matches!(FeatureSet::preset("deep"), Err(FplError::Config(_))));
    }

    #[test]
    fn test_unknown_feature_name_rejected() {
        let result = FeatureSet::from_names(&["form", "shoe_size"]);
        assert!(matches!(result, Err(FplError::UnknownFeature(name)) if name == "shoe_size"));
    }

    #[test]
    fn test_empty_history_yields_defaults() {
        let snapshot = snapshot();
        let assembler = FeatureAssembler::new(&snapshot, 5);
        let record = assembler
            .assemble(PlayerId(1), FixtureId(10), &RollingHistory::new())
            .unwrap();

        assert_eq!(record.event, 1);
        assert_eq!(record.values.form, 0.0);
        assert_eq!(record.values.rotation_risk, 0.5);
        assert_eq!(record.values.starter_probability, 0.5);
        assert_eq!(record.values.minutes_trend, 0.0);
        assert_eq!(record.values.avg_xg_last_5, None);
        assert!(record.label.is_none());
    }

    #[test]
    fn test_home_away_and_opponent_context() {
        let snapshot = snapshot();
        let assembler = FeatureAssembler::new(&snapshot, 5);

        let home = assembler.assemble_before(PlayerId(1), FixtureId(10)).unwrap();
        assert_eq!(home.values.is_home, 1.0);
        assert_eq!(home.values.opponent_difficulty, 4.0);
        assert_eq!(home.values.team_xg, Some(1.5));

        let away = assembler.assemble_before(PlayerId(1), FixtureId(11)).unwrap();
        assert_eq!(away.values.is_home, 0.0);
        // team 3 has no rating
        assert_eq!(away.values.opponent_difficulty, 3.0);
        assert_eq!(away.values.opponent_xga, None);

        // team 1 plays in neither slot: scored as away against the home side
        let elsewhere = assembler.assemble_before(PlayerId(1), FixtureId(13)).unwrap();
        assert_eq!(elsewhere.values.is_home, 0.0);
        assert_eq!(elsewhere.values.opponent_difficulty, 4.0);
    }

    #[test]
    fn test_assemble_before_uses_earlier_gameweeks_only() {
        let snapshot = snapshot();
        let assembler = FeatureAssembler::new(&snapshot, 5);

        // gameweek 1 itself must not see its own match
        let gw1 = assembler.assemble_before(PlayerId(1), FixtureId(10)).unwrap();
        assert_eq!(gw1.values.avg_points_last_5, 0.0);

        let gw2 = assembler.assemble_before(PlayerId(1), FixtureId(11)).unwrap();
        assert_eq!(gw2.values.avg_points_last_5, 6.0);
        assert_eq!(gw2.values.starter_probability, 1.0);
    }

    #[test]
    fn test_lookup_failures() {
        let snapshot = snapshot();
        let assembler = FeatureAssembler::new(&snapshot, 5);
        let history = RollingHistory::new();

        assert!(matches!(
            assembler.assemble(PlayerId(99), FixtureId(10), &history),
            Err(FplError::PlayerNotFound(PlayerId(99)))
        ));
        assert!(matches!(
            assembler.assemble(PlayerId(1), FixtureId(99), &history),
            Err(FplError::FixtureNotFound(FixtureId(99)))
        ));
        assert!(matches!(
            assembler.assemble_before(PlayerId(1), FixtureId(12)),
            Err(FplError::FixtureUnscheduled(FixtureId(12)))
        ));
    }

    #[test]
    fn test_vector_requires_every_selected_feature() {
        let snapshot = snapshot();
        let assembler = FeatureAssembler::new(&snapshot, 5);
        let record = assembler.assemble_before(PlayerId(1), FixtureId(11)).unwrap();

        let set = FeatureSet::from_names(&["is_home", "form"]).unwrap();
        assert_eq!(set.vector(&record.values), Some(vec![0.0, 6.0]));

        // no xG recorded, so the enhanced vector is incomplete
        assert_eq!(FeatureSet::enhanced().vector(&record.values), None);
        assert!(FeatureSet::basic().vector(&record.values).is_some());
    }
}
