//! Team context: strength ratings and expected-goals rates
//!
//! A snapshot-level view of every team, applied uniformly to all fixtures of
//! a training or inference run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Team, TeamId};

/// Season expected-goals totals for one team (Understat)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamXgContext {
    #[serde(rename = "xG_for")]
    pub xg_for: f64,
    #[serde(rename = "xG_against")]
    pub xg_against: f64,
    pub matches_played: u32,
}

impl TeamXgContext {
    /// Expected goals created per match
    pub fn xg_per_match(&self) -> Option<f64> {
        (self.matches_played > 0).then(|| self.xg_for / self.matches_played as f64)
    }

    /// Expected goals conceded per match
    pub fn xga_per_match(&self) -> Option<f64> {
        (self.matches_played > 0).then(|| self.xg_against / self.matches_played as f64)
    }
}

/// Per-team lookups used by the feature assembler
#[derive(Debug, Clone, Default)]
pub struct TeamContext {
    strengths: HashMap<TeamId, f64>,
    names: HashMap<TeamId, String>,
    /// Keyed by lowercased team name
    xg: HashMap<String, TeamXgContext>,
}

impl TeamContext {
    /// Neutral difficulty on the 1-5 scale
    pub const DEFAULT_STRENGTH: f64 = 3.0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Build from team rows and an xG table keyed by team name
    pub fn from_teams(teams: &[Team], xg: HashMap<String, TeamXgContext>) -> Self {
        let mut context = TeamContext::new();
        for team in teams {
            context.names.insert(team.id, team.name.clone());
            if let Some(strength) = team.strength {
                context.strengths.insert(team.id, strength);
            }
        }
        for (name, stats) in xg {
            context.xg.insert(name.to_lowercase(), stats);
        }
        context
    }

    pub fn with_strength(mut self, team: TeamId, strength: f64) -> Self {
        self.strengths.insert(team, strength);
        self
    }

    pub fn with_xg(mut self, team: TeamId, name: &str, stats: TeamXgContext) -> Self {
        self.names.insert(team, name.to_string());
        self.xg.insert(name.to_lowercase(), stats);
        self
    }

    /// Strength rating for a team, neutral when unknown
    pub fn strength(&self, team: TeamId) -> f64 {
        self.strengths
            .get(&team)
            .copied()
            .unwrap_or(Self::DEFAULT_STRENGTH)
    }

    /// Expected-goals totals by team name (case-insensitive)
    pub fn xg_context(&self, team_name: &str) -> Option<&TeamXgContext> {
        self.xg.get(&team_name.to_lowercase())
    }

    fn xg_for_team(&self, team: TeamId) -> Option<&TeamXgContext> {
        self.names
            .get(&team)
            .and_then(|name| self.xg_context(name))
    }

    /// How attacking a team is: xG per match
    pub fn team_xg(&self, team: TeamId) -> Option<f64> {
        self.xg_for_team(team).and_then(|s| s.xg_per_match())
    }

    /// How leaky a team is: xG conceded per match
    pub fn team_xga(&self, team: TeamId) -> Option<f64> {
        self.xg_for_team(team).and_then(|s| s.xga_per_match())
    }

    pub fn xg_team_count(&self) -> usize {
        self.xg.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(id: i64, name: &str, strength: Option<f64>) -> Team {
        Team {
            id: TeamId(id),
            name: name.to_string(),
            short_name: name[..3].to_uppercase(),
            strength,
        }
    }

    #[test]
    fn test_unknown_strength_is_neutral() {
        let context = TeamContext::from_teams(&[team(1, "Arsenal", Some(5.0))], HashMap::new());
        assert_eq!(context.strength(TeamId(1)), 5.0);
        assert_eq!(context.strength(TeamId(2)), 3.0);
    }

    #[test]
    fn test_xg_rates_by_team_name() {
        let mut xg = HashMap::new();
        xg.insert(
            "Arsenal".to_string(),
            TeamXgContext {
                xg_for: 20.0,
                xg_against: 10.0,
                matches_played: 10,
            },
        );
        xg.insert(
            "Burnley".to_string(),
            TeamXgContext {
                xg_for: 5.0,
                xg_against: 8.0,
                matches_played: 0,
            },
        );
        let context = TeamContext::from_teams(
            &[team(1, "Arsenal", None), team(2, "Burnley", None), team(3, "Chelsea", None)],
            xg,
        );

        assert_eq!(context.team_xg(TeamId(1)), Some(2.0));
        assert_eq!(context.team_xga(TeamId(1)), Some(1.0));
        // no matches played means no rate, not zero
        assert_eq!(context.team_xg(TeamId(2)), None);
        assert_eq!(context.team_xga(TeamId(3)), None);
        assert!(context.xg_context("ARSENAL").is_some());
        assert_eq!(context.xg_team_count(), 2);
    }

    #[test]
    fn test_xg_context_deserializes_understat_keys() {
        let stats: TeamXgContext =
            serde_json::from_str(r#"{"xG_for": 12.5, "xG_against": 9.0, "matches_played": 5}"#)
                .unwrap();
        assert_eq!(stats.xg_per_match(), Some(2.5));
    }
}
