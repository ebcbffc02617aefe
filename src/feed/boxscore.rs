//! Wire models for the NHL web API (`/score/now` and `/gamecenter/{id}/boxscore`).
//!
//! Only the fields the pick'em needs are modelled; everything else is ignored.

use super::{EventState, FeedError, FeedResult, GameRef, PlayerLine};
use crate::types::{GameId, SubjectContext};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ScoreNow {
    #[serde(default)]
    pub games: Vec<ScheduledGame>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledGame {
    pub id: GameId,
    #[serde(default)]
    pub game_state: Option<String>,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub game_type: Option<u32>,
    pub away_team: TeamRef,
    pub home_team: TeamRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamRef {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub abbrev: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxScore {
    pub id: GameId,
    pub game_state: String,
    /// "OK", or "PPD"/"CNCL" when the game will not be played
    #[serde(default)]
    pub game_schedule_state: Option<String>,
    pub away_team: TeamRef,
    pub home_team: TeamRef,
    #[serde(default)]
    pub player_by_game_stats: Option<PlayerByGameStats>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerByGameStats {
    pub away_team: TeamPlayerStats,
    pub home_team: TeamPlayerStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamPlayerStats {
    #[serde(default)]
    pub forwards: Vec<PlayerStatLine>,
    #[serde(default)]
    pub defense: Vec<PlayerStatLine>,
    #[serde(default)]
    pub goalies: Vec<PlayerStatLine>,
}

/// Shared shape of skater and goalie lines
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatLine {
    pub sweater_number: u32,
    #[serde(default)]
    pub name: Option<LocalizedName>,
    #[serde(default)]
    pub toi: Option<String>,
    #[serde(default)]
    pub shifts: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalizedName {
    pub default: String,
}

impl ScoreNow {
    /// Today's game involving `team_id`, if there is one
    pub fn find_team_game(&self, team_id: u32) -> Option<GameRef> {
        self.games
            .iter()
            .find(|g| g.away_team.id == Some(team_id) || g.home_team.id == Some(team_id))
            .map(|g| GameRef {
                id: g.id,
                game_state: g.game_state.clone().unwrap_or_default(),
                season: g.season,
                game_type: g.game_type,
            })
    }
}

impl BoxScore {
    fn team_stats(&self, team_id: u32) -> Option<&TeamPlayerStats> {
        let stats = self.player_by_game_stats.as_ref()?;
        if self.away_team.id == Some(team_id) {
            Some(&stats.away_team)
        } else if self.home_team.id == Some(team_id) {
            Some(&stats.home_team)
        } else {
            None
        }
    }

    /// Forwards first, then defense, then goalies
    pub fn find_player(&self, team_id: u32, sweater_number: u32) -> Option<&PlayerStatLine> {
        let team = self.team_stats(team_id)?;
        team.forwards
            .iter()
            .chain(team.defense.iter())
            .chain(team.goalies.iter())
            .find(|p| p.sweater_number == sweater_number)
    }

    fn is_called_off(&self) -> bool {
        matches!(self.game_schedule_state.as_deref(), Some("PPD") | Some("CNCL"))
    }

    pub fn event_state(&self, subject: &SubjectContext) -> FeedResult<EventState> {
        if self.is_called_off() {
            return Ok(EventState::SubjectAbsent);
        }

        match self.game_state.as_str() {
            "FUT" | "PRE" => Ok(EventState::Scheduled),
            "LIVE" | "CRIT" => Ok(EventState::Live),
            "OFF" | "FINAL" => {
                let toi = self
                    .find_player(subject.team_id, subject.sweater_number)
                    .and_then(|p| p.toi.clone())
                    .filter(|t| !t.trim().is_empty());
                Ok(match toi {
                    Some(actual_toi) => EventState::Final { actual_toi },
                    None => EventState::SubjectAbsent,
                })
            }
            other => Err(FeedError::Parse(format!("unknown game state '{}'", other))),
        }
    }

    pub fn player_line(&self, team_id: u32, sweater_number: u32) -> Option<PlayerLine> {
        let line = self.find_player(team_id, sweater_number)?;
        Some(PlayerLine {
            name: line
                .name
                .as_ref()
                .map(|n| n.default.clone())
                .unwrap_or_else(|| format!("#{}", sweater_number)),
            toi: line.toi.clone().unwrap_or_else(|| "0:00".to_string()),
            shifts: line.shifts,
            game_state: self.game_state.clone(),
        })
    }
}
