//! Record shapes for the four scraped domains.
//!
//! Optional fields are `None` exactly when the source cell or anchor is absent or empty; the
//! extractors never produce `Some("")`. The CSV writer maps `None` to an empty field and the
//! reader maps an empty field back to `None`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One currently-active player from a letter-indexed player page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePlayerRecord {
    pub player_id: String,
    pub player_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Index letter of the page the player was found on (upper case).
    pub letter: String,
    pub url: String,
    pub position: Option<String>,
}

/// One row of a team's season roster table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRosterRecord {
    pub season: u16,
    pub team: String,
    pub uniform_number: Option<String>,
    pub player_id: String,
    pub player_name: String,
    pub player_url: String,
    pub position: Option<String>,
    pub age: Option<String>,
    pub height: Option<String>,
    pub weight: Option<String>,
    pub experience: Option<String>,
    pub games_played: Option<String>,
    pub games_started: Option<String>,
    pub approximate_value: Option<String>,
    pub college: Option<String>,
    pub birth_date: Option<String>,
    pub draft_info: Option<String>,
}

/// One player (or text entry) occupying a depth-chart slot.
///
/// Several records may share `(season, team, unit, position, depth_slot)` when a cell lists
/// co-starters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamDepthChartRecord {
    pub season: u16,
    pub team: String,
    pub unit: String,
    pub position: String,
    /// 1-based, left to right.
    pub depth_slot: u32,
    pub player_id: Option<String>,
    pub player_name: Option<String>,
    pub player_url: Option<String>,
    pub note: Option<String>,
}

/// Which game-log table a row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Regular,
    Playoffs,
}

impl GameType {
    pub fn as_str(self) -> &'static str {
        match self {
            GameType::Regular => "regular",
            GameType::Playoffs => "playoffs",
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One game from a team's season game log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamGameLogRecord {
    pub season: u16,
    pub team: String,
    pub game_type: GameType,
    pub game_number: Option<String>,
    pub week: Option<String>,
    pub date: Option<String>,
    pub day: Option<String>,
    pub home_away: Option<String>,
    pub opponent: Option<String>,
    pub result: Option<String>,
    pub team_points: Option<String>,
    pub opponent_points: Option<String>,
    pub overtime: Option<String>,
    pub boxscore_url: Option<String>,
}

/// Split a display name at the first whitespace into (first, last).
pub fn split_player_name(name: &str) -> (Option<String>, Option<String>) {
    let name = name.trim();
    if name.is_empty() {
        return (None, None);
    }
    match name.split_once(char::is_whitespace) {
        Some((first, rest)) => {
            let rest = rest.trim();
            let last = if rest.is_empty() {
                None
            } else {
                Some(rest.to_string())
            };
            (Some(first.to_string()), last)
        }
        None => (Some(name.to_string()), None),
    }
}
