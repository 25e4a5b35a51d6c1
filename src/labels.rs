use std::fmt;

use serde::{Deserialize, Serialize};

pub const NUM_CLASSES: usize = 3;

/// Match outcome from the home side's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    HomeWin,
    Draw,
    AwayWin,
}

impl Outcome {
    pub const ALL: [Outcome; NUM_CLASSES] = [Outcome::HomeWin, Outcome::Draw, Outcome::AwayWin];

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::HomeWin => "home_win",
            Outcome::Draw => "draw",
            Outcome::AwayWin => "away_win",
        }
    }

    /// Class index used by the classifier.
    pub fn index(self) -> usize {
        match self {
            Outcome::HomeWin => 0,
            Outcome::Draw => 1,
            Outcome::AwayWin => 2,
        }
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a match from one team's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamResult {
    Win,
    Loss,
    Draw,
}

impl TeamResult {
    pub fn as_str(self) -> &'static str {
        match self {
            TeamResult::Win => "win",
            TeamResult::Loss => "loss",
            TeamResult::Draw => "draw",
        }
    }

    pub fn win_flag(self) -> u8 {
        if self == TeamResult::Win { 1 } else { 0 }
    }
}

pub fn compute_match_result(home_goals: u32, away_goals: u32) -> Outcome {
    if home_goals > away_goals {
        Outcome::HomeWin
    } else if home_goals < away_goals {
        Outcome::AwayWin
    } else {
        Outcome::Draw
    }
}

pub fn team_result(goals_for: u32, goals_against: u32) -> TeamResult {
    match compute_match_result(goals_for, goals_against) {
        Outcome::HomeWin => TeamResult::Win,
        Outcome::AwayWin => TeamResult::Loss,
        Outcome::Draw => TeamResult::Draw,
    }
}
