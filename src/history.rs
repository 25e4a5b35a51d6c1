use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::FeatureError;
use crate::labels::{TeamResult, team_result};
use crate::match_store::StoredMatch;

/// One match seen from one team's side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMatchRecord {
    pub match_id: u64,
    pub date: NaiveDateTime,
    pub team_id: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub is_home: bool,
    pub result: TeamResult,
    pub win_flag: u8,
}

impl TeamMatchRecord {
    fn new(
        m: &StoredMatch,
        team_id: u32,
        goals_for: u32,
        goals_against: u32,
        is_home: bool,
    ) -> Self {
        let result = team_result(goals_for, goals_against);
        Self {
            match_id: m.match_id,
            date: m.date,
            team_id,
            goals_for,
            goals_against,
            is_home,
            result,
            win_flag: result.win_flag(),
        }
    }

    pub fn goal_diff(&self) -> i64 {
        i64::from(self.goals_for) - i64::from(self.goals_against)
    }
}

/// Chronological order within a team; `match_id` breaks same-timestamp ties.
pub fn chronological_key(r: &TeamMatchRecord) -> (u32, NaiveDateTime, u64) {
    (r.team_id, r.date, r.match_id)
}

/// Expands `n` matches into `2n` team-perspective records sorted by `(team_id, date, match_id)`.
pub fn expand_team_history(matches: &[StoredMatch]) -> Result<Vec<TeamMatchRecord>, FeatureError> {
    let mut seen = HashSet::with_capacity(matches.len());
    let mut out = Vec::with_capacity(matches.len() * 2);
    for m in matches {
        if !seen.insert(m.match_id) {
            return Err(FeatureError::DuplicateMatch(m.match_id));
        }
        if m.home_team_id == m.away_team_id {
            return Err(FeatureError::SameTeam {
                match_id: m.match_id,
                team_id: m.home_team_id,
            });
        }
        out.push(TeamMatchRecord::new(
            m,
            m.home_team_id,
            m.home_goals,
            m.away_goals,
            true,
        ));
        out.push(TeamMatchRecord::new(
            m,
            m.away_team_id,
            m.away_goals,
            m.home_goals,
            false,
        ));
    }
    out.sort_by_key(chronological_key);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::expand_team_history;
    use crate::error::FeatureError;
    use crate::labels::TeamResult;
    use crate::match_store::StoredMatch;

    fn day(d: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2015, 8, d)
            .and_then(|x| x.and_hms_opt(0, 0, 0))
            .expect("valid date")
    }

    #[test]
    fn home_and_away_perspectives_swap_goals() {
        let rows = vec![StoredMatch::new(10, day(1), 7, 9, 3, 1)];
        let history = expand_team_history(&rows).expect("expand");
        assert_eq!(history.len(), 2);

        let home = history.iter().find(|r| r.team_id == 7).expect("home row");
        let away = history.iter().find(|r| r.team_id == 9).expect("away row");
        assert!(home.is_home);
        assert!(!away.is_home);
        assert_eq!((home.goals_for, home.goals_against), (3, 1));
        assert_eq!((away.goals_for, away.goals_against), (1, 3));
        assert_eq!(home.result, TeamResult::Win);
        assert_eq!(away.result, TeamResult::Loss);
        assert_eq!((home.win_flag, away.win_flag), (1, 0));
    }

    #[test]
    fn same_timestamp_ties_break_on_match_id() {
        let rows = vec![
            StoredMatch::new(30, day(5), 1, 2, 0, 0),
            StoredMatch::new(20, day(5), 3, 1, 0, 0),
            StoredMatch::new(40, day(2), 1, 4, 0, 0),
        ];
        let history = expand_team_history(&rows).expect("expand");
        let team1: Vec<u64> = history
            .iter()
            .filter(|r| r.team_id == 1)
            .map(|r| r.match_id)
            .collect();
        assert_eq!(team1, vec![40, 20, 30]);
    }

    #[test]
    fn rejects_duplicate_match_ids() {
        let rows = vec![
            StoredMatch::new(1, day(1), 1, 2, 0, 0),
            StoredMatch::new(1, day(2), 3, 4, 0, 0),
        ];
        assert_eq!(
            expand_team_history(&rows),
            Err(FeatureError::DuplicateMatch(1))
        );
    }
}
