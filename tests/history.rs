use chrono::{NaiveDate, NaiveDateTime};

use predictiq::error::FeatureError;
use predictiq::history::expand_team_history;
use predictiq::labels::TeamResult;
use predictiq::match_store::StoredMatch;

fn on(month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2014, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid date")
}

#[test]
fn every_match_yields_one_record_per_side() {
    let matches = vec![
        StoredMatch::new(1, on(8, 16), 10, 20, 2, 2),
        StoredMatch::new(2, on(8, 23), 20, 30, 0, 1),
        StoredMatch::new(3, on(8, 30), 30, 10, 4, 1),
    ];
    let history = expand_team_history(&matches).unwrap();
    assert_eq!(history.len(), 6);

    for m in &matches {
        let sides: Vec<_> = history.iter().filter(|r| r.match_id == m.match_id).collect();
        assert_eq!(sides.len(), 2);
        let home = sides.iter().find(|r| r.is_home).unwrap();
        let away = sides.iter().find(|r| !r.is_home).unwrap();
        assert_eq!(home.team_id, m.home_team_id);
        assert_eq!(away.team_id, m.away_team_id);
        assert_eq!(home.goals_for, away.goals_against);
        assert_eq!(home.goals_against, away.goals_for);
        assert_eq!(home.goal_diff(), -away.goal_diff());
        assert_eq!(home.date, away.date);
    }
}

#[test]
fn draw_is_a_draw_for_both_sides() {
    let matches = vec![StoredMatch::new(7, on(9, 1), 1, 2, 1, 1)];
    let history = expand_team_history(&matches).unwrap();
    assert!(history.iter().all(|r| r.result == TeamResult::Draw));
    assert!(history.iter().all(|r| r.win_flag == 0));
}

#[test]
fn records_are_sorted_by_team_then_date() {
    let matches = vec![
        StoredMatch::new(9, on(10, 5), 2, 1, 0, 0),
        StoredMatch::new(8, on(9, 5), 1, 3, 0, 0),
        StoredMatch::new(11, on(8, 5), 3, 2, 0, 0),
    ];
    let history = expand_team_history(&matches).unwrap();
    let keys: Vec<(u32, u64)> = history.iter().map(|r| (r.team_id, r.match_id)).collect();
    assert_eq!(keys, vec![(1, 8), (1, 9), (2, 11), (2, 9), (3, 11), (3, 8)]);
}

#[test]
fn same_team_on_both_sides_is_rejected() {
    let matches = vec![StoredMatch::new(4, on(8, 1), 5, 5, 1, 0)];
    assert_eq!(
        expand_team_history(&matches).unwrap_err(),
        FeatureError::SameTeam {
            match_id: 4,
            team_id: 5
        }
    );
}

#[test]
fn empty_input_gives_empty_history() {
    assert!(expand_team_history(&[]).unwrap().is_empty());
}
