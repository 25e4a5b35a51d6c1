mod common;

use std::path::Path;

use rusqlite::Connection;

use common::{MatchRow, insert_attributes, insert_match, kaggle_db};
use predictiq::error::StoreError;
use predictiq::match_store::{self, MatchFilter};
use predictiq::tactical::TacticalAttribute;

fn row<'a>(match_id: i64, league_id: i64, season: &'a str, date: &'a str, home: i64, away: i64) -> MatchRow<'a> {
    MatchRow {
        match_id,
        league_id,
        season,
        date,
        home,
        away,
        home_goals: Some(1),
        away_goals: Some(0),
    }
}

#[test]
fn loads_matches_in_date_then_id_order() {
    let conn = kaggle_db();
    insert_match(&conn, &row(30, 1, "2008/2009", "2008-09-01 00:00:00", 1, 2));
    insert_match(&conn, &row(10, 1, "2008/2009", "2008-08-17 00:00:00", 3, 4));
    insert_match(&conn, &row(20, 1, "2008/2009", "2008-09-01 00:00:00", 5, 6));

    let matches = match_store::load_matches(&conn, &MatchFilter::default()).unwrap();
    let ids: Vec<u64> = matches.iter().map(|m| m.match_id).collect();
    assert_eq!(ids, vec![10, 20, 30]);
    assert_eq!(matches[0].league_id, 1);
    assert_eq!(matches[0].season, "2008/2009");
    assert_eq!((matches[0].home_goals, matches[0].away_goals), (1, 0));
}

#[test]
fn missing_required_column_is_named_in_the_error() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute(
        "CREATE TABLE \"Match\" (match_api_id INTEGER, date TEXT, home_team_api_id INTEGER,
            away_team_api_id INTEGER, home_team_goal INTEGER)",
        [],
    )
    .unwrap();

    let err = match_store::load_matches(&conn, &MatchFilter::default()).unwrap_err();
    match err {
        StoreError::MissingColumn { table, column } => {
            assert_eq!(table, "Match");
            assert_eq!(column, "away_team_goal");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_match_table_is_reported() {
    let conn = Connection::open_in_memory().unwrap();
    let err = match_store::load_matches(&conn, &MatchFilter::default()).unwrap_err();
    assert!(matches!(err, StoreError::MissingTable(ref t) if t == "Match"));
}

#[test]
fn null_goal_fails_instead_of_being_dropped() {
    let conn = kaggle_db();
    insert_match(&conn, &row(1, 1, "2008/2009", "2008-08-17 00:00:00", 1, 2));
    insert_match(
        &conn,
        &MatchRow {
            home_goals: None,
            ..row(2, 1, "2008/2009", "2008-08-18 00:00:00", 3, 4)
        },
    );

    let err = match_store::load_matches(&conn, &MatchFilter::default()).unwrap_err();
    match err {
        StoreError::MissingValue { match_id, column } => {
            assert_eq!(match_id, 2);
            assert_eq!(column, "home_team_goal");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unparseable_date_is_an_invalid_value() {
    let conn = kaggle_db();
    insert_match(&conn, &row(5, 1, "2008/2009", "not a date", 1, 2));
    let err = match_store::load_matches(&conn, &MatchFilter::default()).unwrap_err();
    assert!(matches!(err, StoreError::InvalidValue { match_id: 5, ref column, .. } if column == "date"));
}

#[test]
fn league_and_season_filters_restrict_rows() {
    let conn = kaggle_db();
    insert_match(&conn, &row(1, 1729, "2008/2009", "2008-08-17 00:00:00", 1, 2));
    insert_match(&conn, &row(2, 1729, "2009/2010", "2009-08-15 00:00:00", 1, 2));
    insert_match(&conn, &row(3, 4769, "2008/2009", "2008-08-09 00:00:00", 7, 8));
    insert_match(&conn, &row(4, 21518, "2008/2009", "2008-08-30 00:00:00", 9, 10));

    let by_league = MatchFilter {
        league_ids: vec![1729, 21518],
        seasons: Vec::new(),
    };
    let ids: Vec<u64> = match_store::load_matches(&conn, &by_league)
        .unwrap()
        .iter()
        .map(|m| m.match_id)
        .collect();
    assert_eq!(ids, vec![1, 4, 2]);

    let both = MatchFilter {
        league_ids: vec![1729],
        seasons: vec!["2008/2009".to_string()],
    };
    let ids: Vec<u64> = match_store::load_matches(&conn, &both)
        .unwrap()
        .iter()
        .map(|m| m.match_id)
        .collect();
    assert_eq!(ids, vec![1]);
}

#[test]
fn filter_on_absent_column_is_an_error() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute(
        "CREATE TABLE \"Match\" (match_api_id INTEGER, date TEXT, home_team_api_id INTEGER,
            away_team_api_id INTEGER, home_team_goal INTEGER, away_team_goal INTEGER)",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO \"Match\" VALUES (1, '2008-08-17 00:00:00', 1, 2, 1, 0)",
        [],
    )
    .unwrap();

    let by_league = MatchFilter {
        league_ids: vec![1729],
        seasons: Vec::new(),
    };
    match match_store::load_matches(&conn, &by_league).unwrap_err() {
        StoreError::MissingColumn { table, column } => {
            assert_eq!(table, "Match");
            assert_eq!(column, "league_id");
        }
        other => panic!("unexpected error: {other}"),
    }

    let by_season = MatchFilter {
        league_ids: Vec::new(),
        seasons: vec!["2008/2009".to_string()],
    };
    assert!(matches!(
        match_store::load_matches(&conn, &by_season),
        Err(StoreError::MissingColumn { ref column, .. }) if column == "season"
    ));

    // Without a filter the same table loads fine.
    let all = match_store::load_matches(&conn, &MatchFilter::default()).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].league_id, 0);
}

#[test]
fn attaching_counts_matches_without_any_snapshot() {
    let conn = kaggle_db();
    insert_match(&conn, &row(1, 1, "2009/2010", "2009-10-01 00:00:00", 1, 2));
    insert_match(&conn, &row(2, 1, "2009/2010", "2009-10-08 00:00:00", 3, 4));
    insert_attributes(&conn, 1, "2009-02-22 00:00:00", [Some(50); 7]);

    let mut matches = match_store::load_matches(&conn, &MatchFilter::default()).unwrap();
    let history = match_store::load_team_attributes(&conn).unwrap();
    assert!(!history.is_empty());
    assert_eq!(match_store::attach_team_attributes(&mut matches, &history), 1);
    assert!(!matches[0].home_tactics.is_empty());
    assert!(matches[1].home_tactics.is_empty() && matches[1].away_tactics.is_empty());
}

#[test]
fn attributes_are_joined_as_of_match_date() {
    let conn = kaggle_db();
    insert_match(&conn, &row(1, 1, "2009/2010", "2009-10-01 00:00:00", 1, 2));
    insert_match(&conn, &row(2, 1, "2010/2011", "2010-10-01 00:00:00", 2, 1));

    let full = |v: i64| [Some(v), Some(v), Some(v), Some(v), Some(v), Some(v), Some(v)];
    insert_attributes(&conn, 1, "2010-02-22 00:00:00", full(60));
    insert_attributes(&conn, 1, "2009-02-22 00:00:00", full(40));
    insert_attributes(&conn, 2, "2010-02-22 00:00:00", [Some(50), None, Some(50), Some(50), None, Some(50), Some(50)]);

    let matches = match_store::load_match_table(&conn, &MatchFilter::default()).unwrap();
    assert_eq!(matches.len(), 2);

    let first = &matches[0];
    assert_eq!(first.home_tactics.get(TacticalAttribute::BuildUpPlaySpeed), Some(40.0));
    // Team 2's only snapshot is after the first match.
    assert!(first.away_tactics.is_empty());

    let second = &matches[1];
    assert_eq!(second.away_tactics.get(TacticalAttribute::BuildUpPlaySpeed), Some(60.0));
    assert_eq!(second.home_tactics.get(TacticalAttribute::BuildUpPlaySpeed), Some(50.0));
    assert_eq!(second.home_tactics.get(TacticalAttribute::DefencePressure), None);
}

#[test]
fn missing_attribute_table_disables_tactics() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute(common::MATCH_SCHEMA, []).unwrap();
    insert_match(&conn, &row(1, 1, "2009/2010", "2009-10-01 00:00:00", 1, 2));

    let history = match_store::load_team_attributes(&conn).unwrap();
    assert!(history.is_empty());
    let matches = match_store::load_match_table(&conn, &MatchFilter::default()).unwrap();
    assert!(matches[0].home_tactics.is_empty());
}

#[test]
fn opening_a_missing_file_is_not_found() {
    let path = Path::new("/definitely/not/here/database.sqlite");
    assert!(matches!(
        match_store::open_db(path),
        Err(StoreError::NotFound(p)) if p == path
    ));
}
