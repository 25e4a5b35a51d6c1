#![allow(dead_code)]

use rusqlite::{Connection, params};

pub const MATCH_SCHEMA: &str = "CREATE TABLE \"Match\" (
    id INTEGER PRIMARY KEY,
    country_id INTEGER,
    league_id INTEGER,
    season TEXT,
    stage INTEGER,
    date TEXT,
    match_api_id INTEGER UNIQUE,
    home_team_api_id INTEGER,
    away_team_api_id INTEGER,
    home_team_goal INTEGER,
    away_team_goal INTEGER
)";

pub const TEAM_ATTRIBUTES_SCHEMA: &str = "CREATE TABLE \"Team_Attributes\" (
    id INTEGER PRIMARY KEY,
    team_fifa_api_id INTEGER,
    team_api_id INTEGER,
    date TEXT,
    buildUpPlaySpeed INTEGER,
    buildUpPlayPassing INTEGER,
    chanceCreationPassing INTEGER,
    chanceCreationShooting INTEGER,
    defencePressure INTEGER,
    defenceAggression INTEGER,
    defenceTeamWidth INTEGER
)";

pub struct MatchRow<'a> {
    pub match_id: i64,
    pub league_id: i64,
    pub season: &'a str,
    pub date: &'a str,
    pub home: i64,
    pub away: i64,
    pub home_goals: Option<i64>,
    pub away_goals: Option<i64>,
}

pub fn kaggle_db() -> Connection {
    let conn = Connection::open_in_memory().expect("in-memory db");
    conn.execute(MATCH_SCHEMA, []).expect("create Match");
    conn.execute(TEAM_ATTRIBUTES_SCHEMA, []).expect("create Team_Attributes");
    conn
}

pub fn insert_match(conn: &Connection, m: &MatchRow<'_>) {
    conn.execute(
        "INSERT INTO \"Match\" (country_id, league_id, season, stage, date, match_api_id,
            home_team_api_id, away_team_api_id, home_team_goal, away_team_goal)
         VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            m.league_id,
            m.league_id,
            m.season,
            m.date,
            m.match_id,
            m.home,
            m.away,
            m.home_goals,
            m.away_goals
        ],
    )
    .expect("insert match");
}

/// `values` in column order: speed, passing, chance passing, chance shooting, pressure, aggression, width.
pub fn insert_attributes(conn: &Connection, team: i64, date: &str, values: [Option<i64>; 7]) {
    conn.execute(
        "INSERT INTO \"Team_Attributes\" (team_fifa_api_id, team_api_id, date, buildUpPlaySpeed,
            buildUpPlayPassing, chanceCreationPassing, chanceCreationShooting, defencePressure,
            defenceAggression, defenceTeamWidth)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            team, team, date, values[0], values[1], values[2], values[3], values[4], values[5],
            values[6]
        ],
    )
    .expect("insert attributes");
}

/// A small double round-robin league: `teams` sides over `rounds` weekly rounds.
/// Goals are derived from a fixed per-team rating so outcomes carry signal.
pub fn seed_league(conn: &Connection, league_id: i64, teams: i64, rounds: i64, first_id: i64) -> i64 {
    let mut id = first_id;
    for round in 0..rounds {
        let day = 1 + (round % 28);
        let month = 1 + (round / 28) % 12;
        let year = 2010 + round / (28 * 12);
        let date = format!("{year:04}-{month:02}-{day:02} 00:00:00");
        for pair in 0..teams / 2 {
            let a = (pair + round) % teams;
            let b = (teams - 1 - pair + round) % teams;
            let (home, away) = if round % 2 == 0 { (a, b) } else { (b, a) };
            let home_goals = (home * 3 + round) % 4 + home / 2;
            let away_goals = (away * 5 + round * 7) % 3 + away / 3;
            insert_match(
                conn,
                &MatchRow {
                    match_id: id,
                    league_id,
                    season: if round < rounds / 2 { "2010/2011" } else { "2011/2012" },
                    date: &date,
                    home: league_id * 1000 + home + 1,
                    away: league_id * 1000 + away + 1,
                    home_goals: Some(home_goals),
                    away_goals: Some(away_goals),
                },
            );
            id += 1;
        }
    }
    id
}
