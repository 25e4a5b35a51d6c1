use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use log::{info, warn};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, params_from_iter};

use crate::error::StoreError;
use crate::tactical::{TacticalAttribute, TacticalProfile};

pub const MATCH_TABLE: &str = "Match";
pub const TEAM_ATTRIBUTES_TABLE: &str = "Team_Attributes";

const COL_MATCH_ID: &str = "match_api_id";
const COL_DATE: &str = "date";
const COL_HOME_TEAM: &str = "home_team_api_id";
const COL_AWAY_TEAM: &str = "away_team_api_id";
const COL_HOME_GOALS: &str = "home_team_goal";
const COL_AWAY_GOALS: &str = "away_team_goal";
const COL_LEAGUE: &str = "league_id";
const COL_SEASON: &str = "season";
const COL_ATTR_TEAM: &str = "team_api_id";

pub const REQUIRED_MATCH_COLUMNS: [&str; 6] = [
    COL_MATCH_ID,
    COL_DATE,
    COL_HOME_TEAM,
    COL_AWAY_TEAM,
    COL_HOME_GOALS,
    COL_AWAY_GOALS,
];

#[derive(Debug, Clone, PartialEq)]
pub struct StoredMatch {
    pub match_id: u64,
    pub league_id: u32,
    pub season: String,
    pub date: NaiveDateTime,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub home_goals: u32,
    pub away_goals: u32,
    pub home_tactics: TacticalProfile,
    pub away_tactics: TacticalProfile,
}

impl StoredMatch {
    pub fn new(
        match_id: u64,
        date: NaiveDateTime,
        home_team_id: u32,
        away_team_id: u32,
        home_goals: u32,
        away_goals: u32,
    ) -> Self {
        Self {
            match_id,
            league_id: 0,
            season: String::new(),
            date,
            home_team_id,
            away_team_id,
            home_goals,
            away_goals,
            home_tactics: TacticalProfile::default(),
            away_tactics: TacticalProfile::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatchFilter {
    pub league_ids: Vec<u32>,
    pub seasons: Vec<String>,
}

/// Dated tactical snapshots per team, sorted ascending by date.
#[derive(Debug, Clone, Default)]
pub struct TeamAttributeHistory {
    by_team: HashMap<u32, Vec<(NaiveDateTime, TacticalProfile)>>,
}

impl TeamAttributeHistory {
    pub fn insert(&mut self, team_id: u32, date: NaiveDateTime, profile: TacticalProfile) {
        let rows = self.by_team.entry(team_id).or_default();
        let idx = rows.partition_point(|(d, _)| *d <= date);
        rows.insert(idx, (date, profile));
    }

    /// Most recent snapshot dated on or before `date`. Later snapshots are never used.
    pub fn as_of(&self, team_id: u32, date: NaiveDateTime) -> Option<&TacticalProfile> {
        let rows = self.by_team.get(&team_id)?;
        let idx = rows.partition_point(|(d, _)| *d <= date);
        idx.checked_sub(1).map(|i| &rows[i].1)
    }

    pub fn teams(&self) -> usize {
        self.by_team.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_team.is_empty()
    }
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("database.sqlite"))
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("XDG_CACHE_HOME")
        && !dir.trim().is_empty()
    {
        return Some(PathBuf::from(dir).join("predictiq"));
    }
    if let Ok(dir) = std::env::var("LOCALAPPDATA")
        && !dir.trim().is_empty()
    {
        return Some(PathBuf::from(dir).join("predictiq"));
    }
    std::env::var("HOME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .map(|home| PathBuf::from(home).join(".cache").join("predictiq"))
}

/// Opens the match database read-only. The store is never written to.
pub fn open_db(path: &Path) -> Result<Connection, StoreError> {
    if !path.exists() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(conn)
}

pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let rows = stmt.query_map([table], |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    if out.is_empty() {
        return Err(StoreError::MissingTable(table.to_string()));
    }
    Ok(out)
}

/// Loads matches ordered by `(date, match_id)`. Fails on any missing required column or value.
pub fn load_matches(conn: &Connection, filter: &MatchFilter) -> Result<Vec<StoredMatch>, StoreError> {
    let columns = table_columns(conn, MATCH_TABLE)?;
    for required in REQUIRED_MATCH_COLUMNS {
        if !columns.iter().any(|c| c == required) {
            return Err(StoreError::MissingColumn {
                table: MATCH_TABLE.to_string(),
                column: required.to_string(),
            });
        }
    }
    let has_league = columns.iter().any(|c| c == COL_LEAGUE);
    let has_season = columns.iter().any(|c| c == COL_SEASON);
    let filter_columns = [
        (!filter.league_ids.is_empty(), has_league, COL_LEAGUE),
        (!filter.seasons.is_empty(), has_season, COL_SEASON),
    ];
    for (requested, present, column) in filter_columns {
        if requested && !present {
            return Err(StoreError::MissingColumn {
                table: MATCH_TABLE.to_string(),
                column: column.to_string(),
            });
        }
    }

    let mut sql = format!(
        "SELECT {COL_MATCH_ID}, {COL_DATE}, {COL_HOME_TEAM}, {COL_AWAY_TEAM}, {COL_HOME_GOALS}, {COL_AWAY_GOALS}, {}, {} FROM \"{MATCH_TABLE}\"",
        if has_league { COL_LEAGUE } else { "NULL" },
        if has_season { COL_SEASON } else { "NULL" },
    );
    let mut clauses = Vec::new();
    let mut binds: Vec<Value> = Vec::new();
    if !filter.league_ids.is_empty() {
        clauses.push(format!("{COL_LEAGUE} IN ({})", placeholders(binds.len(), filter.league_ids.len())));
        binds.extend(filter.league_ids.iter().map(|id| Value::Integer(i64::from(*id))));
    }
    if !filter.seasons.is_empty() {
        clauses.push(format!("{COL_SEASON} IN ({})", placeholders(binds.len(), filter.seasons.len())));
        binds.extend(filter.seasons.iter().map(|s| Value::Text(s.clone())));
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(binds.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let raw_id: Option<i64> = row.get(0)?;
        let Some(raw_id) = raw_id else {
            return Err(StoreError::MissingValue {
                match_id: -1,
                column: COL_MATCH_ID.to_string(),
            });
        };
        let match_id = u64::try_from(raw_id).map_err(|_| StoreError::InvalidValue {
            match_id: raw_id,
            column: COL_MATCH_ID.to_string(),
            value: raw_id.to_string(),
        })?;

        let raw_date: Option<String> = row.get(1)?;
        let raw_date = required(raw_id, COL_DATE, raw_date)?;
        let date = parse_match_date(&raw_date).ok_or_else(|| StoreError::InvalidValue {
            match_id: raw_id,
            column: COL_DATE.to_string(),
            value: raw_date.clone(),
        })?;

        let home_team_id = required_u32(raw_id, COL_HOME_TEAM, row.get(2)?)?;
        let away_team_id = required_u32(raw_id, COL_AWAY_TEAM, row.get(3)?)?;
        let home_goals = required_u32(raw_id, COL_HOME_GOALS, row.get(4)?)?;
        let away_goals = required_u32(raw_id, COL_AWAY_GOALS, row.get(5)?)?;
        let league_id = row
            .get::<_, Option<i64>>(6)?
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0);
        let season = row.get::<_, Option<String>>(7)?.unwrap_or_default();

        out.push(StoredMatch {
            match_id,
            league_id,
            season,
            date,
            home_team_id,
            away_team_id,
            home_goals,
            away_goals,
            home_tactics: TacticalProfile::default(),
            away_tactics: TacticalProfile::default(),
        });
    }

    out.sort_by(|a, b| a.date.cmp(&b.date).then(a.match_id.cmp(&b.match_id)));
    info!("loaded {} matches from `{MATCH_TABLE}`", out.len());
    Ok(out)
}

/// Loads the dated tactical snapshots. A missing table yields an empty history.
pub fn load_team_attributes(conn: &Connection) -> Result<TeamAttributeHistory, StoreError> {
    let columns = match table_columns(conn, TEAM_ATTRIBUTES_TABLE) {
        Ok(cols) => cols,
        Err(StoreError::MissingTable(table)) => {
            warn!("table `{table}` not found; tactical features disabled");
            return Ok(TeamAttributeHistory::default());
        }
        Err(err) => return Err(err),
    };
    for required in [COL_ATTR_TEAM, COL_DATE] {
        if !columns.iter().any(|c| c == required) {
            return Err(StoreError::MissingColumn {
                table: TEAM_ATTRIBUTES_TABLE.to_string(),
                column: required.to_string(),
            });
        }
    }

    let present: Vec<TacticalAttribute> = TacticalAttribute::ALL
        .into_iter()
        .filter(|attr| {
            let found = columns.iter().any(|c| c == attr.column_name());
            if !found {
                warn!(
                    "`{TEAM_ATTRIBUTES_TABLE}` has no `{}` column; skipping it",
                    attr.column_name()
                );
            }
            found
        })
        .collect();

    let mut select = vec![COL_ATTR_TEAM.to_string(), COL_DATE.to_string()];
    select.extend(present.iter().map(|a| a.column_name().to_string()));
    let sql = format!(
        "SELECT {} FROM \"{TEAM_ATTRIBUTES_TABLE}\"",
        select.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    let mut history = TeamAttributeHistory::default();
    let mut skipped = 0usize;
    while let Some(row) = rows.next()? {
        let team_id = row
            .get::<_, Option<i64>>(0)?
            .and_then(|v| u32::try_from(v).ok());
        let date = row
            .get::<_, Option<String>>(1)?
            .and_then(|raw| parse_match_date(&raw));
        let (Some(team_id), Some(date)) = (team_id, date) else {
            skipped += 1;
            continue;
        };
        let mut profile = TacticalProfile::default();
        for (offset, attr) in present.iter().enumerate() {
            let value: Option<f64> = row.get(offset + 2)?;
            profile.set(*attr, value);
        }
        history.insert(team_id, date, profile);
    }
    if skipped > 0 {
        warn!("skipped {skipped} `{TEAM_ATTRIBUTES_TABLE}` rows without team id or date");
    }
    info!("loaded tactical snapshots for {} teams", history.teams());
    Ok(history)
}

/// Attaches as-of tactics to both sides. Returns how many matches got no
/// snapshot for either team.
pub fn attach_team_attributes(matches: &mut [StoredMatch], history: &TeamAttributeHistory) -> usize {
    let mut without = 0usize;
    for m in matches.iter_mut() {
        m.home_tactics = history
            .as_of(m.home_team_id, m.date)
            .copied()
            .unwrap_or_default();
        m.away_tactics = history
            .as_of(m.away_team_id, m.date)
            .copied()
            .unwrap_or_default();
        if m.home_tactics.is_empty() && m.away_tactics.is_empty() {
            without += 1;
        }
    }
    without
}

/// Matches with their as-of tactical attributes attached.
pub fn load_match_table(conn: &Connection, filter: &MatchFilter) -> Result<Vec<StoredMatch>, StoreError> {
    let mut matches = load_matches(conn, filter)?;
    let history = load_team_attributes(conn)?;
    if history.is_empty() {
        return Ok(matches);
    }
    let without = attach_team_attributes(&mut matches, &history);
    if without > 0 {
        warn!("{without} of {} matches have no tactical snapshot for either team", matches.len());
    }
    Ok(matches)
}

pub fn parse_match_date(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn placeholders(offset: usize, count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", offset + i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn required<T>(match_id: i64, column: &str, value: Option<T>) -> Result<T, StoreError> {
    value.ok_or_else(|| StoreError::MissingValue {
        match_id,
        column: column.to_string(),
    })
}

fn required_u32(match_id: i64, column: &str, value: Option<i64>) -> Result<u32, StoreError> {
    let raw = required(match_id, column, value)?;
    u32::try_from(raw).map_err(|_| StoreError::InvalidValue {
        match_id,
        column: column.to_string(),
        value: raw.to_string(),
    })
}
