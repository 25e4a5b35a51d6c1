use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database not found at {}", .0.display())]
    NotFound(PathBuf),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("table `{0}` does not exist")]
    MissingTable(String),
    #[error("table `{table}` is missing required column `{column}`")]
    MissingColumn { table: String, column: String },
    #[error("match {match_id} has no value for required column `{column}`")]
    MissingValue { match_id: i64, column: String },
    #[error("match {match_id} has invalid `{column}` value {value:?}")]
    InvalidValue {
        match_id: i64,
        column: String,
        value: String,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("rolling window must be a positive integer, got {0}")]
    InvalidWindow(i64),
    #[error("match {match_id} has the same team ({team_id}) on both sides")]
    SameTeam { match_id: u64, team_id: u32 },
    #[error("duplicate match id {0}")]
    DuplicateMatch(u64),
    #[error("no rolling form for team {team_id} in match {match_id}")]
    MissingForm { match_id: u64, team_id: u32 },
    #[error("invalid split fractions: validation {val}, test {test}")]
    InvalidSplit { val: f64, test: f64 },
    #[error("not enough matches to split: {0}")]
    NotEnoughRows(usize),
}

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("empty training set")]
    EmptyTrainingSet,
    #[error("feature width mismatch: expected {expected}, got {actual}")]
    FeatureWidth { expected: usize, actual: usize },
    #[error("label/row count mismatch: {rows} rows, {labels} labels")]
    LabelCount { rows: usize, labels: usize },
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParam { name: &'static str, reason: String },
}
