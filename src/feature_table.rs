use chrono::NaiveDateTime;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::FeatureError;
use crate::history::expand_team_history;
use crate::labels::{Outcome, compute_match_result};
use crate::match_store::StoredMatch;
use crate::rolling_form::{
    FormConfig, RollingFormFeatures, TeamFormRecord, compute_rolling_form, form_index,
};
use crate::tactical::{
    TACTICAL_ATTRIBUTE_COUNT, TacticalAttribute, TeamStrength, tactical_differences, team_strength,
};

/// One match with both teams' most recent prior form and its static features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub match_id: u64,
    pub date: NaiveDateTime,
    pub league_id: u32,
    pub season: String,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub home_goals: u32,
    pub away_goals: u32,
    pub label: Outcome,
    pub home_form: RollingFormFeatures,
    pub away_form: RollingFormFeatures,
    pub tactical_diffs: [Option<f64>; TACTICAL_ATTRIBUTE_COUNT],
    pub strength: TeamStrength,
}

impl FeatureRow {
    /// Model inputs in `feature_names()` order; missing values are `NaN`.
    pub fn to_vector(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(feature_count());
        out.extend(self.home_form.values().iter().map(|v| v.unwrap_or(f64::NAN)));
        out.extend(self.away_form.values().iter().map(|v| v.unwrap_or(f64::NAN)));
        out.extend(self.tactical_diffs.iter().map(|v| v.unwrap_or(f64::NAN)));
        out.push(self.strength.home.unwrap_or(f64::NAN));
        out.push(self.strength.away.unwrap_or(f64::NAN));
        out.push(self.strength.diff.unwrap_or(f64::NAN));
        out
    }
}

pub fn feature_names() -> Vec<String> {
    let mut names = Vec::with_capacity(feature_count());
    for col in RollingFormFeatures::COLUMNS {
        names.push(format!("home_{col}"));
    }
    for col in RollingFormFeatures::COLUMNS {
        names.push(format!("away_{col}"));
    }
    for attr in TacticalAttribute::ALL {
        names.push(attr.diff_name());
    }
    names.push("home_team_strength".to_string());
    names.push("away_team_strength".to_string());
    names.push("team_strength_diff".to_string());
    names
}

pub fn feature_count() -> usize {
    RollingFormFeatures::COLUMNS.len() * 2 + TACTICAL_ATTRIBUTE_COUNT + 3
}

#[derive(Debug, Clone)]
pub struct FeatureTable {
    /// Sorted by `(date, match_id)`.
    pub rows: Vec<FeatureRow>,
    pub team_form: Vec<TeamFormRecord>,
}

pub fn build_feature_table(
    matches: &[StoredMatch],
    config: &FormConfig,
) -> Result<FeatureTable, FeatureError> {
    let history = expand_team_history(matches)?;
    let team_form = compute_rolling_form(&history, config);
    let index = form_index(&team_form);

    let mut rows = Vec::with_capacity(matches.len());
    for m in matches {
        let lookup = |team_id: u32| {
            index
                .get(&(m.match_id, team_id))
                .copied()
                .ok_or(FeatureError::MissingForm {
                    match_id: m.match_id,
                    team_id,
                })
        };
        rows.push(FeatureRow {
            match_id: m.match_id,
            date: m.date,
            league_id: m.league_id,
            season: m.season.clone(),
            home_team_id: m.home_team_id,
            away_team_id: m.away_team_id,
            home_goals: m.home_goals,
            away_goals: m.away_goals,
            label: compute_match_result(m.home_goals, m.away_goals),
            home_form: lookup(m.home_team_id)?,
            away_form: lookup(m.away_team_id)?,
            tactical_diffs: tactical_differences(&m.home_tactics, &m.away_tactics),
            strength: team_strength(&m.home_tactics, &m.away_tactics),
        });
    }
    rows.sort_by(|a, b| a.date.cmp(&b.date).then(a.match_id.cmp(&b.match_id)));

    info!(
        "built feature table: {} matches, {} team records",
        rows.len(),
        team_form.len()
    );
    Ok(FeatureTable { rows, team_form })
}

/// Dense model input: one row per match, labels as class indices.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
}

impl Dataset {
    pub fn from_rows(rows: &[FeatureRow]) -> Self {
        Self {
            features: rows.iter().map(FeatureRow::to_vector).collect(),
            labels: rows.iter().map(|r| r.label.index()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChronoSplit<'a> {
    pub train: &'a [FeatureRow],
    pub val: &'a [FeatureRow],
    pub test: &'a [FeatureRow],
}

/// Splits time-ordered rows into train / validation / test without shuffling.
pub fn chronological_split(
    rows: &[FeatureRow],
    val_fraction: f64,
    test_fraction: f64,
) -> Result<ChronoSplit<'_>, FeatureError> {
    let valid = |f: f64| f.is_finite() && f > 0.0 && f < 0.5;
    if !valid(val_fraction) || !valid(test_fraction) || val_fraction + test_fraction >= 0.9 {
        return Err(FeatureError::InvalidSplit {
            val: val_fraction,
            test: test_fraction,
        });
    }
    let n = rows.len();
    if n < 3 {
        return Err(FeatureError::NotEnoughRows(n));
    }
    let n_test = ((n as f64) * test_fraction).round().max(1.0) as usize;
    let n_val = ((n as f64) * val_fraction).round().max(1.0) as usize;
    let Some(n_train) = n.checked_sub(n_test + n_val).filter(|t| *t >= 1) else {
        return Err(FeatureError::NotEnoughRows(n));
    };
    let (train, rest) = rows.split_at(n_train);
    let (val, test) = rest.split_at(n_val);
    Ok(ChronoSplit { train, val, test })
}
