//! Leakage-free rolling team form.
//!
//! Each team's records are processed in chronological order. The statistics
//! attached to a record at position `k` are computed from positions
//! `k - window ..= k - 1` only, so nothing about the match itself (or any later
//! match) can reach its features. A team's first record has no prior data and
//! every statistic is `None`; from the second record on the window holds
//! between one and `window` prior matches.

use std::collections::HashMap;

use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::FeatureError;
use crate::history::{TeamMatchRecord, chronological_key};

pub const DEFAULT_WINDOW: usize = 5;
const POINTS_PER_WIN: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormConfig {
    window: usize,
}

impl FormConfig {
    pub fn new(window: i64) -> Result<Self, FeatureError> {
        if window <= 0 {
            return Err(FeatureError::InvalidWindow(window));
        }
        let window = usize::try_from(window).map_err(|_| FeatureError::InvalidWindow(window))?;
        Ok(Self { window })
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
        }
    }
}

/// Rolling statistics over a team's prior matches. `None` means no prior match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RollingFormFeatures {
    pub avg_goals_for_last5: Option<f64>,
    pub avg_goals_against_last5: Option<f64>,
    pub win_rate_last5: Option<f64>,
    pub goal_diff_avg_last5: Option<f64>,
    /// Three points per win; draws count as zero.
    pub points_per_game_last5: Option<f64>,
}

impl RollingFormFeatures {
    pub const COLUMNS: [&'static str; 5] = [
        "avg_goals_for_last5",
        "avg_goals_against_last5",
        "win_rate_last5",
        "goal_diff_avg_last5",
        "points_per_game_last5",
    ];

    pub fn values(&self) -> [Option<f64>; 5] {
        [
            self.avg_goals_for_last5,
            self.avg_goals_against_last5,
            self.win_rate_last5,
            self.goal_diff_avg_last5,
            self.points_per_game_last5,
        ]
    }

    pub fn is_undefined(&self) -> bool {
        self.values().iter().all(Option::is_none)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamFormRecord {
    pub record: TeamMatchRecord,
    pub form: RollingFormFeatures,
}

#[derive(Debug, Clone, Copy, Default)]
struct Sample {
    goals_for: u32,
    goals_against: u32,
    win_flag: u8,
}

/// Fixed-capacity circular buffer keeping integer running sums of the last `capacity` samples.
#[derive(Debug)]
struct FormWindow {
    slots: Vec<Sample>,
    head: usize,
    len: usize,
    sum_for: i64,
    sum_against: i64,
    sum_wins: i64,
}

impl FormWindow {
    fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Sample::default(); capacity],
            head: 0,
            len: 0,
            sum_for: 0,
            sum_against: 0,
            sum_wins: 0,
        }
    }

    fn push(&mut self, sample: Sample) {
        let capacity = self.slots.len();
        if self.len == capacity {
            let evicted = self.slots[self.head];
            self.sum_for -= i64::from(evicted.goals_for);
            self.sum_against -= i64::from(evicted.goals_against);
            self.sum_wins -= i64::from(evicted.win_flag);
        } else {
            self.len += 1;
        }
        self.slots[self.head] = sample;
        self.head = (self.head + 1) % capacity;
        self.sum_for += i64::from(sample.goals_for);
        self.sum_against += i64::from(sample.goals_against);
        self.sum_wins += i64::from(sample.win_flag);
    }

    fn features(&self) -> RollingFormFeatures {
        if self.len == 0 {
            return RollingFormFeatures::default();
        }
        let n = self.len as f64;
        RollingFormFeatures {
            avg_goals_for_last5: Some(self.sum_for as f64 / n),
            avg_goals_against_last5: Some(self.sum_against as f64 / n),
            win_rate_last5: Some(self.sum_wins as f64 / n),
            goal_diff_avg_last5: Some((self.sum_for - self.sum_against) as f64 / n),
            points_per_game_last5: Some((self.sum_wins * POINTS_PER_WIN) as f64 / n),
        }
    }
}

/// Rolling form for one team. `records` must already be in chronological order.
pub fn team_rolling_form(records: &[&TeamMatchRecord], window: usize) -> Vec<RollingFormFeatures> {
    // A team never has more than `records.len()` prior matches to hold.
    let mut buf = FormWindow::new(window.min(records.len()).max(1));
    let mut out = Vec::with_capacity(records.len());
    for r in records {
        // Snapshot before pushing: the current match never sees itself.
        out.push(buf.features());
        buf.push(Sample {
            goals_for: r.goals_for,
            goals_against: r.goals_against,
            win_flag: r.win_flag,
        });
    }
    out
}

/// Attaches rolling form to every record. Output is sorted by `(team_id, date, match_id)`.
pub fn compute_rolling_form(records: &[TeamMatchRecord], config: &FormConfig) -> Vec<TeamFormRecord> {
    let mut by_team: HashMap<u32, Vec<&TeamMatchRecord>> = HashMap::new();
    for r in records {
        by_team.entry(r.team_id).or_default().push(r);
    }
    let teams = by_team.len();
    let window = config.window();

    let mut out: Vec<TeamFormRecord> = by_team
        .into_par_iter()
        .flat_map_iter(|(_, mut rows)| {
            rows.sort_by_key(|r| chronological_key(r));
            let form = team_rolling_form(&rows, window);
            rows.into_iter()
                .zip(form)
                .map(|(record, form)| TeamFormRecord {
                    record: record.clone(),
                    form,
                })
                .collect::<Vec<_>>()
        })
        .collect();
    out.sort_by_key(|r| chronological_key(&r.record));

    info!(
        "computed rolling form (window={window}) for {} records across {teams} teams",
        out.len()
    );
    out
}

/// Validates `window` before doing any work, then computes rolling form.
pub fn compute_rolling_form_with_window(
    records: &[TeamMatchRecord],
    window: i64,
) -> Result<Vec<TeamFormRecord>, FeatureError> {
    let config = FormConfig::new(window)?;
    Ok(compute_rolling_form(records, &config))
}

/// Lookup keyed by `(match_id, team_id)`.
pub fn form_index(rows: &[TeamFormRecord]) -> HashMap<(u64, u32), RollingFormFeatures> {
    rows.iter()
        .map(|r| ((r.record.match_id, r.record.team_id), r.form))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{FormConfig, FormWindow, Sample};
    use crate::error::FeatureError;

    #[test]
    fn rejects_non_positive_window() {
        assert_eq!(FormConfig::new(0), Err(FeatureError::InvalidWindow(0)));
        assert_eq!(FormConfig::new(-3), Err(FeatureError::InvalidWindow(-3)));
        assert_eq!(FormConfig::new(1).map(|c| c.window()), Ok(1));
        assert_eq!(FormConfig::default().window(), 5);
    }

    #[test]
    fn window_evicts_oldest_sample() {
        let mut w = FormWindow::new(2);
        assert!(w.features().is_undefined());
        for gf in [4, 2, 0] {
            w.push(Sample {
                goals_for: gf,
                goals_against: 1,
                win_flag: u8::from(gf > 1),
            });
        }
        let f = w.features();
        assert_eq!(f.avg_goals_for_last5, Some(1.0));
        assert_eq!(f.win_rate_last5, Some(0.5));
        assert_eq!(f.goal_diff_avg_last5, Some(0.0));
        assert_eq!(f.points_per_game_last5, Some(1.5));
    }
}
