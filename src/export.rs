use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::feature_table::{FeatureRow, FeatureTable, feature_names};
use crate::rolling_form::{RollingFormFeatures, TeamFormRecord};

pub struct ExportReport {
    pub matches: usize,
    pub team_records: usize,
}

enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map(Cell::Number).unwrap_or(Cell::Empty)
    }
}

pub fn export_feature_table(path: &Path, table: &FeatureTable) -> Result<ExportReport> {
    let mut feature_rows = vec![feature_header()];
    feature_rows.extend(table.rows.iter().map(feature_row));

    let mut form_rows = vec![team_form_header()];
    form_rows.extend(table.team_form.iter().map(team_form_row));

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Features")?;
        write_rows(sheet, &feature_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("TeamForm")?;
        write_rows(sheet, &form_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        matches: table.rows.len(),
        team_records: table.team_form.len(),
    })
}

fn text(s: impl Into<String>) -> Cell {
    Cell::Text(s.into())
}

fn feature_header() -> Vec<Cell> {
    let mut header = vec![
        text("match_id"),
        text("date"),
        text("league_id"),
        text("season"),
        text("home_team_id"),
        text("away_team_id"),
        text("home_goals"),
        text("away_goals"),
        text("match_result"),
    ];
    header.extend(feature_names().into_iter().map(Cell::Text));
    header
}

fn feature_row(row: &FeatureRow) -> Vec<Cell> {
    let mut cells = vec![
        text(row.match_id.to_string()),
        text(row.date.format("%Y-%m-%d %H:%M:%S").to_string()),
        Cell::Number(f64::from(row.league_id)),
        text(row.season.clone()),
        Cell::Number(f64::from(row.home_team_id)),
        Cell::Number(f64::from(row.away_team_id)),
        Cell::Number(f64::from(row.home_goals)),
        Cell::Number(f64::from(row.away_goals)),
        text(row.label.as_str()),
    ];
    cells.extend(
        row.to_vector()
            .into_iter()
            .map(|v| if v.is_nan() { Cell::Empty } else { Cell::Number(v) }),
    );
    cells
}

fn team_form_header() -> Vec<Cell> {
    let mut header = vec![
        text("match_id"),
        text("date"),
        text("team_id"),
        text("is_home"),
        text("goals_for"),
        text("goals_against"),
        text("result"),
        text("win_flag"),
    ];
    header.extend(RollingFormFeatures::COLUMNS.iter().map(|c| text(*c)));
    header
}

fn team_form_row(row: &TeamFormRecord) -> Vec<Cell> {
    let r = &row.record;
    let mut cells = vec![
        text(r.match_id.to_string()),
        text(r.date.format("%Y-%m-%d %H:%M:%S").to_string()),
        Cell::Number(f64::from(r.team_id)),
        Cell::Number(if r.is_home { 1.0 } else { 0.0 }),
        Cell::Number(f64::from(r.goals_for)),
        Cell::Number(f64::from(r.goals_against)),
        text(r.result.as_str()),
        Cell::Number(f64::from(r.win_flag)),
    ];
    cells.extend(row.form.values().into_iter().map(Cell::from));
    cells
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<Cell>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            let (r, c) = (row_idx as u32, col_idx as u16);
            match cell {
                Cell::Text(value) => {
                    worksheet.write_string(r, c, value)?;
                }
                Cell::Number(value) => {
                    worksheet.write_number(r, c, *value)?;
                }
                Cell::Empty => {}
            }
        }
    }
    Ok(())
}
