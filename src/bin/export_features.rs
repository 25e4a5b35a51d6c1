use std::path::PathBuf;

use anyhow::{Context, Result};

use predictiq::config::PipelineConfig;
use predictiq::export;
use predictiq::match_store;
use predictiq::pipeline;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = PipelineConfig::load()?;
    let out = config
        .export_out
        .clone()
        .unwrap_or_else(|| PathBuf::from("predictiq_features.xlsx"));

    let conn = match_store::open_db(&config.db_path)
        .with_context(|| format!("open match database {}", config.db_path.display()))?;
    let table = pipeline::build_features(&conn, &config)?;
    let report = export::export_feature_table(&out, &table)?;

    println!("Feature export complete");
    println!("DB: {}", config.db_path.display());
    println!("Rolling window: {}", config.form.window());
    println!("Matches: {}", report.matches);
    println!("Team records: {}", report.team_records);
    println!("Workbook: {}", out.display());
    Ok(())
}
