use anyhow::{Context, Result, anyhow};
use log::info;
use rusqlite::Connection;

use crate::calibration::{self, CalibratedModel, CalibrationMethod};
use crate::config::PipelineConfig;
use crate::feature_table::{self, Dataset, FeatureTable};
use crate::gbdt::{self, GbdtModel, GbdtParams};
use crate::match_store;
use crate::metrics::{self, EvalReport};

#[derive(Debug, Clone)]
pub struct SplitSizes {
    pub train: usize,
    pub val: usize,
    pub test: usize,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub split: SplitSizes,
    pub val_raw: EvalReport,
    pub test_raw: EvalReport,
    pub calibration: Option<(CalibrationMethod, EvalReport)>,
}

pub struct TrainedPipeline {
    pub model: GbdtModel,
    pub calibrated: Option<CalibratedModel>,
    pub report: TrainingReport,
}

pub struct SplitData {
    pub sizes: SplitSizes,
    pub train: Dataset,
    pub val: Dataset,
    pub test: Dataset,
}

/// Match store -> labelled, form-augmented feature table.
pub fn build_features(conn: &Connection, config: &PipelineConfig) -> Result<FeatureTable> {
    let matches = match_store::load_match_table(conn, &config.filter).context("load matches")?;
    if matches.is_empty() {
        return Err(anyhow!("no matches found in {}", config.db_path.display()));
    }
    let table = feature_table::build_feature_table(&matches, &config.form)?;
    Ok(table)
}

pub fn split_datasets(table: &FeatureTable, config: &PipelineConfig) -> Result<SplitData> {
    let split =
        feature_table::chronological_split(&table.rows, config.val_fraction, config.test_fraction)?;
    let sizes = SplitSizes {
        train: split.train.len(),
        val: split.val.len(),
        test: split.test.len(),
    };
    info!(
        "chronological split: train={} val={} test={}",
        sizes.train, sizes.val, sizes.test
    );
    Ok(SplitData {
        sizes,
        train: Dataset::from_rows(split.train),
        val: Dataset::from_rows(split.val),
        test: Dataset::from_rows(split.test),
    })
}

/// Train on the earliest matches, score validation/test, then calibrate on validation.
pub fn train_and_evaluate(
    data: &SplitData,
    params: &GbdtParams,
    calibration: Option<CalibrationMethod>,
) -> Result<TrainedPipeline> {
    let model = gbdt::train(&data.train, Some(&data.val), params)?;
    let val_raw = metrics::evaluate(&model, &data.val)?;
    let test_raw = metrics::evaluate(&model, &data.test)?;

    let (calibrated, cal_report) = match calibration {
        Some(method) => {
            let cal = calibration::calibrate_model(model.clone(), &data.val, method)?;
            let report = metrics::evaluate(&cal, &data.test)?;
            (Some(cal), Some((method, report)))
        }
        None => (None, None),
    };

    Ok(TrainedPipeline {
        model,
        calibrated,
        report: TrainingReport {
            split: data.sizes.clone(),
            val_raw,
            test_raw,
            calibration: cal_report,
        },
    })
}
