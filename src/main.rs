use anyhow::{Context, Result};

use predictiq::calibration;
use predictiq::config::PipelineConfig;
use predictiq::labels::Outcome;
use predictiq::match_store;
use predictiq::metrics::EvalReport;
use predictiq::pipeline;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = PipelineConfig::load()?;
    let conn = match_store::open_db(&config.db_path)
        .with_context(|| format!("open match database {}", config.db_path.display()))?;

    let table = pipeline::build_features(&conn, &config)?;
    let data = pipeline::split_datasets(&table, &config)?;
    let trained = pipeline::train_and_evaluate(&data, &config.gbdt, config.calibration)?;
    let report = &trained.report;

    println!("PredictIQ match outcome model");
    println!("DB: {}", config.db_path.display());
    println!("Rolling window: {}", config.form.window());
    if let (Some(first), Some(last)) = (table.rows.first(), table.rows.last()) {
        println!("Range: {} -> {}", first.date.date(), last.date.date());
    }
    println!(
        "Split: train={} val={} test={}",
        report.split.train, report.split.val, report.split.test
    );
    println!("Boosting rounds: {}", trained.model.n_rounds());
    println!();

    print_report("Validation (raw)", &report.val_raw);
    print_report("Test (raw)", &report.test_raw);
    if let Some((method, cal)) = &report.calibration {
        print_report(&format!("Test ({method} calibrated)"), cal);
    }

    if let Some(cal) = &trained.calibrated {
        println!();
        println!("Home-win calibration bins (test, calibrated):");
        let probs = cal.predict_proba_batch(&data.test.features);
        let outcomes = calibration::outcomes_from_labels(&data.test.labels)?;
        for bin in calibration::calibration_bins(&probs, &outcomes, Outcome::HomeWin, 10) {
            if bin.count == 0 {
                continue;
            }
            println!(
                "  [{:.1},{:.1}) n={:<4} pred={:.3} actual={:.3}",
                bin.bucket_start, bin.bucket_end, bin.count, bin.avg_pred, bin.actual_rate
            );
        }
    }

    if let Some(path) = &config.model_out {
        trained.model.save(path)?;
        println!();
        println!("Saved model to {}", path.display());
    }

    Ok(())
}

fn print_report(label: &str, r: &EvalReport) {
    println!("{label}:");
    println!(
        "  samples={} macro_f1={:.4} accuracy={:.4} log_loss={:.4} brier={:.4}",
        r.samples, r.macro_f1, r.accuracy, r.log_loss, r.brier
    );
}
