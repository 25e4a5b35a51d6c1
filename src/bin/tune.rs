use anyhow::{Context, Result};

use predictiq::config::{PipelineConfig, has_flag};
use predictiq::gbdt;
use predictiq::match_store;
use predictiq::metrics;
use predictiq::pipeline;
use predictiq::tuning::{self, SearchSpace};

const SHOW_TOP: usize = 10;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = PipelineConfig::load()?;
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let refit = has_flag(&args, "--refit");

    let conn = match_store::open_db(&config.db_path)
        .with_context(|| format!("open match database {}", config.db_path.display()))?;
    let table = pipeline::build_features(&conn, &config)?;
    let data = pipeline::split_datasets(&table, &config)?;

    let result = tuning::tune(
        &data.train,
        &data.val,
        &SearchSpace::default(),
        &config.gbdt,
        config.trials,
        config.seed,
    )?;

    println!("Hyperparameter search");
    println!("DB: {}", config.db_path.display());
    println!(
        "Trials: {} (train={} val={})",
        result.trials.len(),
        data.sizes.train,
        data.sizes.val
    );
    println!();
    for t in result.trials.iter().take(SHOW_TOP) {
        let p = &t.params;
        println!(
            "  #{:<3} f1={:.4} acc={:.4} ll={:.4} rounds={:<3}/{:<3} depth={:<2} lr={:.4} sub={:.2} col={:.2} mcw={:.0} gamma={:.2}",
            t.trial,
            t.macro_f1,
            t.accuracy,
            t.log_loss,
            t.rounds,
            p.n_estimators,
            p.max_depth,
            p.learning_rate,
            p.subsample,
            p.colsample_bytree,
            p.min_child_weight,
            p.gamma,
        );
    }
    println!();
    println!(
        "Best trial #{} macro_f1={:.4}",
        result.best.trial, result.best.macro_f1
    );

    if refit {
        let model = gbdt::train(&data.train, Some(&data.val), &result.best.params)?;
        let test = metrics::evaluate(&model, &data.test)?;
        println!(
            "Refit best params: test macro_f1={:.4} accuracy={:.4} log_loss={:.4}",
            test.macro_f1, test.accuracy, test.log_loss
        );
        if let Some(path) = &config.model_out {
            model.save(path)?;
            println!("Saved model to {}", path.display());
        }
    }

    Ok(())
}
