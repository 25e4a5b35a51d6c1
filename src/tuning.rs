use std::cmp::Ordering;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::error::ModelError;
use crate::feature_table::Dataset;
use crate::gbdt::{self, GbdtParams};
use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchSpace {
    pub n_estimators: (usize, usize),
    pub max_depth: (usize, usize),
    /// Sampled log-uniformly.
    pub learning_rate: (f64, f64),
    pub subsample: (f64, f64),
    pub colsample_bytree: (f64, f64),
    pub min_child_weight: (usize, usize),
    pub gamma: (f64, f64),
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            n_estimators: (200, 800),
            max_depth: (4, 10),
            learning_rate: (0.01, 0.2),
            subsample: (0.7, 1.0),
            colsample_bytree: (0.7, 1.0),
            min_child_weight: (1, 10),
            gamma: (0.0, 5.0),
        }
    }
}

impl SearchSpace {
    pub fn sample(&self, rng: &mut impl Rng, base: &GbdtParams) -> GbdtParams {
        let (lr_lo, lr_hi) = self.learning_rate;
        let learning_rate = (lr_lo.ln() + rng.r#gen::<f64>() * (lr_hi.ln() - lr_lo.ln())).exp();
        GbdtParams {
            n_estimators: rng.gen_range(self.n_estimators.0..=self.n_estimators.1),
            max_depth: rng.gen_range(self.max_depth.0..=self.max_depth.1),
            learning_rate,
            subsample: uniform(rng, self.subsample),
            colsample_bytree: uniform(rng, self.colsample_bytree),
            min_child_weight: rng.gen_range(self.min_child_weight.0..=self.min_child_weight.1) as f64,
            gamma: uniform(rng, self.gamma),
            ..*base
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        let bad = |name: &'static str| {
            Err(ModelError::InvalidParam {
                name,
                reason: "search range is empty or out of bounds".to_string(),
            })
        };
        if self.n_estimators.0 == 0 || self.n_estimators.0 > self.n_estimators.1 {
            return bad("n_estimators");
        }
        if self.max_depth.0 == 0 || self.max_depth.0 > self.max_depth.1 {
            return bad("max_depth");
        }
        if !(self.learning_rate.0 > 0.0 && self.learning_rate.0 <= self.learning_rate.1) {
            return bad("learning_rate");
        }
        if self.min_child_weight.0 > self.min_child_weight.1 {
            return bad("min_child_weight");
        }
        for (name, (lo, hi)) in [
            ("subsample", self.subsample),
            ("colsample_bytree", self.colsample_bytree),
            ("gamma", self.gamma),
        ] {
            if !(lo <= hi) {
                return bad(name);
            }
        }
        Ok(())
    }
}

fn uniform(rng: &mut impl Rng, (lo, hi): (f64, f64)) -> f64 {
    if hi <= lo {
        return lo;
    }
    rng.gen_range(lo..=hi)
}

#[derive(Debug, Clone)]
pub struct TrialResult {
    pub trial: usize,
    pub params: GbdtParams,
    pub macro_f1: f64,
    pub accuracy: f64,
    pub log_loss: f64,
    /// Boosting rounds kept after early stopping on the validation split.
    pub rounds: usize,
}

#[derive(Debug, Clone)]
pub struct TuningResult {
    pub best: TrialResult,
    /// All successful trials, best first.
    pub trials: Vec<TrialResult>,
}

/// Random search scored by validation macro-F1. Each trial draws from its own
/// seed, so results do not depend on scheduling.
pub fn tune(
    train: &Dataset,
    val: &Dataset,
    space: &SearchSpace,
    base: &GbdtParams,
    trials: usize,
    seed: u64,
) -> Result<TuningResult, ModelError> {
    space.validate()?;
    if trials == 0 {
        return Err(ModelError::InvalidParam {
            name: "trials",
            reason: "must be at least 1".to_string(),
        });
    }
    if train.is_empty() || val.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }

    let outcomes: Vec<Result<TrialResult, ModelError>> = (0..trials)
        .into_par_iter()
        .map(|trial| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(trial as u64));
            let params = GbdtParams {
                seed: seed.wrapping_add(trial as u64),
                ..space.sample(&mut rng, base)
            };
            let model = gbdt::train(train, Some(val), &params)?;
            let report = metrics::evaluate(&model, val)?;
            info!(
                "trial {trial}: macro_f1={:.4} acc={:.4} depth={} rounds={}/{} lr={:.4}",
                report.macro_f1,
                report.accuracy,
                params.max_depth,
                model.eval_history.len(),
                params.n_estimators,
                params.learning_rate
            );
            Ok(TrialResult {
                trial,
                params,
                macro_f1: report.macro_f1,
                accuracy: report.accuracy,
                log_loss: report.log_loss,
                rounds: model.eval_history.len(),
            })
        })
        .collect();

    let mut ok = Vec::with_capacity(outcomes.len());
    let mut first_err = None;
    for outcome in outcomes {
        match outcome {
            Ok(result) => ok.push(result),
            Err(err) => {
                warn!("trial failed: {err}");
                first_err.get_or_insert(err);
            }
        }
    }
    ok.sort_by(compare_trials);
    let Some(best) = ok.first().cloned() else {
        return Err(first_err.unwrap_or(ModelError::EmptyTrainingSet));
    };
    Ok(TuningResult { best, trials: ok })
}

fn compare_trials(a: &TrialResult, b: &TrialResult) -> Ordering {
    b.macro_f1
        .partial_cmp(&a.macro_f1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.trial.cmp(&b.trial))
}
