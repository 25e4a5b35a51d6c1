use rayon::prelude::*;

use crate::calibration::{self, CalibratedModel, Prob3};
use crate::error::ModelError;
use crate::feature_table::Dataset;
use crate::gbdt::GbdtModel;
use crate::labels::{NUM_CLASSES, Outcome};

pub trait Classifier: Sync {
    fn predict_proba(&self, x: &[f64]) -> Prob3;
}

impl Classifier for GbdtModel {
    fn predict_proba(&self, x: &[f64]) -> Prob3 {
        GbdtModel::predict_proba(self, x)
    }
}

impl Classifier for CalibratedModel {
    fn predict_proba(&self, x: &[f64]) -> Prob3 {
        CalibratedModel::predict_proba(self, x)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalReport {
    pub samples: usize,
    pub macro_f1: f64,
    pub accuracy: f64,
    pub log_loss: f64,
    pub brier: f64,
}

/// `matrix[actual][predicted]`.
pub fn confusion_matrix(y_true: &[Outcome], y_pred: &[Outcome]) -> [[usize; NUM_CLASSES]; NUM_CLASSES] {
    let mut matrix = [[0usize; NUM_CLASSES]; NUM_CLASSES];
    for (t, p) in y_true.iter().zip(y_pred) {
        matrix[t.index()][p.index()] += 1;
    }
    matrix
}

pub fn accuracy(y_true: &[Outcome], y_pred: &[Outcome]) -> f64 {
    if y_true.is_empty() || y_true.len() != y_pred.len() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// Unweighted mean of per-class F1. A class with no true and no predicted rows scores 0.
pub fn macro_f1(y_true: &[Outcome], y_pred: &[Outcome]) -> f64 {
    if y_true.is_empty() || y_true.len() != y_pred.len() {
        return 0.0;
    }
    let m = confusion_matrix(y_true, y_pred);
    let mut total = 0.0;
    for k in 0..NUM_CLASSES {
        let tp = m[k][k] as f64;
        let actual: usize = m[k].iter().sum();
        let predicted: usize = m.iter().map(|row| row[k]).sum();
        let denom = (actual + predicted) as f64;
        if denom > 0.0 {
            total += 2.0 * tp / denom;
        }
    }
    total / NUM_CLASSES as f64
}

pub fn evaluate<C: Classifier>(model: &C, data: &Dataset) -> Result<EvalReport, ModelError> {
    if data.features.len() != data.labels.len() {
        return Err(ModelError::LabelCount {
            rows: data.features.len(),
            labels: data.labels.len(),
        });
    }
    let y_true = calibration::outcomes_from_labels(&data.labels)?;
    let probs: Vec<Prob3> = data
        .features
        .par_iter()
        .map(|x| model.predict_proba(x))
        .collect();
    let y_pred: Vec<Outcome> = probs.iter().map(|p| p.argmax()).collect();
    let prob_metrics = calibration::evaluate_probs(&probs, &y_true);

    Ok(EvalReport {
        samples: data.len(),
        macro_f1: macro_f1(&y_true, &y_pred),
        accuracy: accuracy(&y_true, &y_pred),
        log_loss: prob_metrics.log_loss,
        brier: prob_metrics.brier,
    })
}
