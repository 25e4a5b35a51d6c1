use std::fmt;
use std::str::FromStr;

use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::feature_table::Dataset;
use crate::gbdt::GbdtModel;
use crate::labels::{NUM_CLASSES, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prob3 {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

impl Prob3 {
    pub fn uniform() -> Self {
        Self {
            home: 1.0 / 3.0,
            draw: 1.0 / 3.0,
            away: 1.0 / 3.0,
        }
    }

    pub fn from_array(p: [f64; NUM_CLASSES]) -> Self {
        Self {
            home: p[0],
            draw: p[1],
            away: p[2],
        }
    }

    pub fn to_array(self) -> [f64; NUM_CLASSES] {
        [self.home, self.draw, self.away]
    }

    pub fn get(self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::HomeWin => self.home,
            Outcome::Draw => self.draw,
            Outcome::AwayWin => self.away,
        }
    }

    pub fn argmax(self) -> Outcome {
        if self.home >= self.draw && self.home >= self.away {
            Outcome::HomeWin
        } else if self.draw >= self.away {
            Outcome::Draw
        } else {
            Outcome::AwayWin
        }
    }

    /// Rescales to sum to one; falls back to uniform when nothing is left.
    pub fn normalized(self) -> Self {
        let sum = self.home + self.draw + self.away;
        if !(sum > 1e-12) || !sum.is_finite() {
            return Self::uniform();
        }
        Self {
            home: self.home / sum,
            draw: self.draw / sum,
            away: self.away / sum,
        }
    }
}

pub fn evaluate_probs(predictions: &[Prob3], outcomes: &[Outcome]) -> Metrics {
    if predictions.is_empty() || outcomes.is_empty() || predictions.len() != outcomes.len() {
        return Metrics {
            samples: 0,
            brier: 0.0,
            log_loss: 0.0,
            accuracy: 0.0,
        };
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut correct = 0usize;

    for (p, outcome) in predictions.iter().zip(outcomes) {
        let y = one_hot(*outcome);
        brier_sum +=
            (p.home - y.home).powi(2) + (p.draw - y.draw).powi(2) + (p.away - y.away).powi(2);

        let actual_prob = p.get(*outcome).clamp(1e-12, 1.0);
        log_loss_sum += -actual_prob.ln();

        if p.argmax() == *outcome {
            correct += 1;
        }
    }

    let n = predictions.len() as f64;
    Metrics {
        samples: predictions.len(),
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
        accuracy: correct as f64 / n,
    }
}

pub fn apply_logit_calibration(prob: Prob3, logit_scale: f64, draw_bias: f64) -> Prob3 {
    let s = logit_scale.clamp(0.10, 3.00);
    let mut lh = prob.home.clamp(1e-9, 1.0).ln();
    let mut ld = prob.draw.clamp(1e-9, 1.0).ln() + draw_bias;
    let mut la = prob.away.clamp(1e-9, 1.0).ln();

    let mean = (lh + ld + la) / 3.0;
    lh = (lh - mean) * s;
    ld = (ld - mean) * s;
    la = (la - mean) * s;

    let mx = lh.max(ld.max(la));
    let eh = (lh - mx).exp();
    let ed = (ld - mx).exp();
    let ea = (la - mx).exp();
    let den = (eh + ed + ea).max(1e-12);

    Prob3 {
        home: (eh / den).clamp(0.0, 1.0),
        draw: (ed / den).clamp(0.0, 1.0),
        away: (ea / den).clamp(0.0, 1.0),
    }
}

/// Grid search over logit temperature and draw bias minimising log loss.
pub fn fit_logit_calibration(predictions: &[Prob3], outcomes: &[Outcome]) -> (f64, f64, Metrics) {
    if predictions.is_empty() || outcomes.is_empty() || predictions.len() != outcomes.len() {
        return (
            1.0,
            0.0,
            Metrics {
                samples: 0,
                brier: 0.0,
                log_loss: 0.0,
                accuracy: 0.0,
            },
        );
    }

    let grid: Vec<(f64, f64)> = (10..=100)
        .flat_map(|scale_step| {
            let scale = scale_step as f64 / 50.0; // 0.20..2.00
            (-25..=25).map(move |draw_step| (scale, draw_step as f64 / 50.0)) // -0.50..0.50
        })
        .collect();

    let baseline = (1.0, 0.0, evaluate_probs(predictions, outcomes));
    grid.par_iter()
        .map(|&(scale, draw_bias)| {
            (
                scale,
                draw_bias,
                evaluate_calibrated(predictions, outcomes, scale, draw_bias),
            )
        })
        .reduce(
            || baseline,
            |a, b| {
                let b_wins = b.2.log_loss < a.2.log_loss
                    || (b.2.log_loss == a.2.log_loss && (b.0, b.1) < (a.0, a.1));
                if b_wins { b } else { a }
            },
        )
}

pub fn calibration_bins(
    predictions: &[Prob3],
    outcomes: &[Outcome],
    class: Outcome,
    bins: usize,
) -> Vec<CalibrationBin> {
    let bins = bins.max(2);
    let mut counts = vec![0usize; bins];
    let mut pred_sum = vec![0.0_f64; bins];
    let mut actual_sum = vec![0.0_f64; bins];

    for (p, outcome) in predictions.iter().zip(outcomes) {
        let class_prob = p.get(class).clamp(0.0, 1.0);

        let idx = ((class_prob * bins as f64).floor() as usize).min(bins - 1);
        counts[idx] += 1;
        pred_sum[idx] += class_prob;
        if *outcome == class {
            actual_sum[idx] += 1.0;
        }
    }

    let mut out = Vec::with_capacity(bins);
    for i in 0..bins {
        let start = i as f64 / bins as f64;
        let end = (i + 1) as f64 / bins as f64;
        let count = counts[i];
        let (avg_pred, actual_rate) = if count > 0 {
            (pred_sum[i] / count as f64, actual_sum[i] / count as f64)
        } else {
            (0.0, 0.0)
        };
        out.push(CalibrationBin {
            bucket_start: start,
            bucket_end: end,
            count,
            avg_pred,
            actual_rate,
        });
    }
    out
}

/// Monotone non-decreasing step function fitted with pool-adjacent-violators.
/// Prediction interpolates linearly between knots and clamps outside them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IsotonicCurve {
    knots: Vec<(f64, f64)>,
}

impl IsotonicCurve {
    pub fn fit(x: &[f64], y: &[f64]) -> Self {
        let mut pairs: Vec<(f64, f64)> = x
            .iter()
            .zip(y)
            .filter(|(a, b)| a.is_finite() && b.is_finite())
            .map(|(a, b)| (*a, *b))
            .collect();
        if pairs.is_empty() {
            return Self::default();
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        // (sum_y, count, x_min, x_max)
        let mut blocks: Vec<(f64, f64, f64, f64)> = Vec::with_capacity(pairs.len());
        for (xi, yi) in pairs {
            blocks.push((yi, 1.0, xi, xi));
            while blocks.len() >= 2 {
                let last = blocks[blocks.len() - 1];
                let prev = blocks[blocks.len() - 2];
                if prev.0 / prev.1 <= last.0 / last.1 {
                    break;
                }
                blocks.pop();
                let merged = blocks.len() - 1;
                blocks[merged] = (prev.0 + last.0, prev.1 + last.1, prev.2, last.3);
            }
        }

        let mut knots = Vec::with_capacity(blocks.len() * 2);
        for (sum, count, x_min, x_max) in blocks {
            let value = sum / count;
            knots.push((x_min, value));
            if x_max > x_min {
                knots.push((x_max, value));
            }
        }
        Self { knots }
    }

    pub fn predict(&self, x: f64) -> f64 {
        let Some(first) = self.knots.first() else {
            return x;
        };
        let Some(last) = self.knots.last() else {
            return x;
        };
        if x.is_nan() {
            return first.1;
        }
        if x <= first.0 {
            return first.1;
        }
        if x >= last.0 {
            return last.1;
        }
        let idx = self.knots.partition_point(|(kx, _)| *kx <= x);
        let (x0, y0) = self.knots[idx - 1];
        let (x1, y1) = self.knots[idx];
        if x1 <= x0 {
            return y1;
        }
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }
}

/// Platt scaling of one class score: `p = 1 / (1 + exp(a * f + b))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattCurve {
    pub a: f64,
    pub b: f64,
}

impl Default for PlattCurve {
    fn default() -> Self {
        Self { a: -1.0, b: 0.0 }
    }
}

impl PlattCurve {
    const MAX_ITER: usize = 100;
    const MIN_STEP: f64 = 1e-10;
    const SIGMA: f64 = 1e-12;
    const EPS: f64 = 1e-5;

    /// Newton fit with backtracking on the log loss against the smoothed
    /// targets `(n+ + 1) / (n+ + 2)` and `1 / (n- + 2)`.
    pub fn fit(scores: &[f64], positive: &[bool]) -> Self {
        let pairs: Vec<(f64, bool)> = scores
            .iter()
            .zip(positive)
            .filter(|(f, _)| f.is_finite())
            .map(|(f, y)| (*f, *y))
            .collect();
        if pairs.is_empty() {
            return Self::default();
        }

        let n_pos = pairs.iter().filter(|(_, y)| *y).count() as f64;
        let n_neg = pairs.len() as f64 - n_pos;
        let hi = (n_pos + 1.0) / (n_pos + 2.0);
        let lo = 1.0 / (n_neg + 2.0);
        let targets: Vec<f64> = pairs.iter().map(|(_, y)| if *y { hi } else { lo }).collect();

        let objective = |a: f64, b: f64| -> f64 {
            pairs
                .iter()
                .zip(&targets)
                .map(|((f, _), t)| {
                    let z = a * f + b;
                    if z >= 0.0 {
                        t * z + (-z).exp().ln_1p()
                    } else {
                        (t - 1.0) * z + z.exp().ln_1p()
                    }
                })
                .sum()
        };

        let mut a = 0.0_f64;
        let mut b = ((n_neg + 1.0) / (n_pos + 1.0)).ln();
        let mut fval = objective(a, b);

        for _ in 0..Self::MAX_ITER {
            let (mut h11, mut h22, mut h21) = (Self::SIGMA, Self::SIGMA, 0.0_f64);
            let (mut g1, mut g2) = (0.0_f64, 0.0_f64);
            for ((f, _), t) in pairs.iter().zip(&targets) {
                let z = a * f + b;
                let (p, q) = if z >= 0.0 {
                    let e = (-z).exp();
                    (e / (1.0 + e), 1.0 / (1.0 + e))
                } else {
                    let e = z.exp();
                    (1.0 / (1.0 + e), e / (1.0 + e))
                };
                let d2 = p * q;
                h11 += f * f * d2;
                h22 += d2;
                h21 += f * d2;
                let d1 = t - p;
                g1 += f * d1;
                g2 += d1;
            }
            if g1.abs() < Self::EPS && g2.abs() < Self::EPS {
                break;
            }

            let det = h11 * h22 - h21 * h21;
            if det.abs() < f64::MIN_POSITIVE {
                break;
            }
            let da = -(h22 * g1 - h21 * g2) / det;
            let db = -(-h21 * g1 + h11 * g2) / det;
            let gd = g1 * da + g2 * db;

            let mut step = 1.0_f64;
            let mut moved = false;
            while step >= Self::MIN_STEP {
                let (na, nb) = (a + step * da, b + step * db);
                let nf = objective(na, nb);
                if nf < fval + 1e-4 * step * gd {
                    a = na;
                    b = nb;
                    fval = nf;
                    moved = true;
                    break;
                }
                step /= 2.0;
            }
            if !moved {
                break;
            }
        }
        Self { a, b }
    }

    pub fn predict(&self, score: f64) -> f64 {
        let z = self.a * score + self.b;
        if z >= 0.0 {
            let e = (-z).exp();
            e / (1.0 + e)
        } else {
            1.0 / (1.0 + z.exp())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationMethod {
    Isotonic,
    /// Per-class Platt scaling.
    Sigmoid,
    /// Shared logit temperature with a draw bias.
    Temperature,
}

impl fmt::Display for CalibrationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationMethod::Isotonic => f.write_str("isotonic"),
            CalibrationMethod::Sigmoid => f.write_str("sigmoid"),
            CalibrationMethod::Temperature => f.write_str("temperature"),
        }
    }
}

impl FromStr for CalibrationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "isotonic" => Ok(CalibrationMethod::Isotonic),
            "sigmoid" | "platt" => Ok(CalibrationMethod::Sigmoid),
            "temperature" | "logit" => Ok(CalibrationMethod::Temperature),
            other => Err(format!("unknown calibration method {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Calibrator {
    Isotonic(Vec<IsotonicCurve>),
    Sigmoid(Vec<PlattCurve>),
    Temperature { logit_scale: f64, draw_bias: f64 },
}

impl Calibrator {
    pub fn fit(method: CalibrationMethod, predictions: &[Prob3], outcomes: &[Outcome]) -> Self {
        match method {
            CalibrationMethod::Isotonic => {
                let curves = Outcome::ALL
                    .iter()
                    .map(|class| {
                        let x: Vec<f64> = predictions.iter().map(|p| p.get(*class)).collect();
                        let y: Vec<f64> = outcomes
                            .iter()
                            .map(|o| if o == class { 1.0 } else { 0.0 })
                            .collect();
                        IsotonicCurve::fit(&x, &y)
                    })
                    .collect();
                Calibrator::Isotonic(curves)
            }
            CalibrationMethod::Sigmoid => {
                let curves = Outcome::ALL
                    .iter()
                    .map(|class| {
                        let scores: Vec<f64> = predictions.iter().map(|p| p.get(*class)).collect();
                        let positive: Vec<bool> = outcomes.iter().map(|o| o == class).collect();
                        PlattCurve::fit(&scores, &positive)
                    })
                    .collect();
                Calibrator::Sigmoid(curves)
            }
            CalibrationMethod::Temperature => {
                let (logit_scale, draw_bias, _) = fit_logit_calibration(predictions, outcomes);
                Calibrator::Temperature {
                    logit_scale,
                    draw_bias,
                }
            }
        }
    }

    pub fn apply(&self, prob: Prob3) -> Prob3 {
        match self {
            Calibrator::Isotonic(curves) => {
                let mut out = [0.0; NUM_CLASSES];
                for (k, curve) in curves.iter().enumerate().take(NUM_CLASSES) {
                    out[k] = curve.predict(prob.to_array()[k]);
                }
                Prob3::from_array(out).normalized()
            }
            Calibrator::Sigmoid(curves) => {
                let mut out = [0.0; NUM_CLASSES];
                for (k, curve) in curves.iter().enumerate().take(NUM_CLASSES) {
                    out[k] = curve.predict(prob.to_array()[k]);
                }
                Prob3::from_array(out).normalized()
            }
            Calibrator::Temperature {
                logit_scale,
                draw_bias,
            } => apply_logit_calibration(prob, *logit_scale, *draw_bias),
        }
    }
}

/// A prefit classifier with a calibrator fitted on held-out data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibratedModel {
    pub model: GbdtModel,
    pub calibrator: Calibrator,
}

impl CalibratedModel {
    pub fn predict_proba(&self, x: &[f64]) -> Prob3 {
        self.calibrator.apply(self.model.predict_proba(x))
    }

    pub fn predict(&self, x: &[f64]) -> Outcome {
        self.predict_proba(x).argmax()
    }

    pub fn predict_proba_batch(&self, rows: &[Vec<f64>]) -> Vec<Prob3> {
        rows.par_iter().map(|x| self.predict_proba(x)).collect()
    }
}

pub fn calibrate_model(
    model: GbdtModel,
    val: &Dataset,
    method: CalibrationMethod,
) -> Result<CalibratedModel, ModelError> {
    if val.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    model.check_width(val)?;
    let raw = model.predict_proba_batch(&val.features);
    let outcomes = outcomes_from_labels(&val.labels)?;
    let calibrator = Calibrator::fit(method, &raw, &outcomes);
    info!("fitted {method} calibration on {} rows", val.len());
    Ok(CalibratedModel { model, calibrator })
}

pub fn outcomes_from_labels(labels: &[usize]) -> Result<Vec<Outcome>, ModelError> {
    labels
        .iter()
        .map(|y| {
            Outcome::from_index(*y).ok_or_else(|| ModelError::InvalidParam {
                name: "labels",
                reason: format!("class index {y} out of range"),
            })
        })
        .collect()
}

fn one_hot(outcome: Outcome) -> Prob3 {
    let mut p = [0.0; NUM_CLASSES];
    p[outcome.index()] = 1.0;
    Prob3::from_array(p)
}

fn evaluate_calibrated(
    predictions: &[Prob3],
    outcomes: &[Outcome],
    logit_scale: f64,
    draw_bias: f64,
) -> Metrics {
    let calibrated: Vec<Prob3> = predictions
        .iter()
        .copied()
        .map(|p| apply_logit_calibration(p, logit_scale, draw_bias))
        .collect();
    evaluate_probs(&calibrated, outcomes)
}

#[cfg(test)]
mod tests {
    use super::{
        Calibrator, CalibrationMethod, IsotonicCurve, PlattCurve, Prob3, apply_logit_calibration,
        evaluate_probs, fit_logit_calibration,
    };
    use crate::labels::Outcome;

    #[test]
    fn perfect_predictions_have_zero_brier() {
        let preds = vec![
            Prob3::from_array([1.0, 0.0, 0.0]),
            Prob3::from_array([0.0, 1.0, 0.0]),
            Prob3::from_array([0.0, 0.0, 1.0]),
        ];
        let outcomes = vec![Outcome::HomeWin, Outcome::Draw, Outcome::AwayWin];
        let m = evaluate_probs(&preds, &outcomes);
        assert_eq!(m.samples, 3);
        assert!(m.brier < 1e-12);
        assert!((m.accuracy - 1.0).abs() < 1e-12);
    }

    #[test]
    fn logit_calibration_keeps_distribution_normalized() {
        let p = Prob3 {
            home: 0.44,
            draw: 0.27,
            away: 0.29,
        };
        let q = apply_logit_calibration(p, 1.12, 0.08);
        let sum = q.home + q.draw + q.away;
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(q.home >= 0.0 && q.draw >= 0.0 && q.away >= 0.0);
    }

    #[test]
    fn logit_fit_softens_overconfident_predictions() {
        // Always 90% on home, but home only wins half the time.
        let preds = vec![Prob3::from_array([0.9, 0.05, 0.05]); 40];
        let outcomes: Vec<Outcome> = (0..40)
            .map(|i| if i % 2 == 0 { Outcome::HomeWin } else { Outcome::AwayWin })
            .collect();
        let before = evaluate_probs(&preds, &outcomes).log_loss;
        let (scale, _, after) = fit_logit_calibration(&preds, &outcomes);
        assert!(scale < 1.0);
        assert!(after.log_loss < before);
    }

    #[test]
    fn isotonic_pools_violators() {
        let curve = IsotonicCurve::fit(&[0.1, 0.2, 0.3, 0.4], &[0.0, 1.0, 0.0, 1.0]);
        assert_eq!(curve.predict(0.1), 0.0);
        assert_eq!(curve.predict(0.25), 0.5);
        assert_eq!(curve.predict(0.4), 1.0);
        assert_eq!(curve.predict(-1.0), 0.0);
        assert_eq!(curve.predict(2.0), 1.0);
        let xs = [0.0, 0.15, 0.2, 0.3, 0.35, 0.5];
        assert!(xs.windows(2).all(|w| curve.predict(w[0]) <= curve.predict(w[1])));
    }

    #[test]
    fn isotonic_calibrator_output_sums_to_one() {
        let preds: Vec<Prob3> = (0..30)
            .map(|i| {
                let h = 0.2 + (i as f64) * 0.02;
                Prob3::from_array([h, 0.25, 0.75 - h])
            })
            .collect();
        let outcomes: Vec<Outcome> = (0..30)
            .map(|i| if i > 15 { Outcome::HomeWin } else { Outcome::AwayWin })
            .collect();
        let cal = Calibrator::fit(CalibrationMethod::Isotonic, &preds, &outcomes);
        for p in &preds {
            let q = cal.apply(*p);
            assert!((q.home + q.draw + q.away - 1.0).abs() < 1e-9);
        }
        // Draw never happened: its curve is flat zero, so no draw mass remains.
        assert_eq!(cal.apply(preds[0]).draw, 0.0);
    }

    fn drifting_predictions() -> (Vec<Prob3>, Vec<Outcome>) {
        let preds: Vec<Prob3> = (0..60)
            .map(|i| {
                let h = 0.2 + (i % 30) as f64 * 0.015;
                Prob3::from_array([h, 0.3, 0.7 - h])
            })
            .collect();
        let outcomes: Vec<Outcome> = (0..60)
            .map(|i| match i % 30 {
                j if j % 5 == 0 => Outcome::Draw,
                j if j > 12 => Outcome::HomeWin,
                _ => Outcome::AwayWin,
            })
            .collect();
        (preds, outcomes)
    }

    #[test]
    fn platt_curve_is_increasing_for_informative_scores() {
        let scores: Vec<f64> = (0..40).map(|i| i as f64 / 40.0).collect();
        // Mostly positive above 0.5 with some noise on both sides.
        let positive: Vec<bool> = (0..40).map(|i| (i >= 20) ^ (i % 7 == 0)).collect();
        let curve = PlattCurve::fit(&scores, &positive);
        assert!(curve.a < 0.0);
        assert!(scores.windows(2).all(|w| curve.predict(w[0]) <= curve.predict(w[1])));
        assert!(curve.predict(0.0) < 0.5 && curve.predict(1.0) > 0.5);
        assert!((0.0..=1.0).contains(&curve.predict(100.0)));
    }

    #[test]
    fn platt_curve_with_one_class_stays_bounded() {
        let curve = PlattCurve::fit(&[0.2, 0.4, 0.6], &[false, false, false]);
        let p = curve.predict(0.4);
        assert!(p.is_finite() && p > 0.0 && p < 0.5);
        assert_eq!(PlattCurve::fit(&[], &[]), PlattCurve::default());
    }

    #[test]
    fn sigmoid_calibrator_is_monotone_per_class_and_sums_to_one() {
        let (preds, outcomes) = drifting_predictions();
        let cal = Calibrator::fit(CalibrationMethod::Sigmoid, &preds, &outcomes);
        let Calibrator::Sigmoid(ref curves) = cal else {
            panic!("expected per-class curves, got {cal:?}");
        };
        assert_eq!(curves.len(), 3);
        let grid: Vec<f64> = (0..=20).map(|i| i as f64 / 20.0).collect();
        // Home wins follow the home score, so that curve rises.
        assert!(grid.windows(2).all(|w| curves[0].predict(w[0]) <= curves[0].predict(w[1])));
        for curve in curves {
            let up = grid.windows(2).all(|w| curve.predict(w[0]) <= curve.predict(w[1]));
            let down = grid.windows(2).all(|w| curve.predict(w[0]) >= curve.predict(w[1]));
            assert!(up || down);
        }
        for p in &preds {
            let q = cal.apply(*p);
            assert!((q.home + q.draw + q.away - 1.0).abs() < 1e-9);
            assert!(q.home > 0.0 && q.draw > 0.0 && q.away > 0.0);
        }
    }

    #[test]
    fn temperature_calibrator_output_sums_to_one() {
        let (preds, outcomes) = drifting_predictions();
        let cal = Calibrator::fit(CalibrationMethod::Temperature, &preds, &outcomes);
        assert!(matches!(cal, Calibrator::Temperature { .. }));
        for p in &preds {
            let q = cal.apply(*p);
            assert!((q.home + q.draw + q.away - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn method_parses_from_config_strings() {
        assert_eq!("Isotonic".parse::<CalibrationMethod>(), Ok(CalibrationMethod::Isotonic));
        assert_eq!("sigmoid".parse::<CalibrationMethod>(), Ok(CalibrationMethod::Sigmoid));
        assert_eq!("platt".parse::<CalibrationMethod>(), Ok(CalibrationMethod::Sigmoid));
        assert_eq!("logit".parse::<CalibrationMethod>(), Ok(CalibrationMethod::Temperature));
        assert_eq!(CalibrationMethod::Temperature.to_string(), "temperature");
        assert!("beta".parse::<CalibrationMethod>().is_err());
    }
}
