use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::calibration::Prob3;
use crate::error::ModelError;
use crate::feature_table::Dataset;
use crate::labels::{NUM_CLASSES, Outcome};

const MISSING_BIN: u8 = u8::MAX;
const MIN_HESSIAN: f64 = 1e-16;
const MIN_SPLIT_GAIN: f64 = 1e-12;
const PROB_FLOOR: f64 = 1e-15;

/// Gradient boosting parameters. Defaults follow the tuned baseline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GbdtParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub min_child_weight: f64,
    pub gamma: f64,
    pub lambda: f64,
    pub max_bins: usize,
    pub early_stopping_rounds: Option<usize>,
    pub seed: u64,
}

impl Default for GbdtParams {
    fn default() -> Self {
        Self {
            n_estimators: 400,
            max_depth: 8,
            learning_rate: 0.05,
            subsample: 0.9,
            colsample_bytree: 0.9,
            min_child_weight: 1.0,
            gamma: 0.0,
            lambda: 1.0,
            max_bins: 64,
            early_stopping_rounds: None,
            seed: 42,
        }
    }
}

impl GbdtParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        let invalid = |name: &'static str, reason: String| Err(ModelError::InvalidParam { name, reason });
        if self.n_estimators == 0 {
            return invalid("n_estimators", "must be at least 1".to_string());
        }
        if self.max_depth == 0 {
            return invalid("max_depth", "must be at least 1".to_string());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return invalid("learning_rate", format!("{} not in (0, 1]", self.learning_rate));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return invalid("subsample", format!("{} not in (0, 1]", self.subsample));
        }
        if !(self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0) {
            return invalid(
                "colsample_bytree",
                format!("{} not in (0, 1]", self.colsample_bytree),
            );
        }
        if !(self.min_child_weight >= 0.0) {
            return invalid("min_child_weight", "must be non-negative".to_string());
        }
        if !(self.gamma >= 0.0) {
            return invalid("gamma", "must be non-negative".to_string());
        }
        if !(self.lambda >= 0.0) {
            return invalid("lambda", "must be non-negative".to_string());
        }
        if !(2..=254).contains(&self.max_bins) {
            return invalid("max_bins", format!("{} not in 2..=254", self.max_bins));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        default_left: bool,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    default_left,
                    left,
                    right,
                }) => {
                    let v = x.get(*feature).copied().unwrap_or(f64::NAN);
                    let go_left = if v.is_nan() {
                        *default_left
                    } else {
                        v <= *threshold
                    };
                    idx = if go_left { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }
}

/// Column-major quantised copy of the training features.
struct BinnedMatrix {
    n_rows: usize,
    bins: Vec<u8>,
    cuts: Vec<Vec<f64>>,
}

impl BinnedMatrix {
    fn build(rows: &[Vec<f64>], n_features: usize, max_bins: usize) -> Self {
        let n_rows = rows.len();
        let columns: Vec<(Vec<f64>, Vec<u8>)> = (0..n_features)
            .into_par_iter()
            .map(|f| {
                let column: Vec<f64> = rows.iter().map(|r| r[f]).collect();
                let cuts = compute_cuts(&column, max_bins);
                let bins = column.iter().map(|v| bin_value(&cuts, *v)).collect();
                (cuts, bins)
            })
            .collect();

        let mut bins = Vec::with_capacity(n_rows * n_features);
        let mut cuts = Vec::with_capacity(n_features);
        for (c, b) in columns {
            cuts.push(c);
            bins.extend(b);
        }
        Self { n_rows, bins, cuts }
    }

    fn bin(&self, feature: usize, row: usize) -> u8 {
        self.bins[feature * self.n_rows + row]
    }
}

fn compute_cuts(column: &[f64], max_bins: usize) -> Vec<f64> {
    let mut sorted: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);
    let mut unique = sorted.clone();
    unique.dedup();
    if unique.len() <= 1 {
        return Vec::new();
    }
    if unique.len() <= max_bins {
        unique.pop();
        return unique;
    }
    let n = sorted.len();
    let mut cuts: Vec<f64> = (1..max_bins).map(|i| sorted[(i * n) / max_bins]).collect();
    cuts.dedup();
    if let Some(max) = unique.last()
        && cuts.last() == Some(max)
    {
        cuts.pop();
    }
    cuts
}

fn bin_value(cuts: &[f64], v: f64) -> u8 {
    if v.is_nan() {
        return MISSING_BIN;
    }
    // Values equal to a cut fall into that cut's bin, so `bin <= b` <=> `v <= cuts[b]`.
    cuts.partition_point(|c| *c < v) as u8
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    bin: u8,
    threshold: f64,
    default_left: bool,
    gain: f64,
}

struct GradPair<'a> {
    grad: &'a [f64],
    hess: &'a [f64],
}

fn leaf_weight(g: f64, h: f64, params: &GbdtParams) -> f64 {
    -g / (h + params.lambda) * params.learning_rate
}

fn score(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda)
}

fn best_split_for_feature(
    data: &BinnedMatrix,
    gp: &GradPair<'_>,
    rows: &[usize],
    feature: usize,
    totals: (f64, f64),
    params: &GbdtParams,
) -> Option<SplitCandidate> {
    let cuts = &data.cuts[feature];
    if cuts.is_empty() {
        return None;
    }
    let n_bins = cuts.len() + 1;
    let mut hist_g = vec![0.0_f64; n_bins];
    let mut hist_h = vec![0.0_f64; n_bins];
    let mut hist_n = vec![0usize; n_bins];
    let (mut miss_g, mut miss_h, mut miss_n) = (0.0_f64, 0.0_f64, 0usize);
    for &row in rows {
        let b = data.bin(feature, row);
        if b == MISSING_BIN {
            miss_g += gp.grad[row];
            miss_h += gp.hess[row];
            miss_n += 1;
        } else {
            let b = b as usize;
            hist_g[b] += gp.grad[row];
            hist_h[b] += gp.hess[row];
            hist_n[b] += 1;
        }
    }

    let (g_total, h_total) = totals;
    let parent = score(g_total, h_total, params.lambda);
    let n_total = rows.len();
    let mut best: Option<SplitCandidate> = None;
    let (mut gl, mut hl, mut nl) = (0.0_f64, 0.0_f64, 0usize);

    for b in 0..n_bins - 1 {
        gl += hist_g[b];
        hl += hist_h[b];
        nl += hist_n[b];
        let directions: &[bool] = if miss_n > 0 { &[false, true] } else { &[false] };
        for &missing_left in directions {
            let (g_left, h_left, n_left) = if missing_left {
                (gl + miss_g, hl + miss_h, nl + miss_n)
            } else {
                (gl, hl, nl)
            };
            let (g_right, h_right) = (g_total - g_left, h_total - h_left);
            let n_right = n_total - n_left;
            if n_left == 0 || n_right == 0 {
                continue;
            }
            if h_left < params.min_child_weight || h_right < params.min_child_weight {
                continue;
            }
            let gain = 0.5
                * (score(g_left, h_left, params.lambda) + score(g_right, h_right, params.lambda)
                    - parent)
                - params.gamma;
            if gain <= MIN_SPLIT_GAIN {
                continue;
            }
            let default_left = if miss_n > 0 { missing_left } else { h_left >= h_right };
            if best.is_none_or(|cur| gain > cur.gain) {
                best = Some(SplitCandidate {
                    feature,
                    bin: b as u8,
                    threshold: cuts[b],
                    default_left,
                    gain,
                });
            }
        }
    }
    best
}

struct TreeBuilder<'a> {
    data: &'a BinnedMatrix,
    gp: GradPair<'a>,
    features: &'a [usize],
    params: &'a GbdtParams,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    fn build(mut self, rows: Vec<usize>) -> Tree {
        self.grow(rows, 0);
        Tree { nodes: self.nodes }
    }

    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let g: f64 = rows.iter().map(|&r| self.gp.grad[r]).sum();
        let h: f64 = rows.iter().map(|&r| self.gp.hess[r]).sum();
        let node_idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: leaf_weight(g, h, self.params),
        });
        if depth >= self.params.max_depth || rows.len() < 2 {
            return node_idx;
        }

        let best = self
            .features
            .par_iter()
            .filter_map(|&f| best_split_for_feature(self.data, &self.gp, &rows, f, (g, h), self.params))
            .reduce_with(|a, b| {
                if b.gain > a.gain || (b.gain == a.gain && b.feature < a.feature) {
                    b
                } else {
                    a
                }
            });
        let Some(split) = best else {
            return node_idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows.into_iter().partition(|&r| {
            let b = self.data.bin(split.feature, r);
            if b == MISSING_BIN {
                split.default_left
            } else {
                b <= split.bin
            }
        });
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            default_left: split.default_left,
            left,
            right,
        };
        node_idx
    }
}

/// Multi-class gradient boosted trees with a softmax objective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbdtModel {
    pub params: GbdtParams,
    n_features: usize,
    base_margin: [f64; NUM_CLASSES],
    trees: Vec<[Tree; NUM_CLASSES]>,
    /// Per-round `mlogloss` on the eval set, if one was given.
    pub eval_history: Vec<f64>,
}

impl GbdtModel {
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_rounds(&self) -> usize {
        self.trees.len()
    }

    pub fn predict_margin(&self, x: &[f64]) -> [f64; NUM_CLASSES] {
        let mut margin = self.base_margin;
        for round in &self.trees {
            for (k, tree) in round.iter().enumerate() {
                margin[k] += tree.predict(x);
            }
        }
        margin
    }

    pub fn predict_proba(&self, x: &[f64]) -> Prob3 {
        Prob3::from_array(softmax(self.predict_margin(x)))
    }

    pub fn predict(&self, x: &[f64]) -> Outcome {
        self.predict_proba(x).argmax()
    }

    pub fn predict_proba_batch(&self, rows: &[Vec<f64>]) -> Vec<Prob3> {
        rows.par_iter().map(|x| self.predict_proba(x)).collect()
    }

    pub fn check_width(&self, data: &Dataset) -> Result<(), ModelError> {
        check_rows(&data.features, self.n_features)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create model dir {}", parent.display()))?;
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string(self).context("serialize model")?;
        fs::write(&tmp, json).with_context(|| format!("write model {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("swap model {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("read model {}", path.display()))?;
        serde_json::from_str(&raw).context("invalid model json")
    }
}

pub fn softmax(margin: [f64; NUM_CLASSES]) -> [f64; NUM_CLASSES] {
    let mx = margin.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut out = [0.0; NUM_CLASSES];
    let mut den = 0.0;
    for (o, m) in out.iter_mut().zip(margin) {
        *o = (m - mx).exp();
        den += *o;
    }
    for o in &mut out {
        *o /= den;
    }
    out
}

fn check_rows(rows: &[Vec<f64>], width: usize) -> Result<(), ModelError> {
    match rows.iter().find(|r| r.len() != width) {
        Some(r) => Err(ModelError::FeatureWidth {
            expected: width,
            actual: r.len(),
        }),
        None => Ok(()),
    }
}

fn validate_dataset(data: &Dataset, width: usize) -> Result<(), ModelError> {
    if data.features.len() != data.labels.len() {
        return Err(ModelError::LabelCount {
            rows: data.features.len(),
            labels: data.labels.len(),
        });
    }
    if let Some(bad) = data.labels.iter().find(|y| **y >= NUM_CLASSES) {
        return Err(ModelError::InvalidParam {
            name: "labels",
            reason: format!("class index {bad} out of range"),
        });
    }
    check_rows(&data.features, width)
}

fn mlogloss(margins: &[[f64; NUM_CLASSES]], labels: &[usize]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let sum: f64 = margins
        .iter()
        .zip(labels)
        .map(|(m, y)| -softmax(*m)[*y].clamp(PROB_FLOOR, 1.0).ln())
        .sum();
    sum / labels.len() as f64
}

/// Fits the model on `train`. When `eval` is given it is scored every round and
/// drives early stopping if `params.early_stopping_rounds` is set.
pub fn train(
    train: &Dataset,
    eval: Option<&Dataset>,
    params: &GbdtParams,
) -> Result<GbdtModel, ModelError> {
    params.validate()?;
    if train.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    let n_features = train.features[0].len();
    validate_dataset(train, n_features)?;
    if let Some(eval) = eval {
        validate_dataset(eval, n_features)?;
    }

    let n = train.len();
    let mut counts = [0usize; NUM_CLASSES];
    for y in &train.labels {
        counts[*y] += 1;
    }
    let mut base_margin = [0.0; NUM_CLASSES];
    for (k, c) in counts.iter().enumerate() {
        base_margin[k] = (*c as f64 / n as f64).max(1e-6).ln();
    }

    let data = BinnedMatrix::build(&train.features, n_features, params.max_bins);
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut margins = vec![base_margin; n];
    let mut eval_margins = eval.map(|e| vec![base_margin; e.len()]);
    let mut trees: Vec<[Tree; NUM_CLASSES]> = Vec::with_capacity(params.n_estimators);
    let mut eval_history = Vec::new();
    let mut best_round = 0usize;
    let mut best_loss = f64::INFINITY;

    let n_cols = ((n_features as f64) * params.colsample_bytree).ceil() as usize;
    let n_cols = n_cols.clamp(1, n_features.max(1));

    for round in 0..params.n_estimators {
        let probs: Vec<[f64; NUM_CLASSES]> = margins.par_iter().map(|m| softmax(*m)).collect();

        let mut rows: Vec<usize> = if params.subsample < 1.0 {
            (0..n).filter(|_| rng.r#gen::<f64>() < params.subsample).collect()
        } else {
            (0..n).collect()
        };
        if rows.is_empty() {
            rows = (0..n).collect();
        }
        let mut features: Vec<usize> = if n_cols < n_features {
            sample(&mut rng, n_features, n_cols).into_vec()
        } else {
            (0..n_features).collect()
        };
        features.sort_unstable();

        let round_trees: [Tree; NUM_CLASSES] = std::array::from_fn(|k| {
            let (grad, hess): (Vec<f64>, Vec<f64>) = probs
                .iter()
                .zip(&train.labels)
                .map(|(p, y)| {
                    let target = if *y == k { 1.0 } else { 0.0 };
                    (p[k] - target, (2.0 * p[k] * (1.0 - p[k])).max(MIN_HESSIAN))
                })
                .unzip();
            TreeBuilder {
                data: &data,
                gp: GradPair {
                    grad: &grad,
                    hess: &hess,
                },
                features: &features,
                params,
                nodes: Vec::new(),
            }
            .build(rows.clone())
        });

        margins.par_iter_mut().zip(&train.features).for_each(|(m, x)| {
            for (k, tree) in round_trees.iter().enumerate() {
                m[k] += tree.predict(x);
            }
        });

        if let (Some(eval), Some(em)) = (eval, eval_margins.as_mut()) {
            em.par_iter_mut().zip(&eval.features).for_each(|(m, x)| {
                for (k, tree) in round_trees.iter().enumerate() {
                    m[k] += tree.predict(x);
                }
            });
            let loss = mlogloss(em, &eval.labels);
            eval_history.push(loss);
            debug!("round {round}: eval mlogloss={loss:.5}");
            if loss < best_loss {
                best_loss = loss;
                best_round = round;
            }
        }
        trees.push(round_trees);

        if let Some(patience) = params.early_stopping_rounds
            && eval.is_some()
            && round - best_round >= patience
        {
            info!("early stopping at round {round}; best round {best_round} mlogloss={best_loss:.5}");
            trees.truncate(best_round + 1);
            eval_history.truncate(best_round + 1);
            break;
        }
    }

    info!(
        "trained {} rounds on {n} rows x {n_features} features (train mlogloss={:.5})",
        trees.len(),
        mlogloss(&margins, &train.labels)
    );

    Ok(GbdtModel {
        params: *params,
        n_features,
        base_margin,
        trees,
        eval_history,
    })
}
