//! XGBoost-style gradient boosting with second-order approximation
//!
//! Key points:
//! - Uses both gradient (first derivative) and hessian (second derivative) of the log-loss
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Gain-based split scoring: Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)] - γ
//! - Every node records its cover (hessian sum), which path-dependent
//!   attribution needs to weight unseen branches

use crate::error::{Result, RiskError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: Option<u64>,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

/// A single node in a boosted tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum XGBNode {
    Leaf {
        weight: f64,
        cover: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        cover: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    /// Leaf weight reached by `sample` (samples equal to the threshold go left)
    pub fn predict(&self, sample: &ArrayView1<f64>) -> f64 {
        match self {
            XGBNode::Leaf { weight, .. } => *weight,
            XGBNode::Split { feature, threshold, left, right, .. } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    /// Sum of hessians of the training rows that reached this node
    pub fn cover(&self) -> f64 {
        match self {
            XGBNode::Leaf { cover, .. } | XGBNode::Split { cover, .. } => *cover,
        }
    }

    /// Cover-weighted mean leaf weight
    pub fn expected_value(&self) -> f64 {
        match self {
            XGBNode::Leaf { weight, .. } => *weight,
            XGBNode::Split { cover, left, right, .. } => {
                if *cover <= 0.0 {
                    return 0.0;
                }
                (left.cover() * left.expected_value() + right.cover() * right.expected_value()) / cover
            }
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            XGBNode::Leaf { .. } => 0,
            XGBNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Build a tree using exact greedy split finding
fn build_xgb_tree(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &XGBoostConfig,
) -> XGBNode {
    let n = indices.len();

    let g_sum: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| hess[i]).sum();

    let leaf = XGBNode::Leaf {
        weight: compute_leaf_weight(g_sum, h_sum, config.reg_lambda, config.reg_alpha),
        cover: h_sum,
    };

    if depth >= config.max_depth || n < 2 || h_sum < config.min_child_weight {
        return leaf;
    }

    // Find best split across features (parallelized)
    let best_split = feature_indices
        .par_iter()
        .filter_map(|&f| find_best_split_for_feature(x, grad, hess, indices, f, config))
        .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

    match best_split {
        Some((feature, threshold, gain)) if gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return leaf;
            }

            let left = build_xgb_tree(x, grad, hess, &left_idx, feature_indices, depth + 1, config);
            let right = build_xgb_tree(x, grad, hess, &right_idx, feature_indices, depth + 1, config);

            XGBNode::Split {
                feature,
                threshold,
                cover: h_sum,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => leaf,
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    if alpha > 0.0 {
        // Soft-threshold for L1
        let g_adj = if g_sum > alpha {
            g_sum - alpha
        } else if g_sum < -alpha {
            g_sum + alpha
        } else {
            return 0.0;
        };
        -g_adj / (h_sum + lambda)
    } else {
        -g_sum / (h_sum + lambda)
    }
}

/// Best (feature, threshold, gain) for one feature, sweeping sorted values
fn find_best_split_for_feature(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature: usize,
    config: &XGBoostConfig,
) -> Option<(usize, f64, f64)> {
    let mut sorted_indices: Vec<usize> = indices.to_vec();
    sorted_indices.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

    let g_total: f64 = sorted_indices.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = sorted_indices.iter().map(|&i| hess[i]).sum();

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best_gain = f64::NEG_INFINITY;
    let mut best_threshold = 0.0;

    let lambda = config.reg_lambda;

    // The last position never yields a split: the right side would be empty
    for pos in 0..sorted_indices.len().saturating_sub(1) {
        let idx = sorted_indices[pos];
        let next_idx = sorted_indices[pos + 1];
        g_left += grad[idx];
        h_left += hess[idx];

        // Skip if next sample has same feature value (avoid identical split)
        if (x[[idx, feature]] - x[[next_idx, feature]]).abs() < 1e-12 {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;

        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda)
                - (g_total * g_total) / (h_total + lambda));

        if gain > best_gain {
            best_gain = gain;
            best_threshold = (x[[idx, feature]] + x[[next_idx, feature]]) / 2.0;
        }
    }

    if best_gain > f64::NEG_INFINITY {
        Some((feature, best_threshold, best_gain))
    } else {
        None
    }
}

/// Boosted-tree classifier (logistic loss with second-order approximation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    config: XGBoostConfig,
    trees: Vec<XGBNode>,
    base_score: f64,
    n_features: usize,
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
        }
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() {
            return Err(RiskError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(RiskError::TrainingError("no training samples".to_string()));
        }
        self.n_features = n_features;

        // Base score in log-odds space
        let p = y.mean().unwrap_or(0.5).clamp(1e-7, 1.0 - 1e-7);
        self.base_score = (p / (1.0 - p)).ln();
        let mut raw_preds = Array1::from_elem(n_samples, self.base_score);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();

        for _ in 0..self.config.n_estimators {
            // Logistic loss: grad = p - y, hess = p * (1 - p)
            let probs: Array1<f64> = raw_preds.mapv(Self::sigmoid);
            let grad: Array1<f64> = &probs - y;
            let hess: Array1<f64> = probs.mapv(|p| (p * (1.0 - p)).max(1e-7));

            let row_indices = subsample(&mut rng, n_samples, self.config.subsample);
            let col_indices = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let tree = build_xgb_tree(x, &grad, &hess, &row_indices, &col_indices, 0, &self.config);

            for i in 0..n_samples {
                raw_preds[i] += self.config.learning_rate * tree.predict(&x.row(i));
            }

            self.trees.push(tree);
        }

        Ok(())
    }

    /// Raw log-odds for every row
    pub fn predict_margin(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(RiskError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(RiskError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let raw: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let sample = x.row(i);
                self.base_score
                    + self
                        .trees
                        .iter()
                        .map(|tree| self.config.learning_rate * tree.predict(&sample))
                        .sum::<f64>()
            })
            .collect();
        Ok(Array1::from_vec(raw))
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_margin(x)?.mapv(Self::sigmoid))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probs = self.predict_proba(x)?;
        Ok(probs.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let preds = self.predict(x)?;
        let correct = preds
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| (*p - *a).abs() < 0.5)
            .count();
        Ok(correct as f64 / y.len() as f64)
    }

    pub fn trees(&self) -> &[XGBNode] {
        &self.trees
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn learning_rate(&self) -> f64 {
        self.config.learning_rate
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn config(&self) -> &XGBoostConfig {
        &self.config
    }
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = ((n as f64) * ratio).ceil() as usize;
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort();
    indices
}
