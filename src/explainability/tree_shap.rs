//! Exact path-dependent TreeSHAP over boosted trees
//!
//! Attributions are expressed in margin (log-odds) space, so that
//! `base_value + Σ phi == predict_margin(x)` for every row.

use crate::error::{Result, RiskError};
use crate::training::{XGBNode, XGBoostClassifier};
use ndarray::{Array1, ArrayView1};

/// One feature on the current root-to-node path
#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    /// Fraction of cover flowing down this path when the feature is unknown
    zero_fraction: f64,
    /// 1 if the row follows this path when the feature is known, else 0
    one_fraction: f64,
    pweight: f64,
}

/// Grow the subset-weight table by one feature.
fn extend_path(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let denom = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / denom;
        path[i].pweight = zero_fraction * path[i].pweight * (depth - i) as f64 / denom;
    }
}

/// Undo the extension made for the element at `index`.
fn unwind_path(path: &mut Vec<PathElement>, index: usize) {
    let Some(last) = path.len().checked_sub(1) else {
        return;
    };
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let denom = (last + 1) as f64;
    let mut next_one = path[last].pweight;

    for j in (0..last).rev() {
        if one_fraction != 0.0 {
            let tmp = path[j].pweight;
            path[j].pweight = next_one * denom / ((j + 1) as f64 * one_fraction);
            next_one = tmp - path[j].pweight * zero_fraction * (last - j) as f64 / denom;
        } else {
            path[j].pweight = path[j].pweight * denom / (zero_fraction * (last - j) as f64);
        }
    }

    for j in index..last {
        path[j].feature = path[j + 1].feature;
        path[j].zero_fraction = path[j + 1].zero_fraction;
        path[j].one_fraction = path[j + 1].one_fraction;
    }
    path.truncate(last);
}

/// Total permutation weight of the path with `index` removed
fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let mut unwound = path.to_vec();
    unwind_path(&mut unwound, index);
    unwound.iter().map(|e| e.pweight).sum()
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    node: &XGBNode,
    x: &ArrayView1<f64>,
    phi: &mut [f64],
    mut path: Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
    scale: f64,
) {
    extend_path(&mut path, zero_fraction, one_fraction, feature);

    match node {
        XGBNode::Leaf { weight, .. } => {
            let value = scale * weight;
            for i in 1..path.len() {
                let element = path[i];
                if let Some(f) = element.feature {
                    let w = unwound_path_sum(&path, i);
                    phi[f] += w * (element.one_fraction - element.zero_fraction) * value;
                }
            }
        }
        XGBNode::Split { feature: split_feature, threshold, cover, left, right } => {
            let (hot, cold) = if x[*split_feature] <= *threshold {
                (left.as_ref(), right.as_ref())
            } else {
                (right.as_ref(), left.as_ref())
            };

            let (hot_zero, cold_zero) = if *cover > 0.0 {
                (hot.cover() / cover, cold.cover() / cover)
            } else {
                (0.5, 0.5)
            };

            let mut incoming_zero = 1.0;
            let mut incoming_one = 1.0;
            if let Some(k) = path.iter().position(|e| e.feature == Some(*split_feature)) {
                incoming_zero = path[k].zero_fraction;
                incoming_one = path[k].one_fraction;
                unwind_path(&mut path, k);
            }

            recurse(
                hot,
                x,
                phi,
                path.clone(),
                hot_zero * incoming_zero,
                incoming_one,
                Some(*split_feature),
                scale,
            );
            recurse(
                cold,
                x,
                phi,
                path,
                cold_zero * incoming_zero,
                0.0,
                Some(*split_feature),
                scale,
            );
        }
    }
}

/// Add one tree's attributions for `x`, scaled by `scale`, into `phi`.
pub fn tree_shap(tree: &XGBNode, x: &ArrayView1<f64>, scale: f64, phi: &mut [f64]) {
    recurse(tree, x, phi, Vec::with_capacity(tree.depth() + 2), 1.0, 1.0, None, scale);
}

/// Base value and per-feature attributions of a boosted ensemble for one row.
pub fn ensemble_shap(model: &XGBoostClassifier, x: &ArrayView1<f64>) -> Result<(f64, Array1<f64>)> {
    if model.trees().is_empty() {
        return Err(RiskError::ModelNotFitted);
    }
    if x.len() != model.n_features() {
        return Err(RiskError::ShapeError {
            expected: format!("{} features", model.n_features()),
            actual: format!("{} features", x.len()),
        });
    }

    let lr = model.learning_rate();
    let mut phi = vec![0.0; x.len()];
    let mut base_value = model.base_score();
    for tree in model.trees() {
        base_value += lr * tree.expected_value();
        tree_shap(tree, x, lr, &mut phi);
    }

    Ok((base_value, Array1::from_vec(phi)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::XGBoostConfig;
    use ndarray::{array, Array2};
    use rand::prelude::*;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn leaf(weight: f64, cover: f64) -> Box<XGBNode> {
        Box::new(XGBNode::Leaf { weight, cover })
    }

    #[test]
    fn test_single_split() {
        let tree = XGBNode::Split {
            feature: 0,
            threshold: 0.5,
            cover: 10.0,
            left: leaf(-1.0, 4.0),
            right: leaf(2.0, 6.0),
        };
        let mut phi = vec![0.0; 2];
        tree_shap(&tree, &array![1.0, 0.0].view(), 1.0, &mut phi);

        // f(x) = 2, E[f] = 0.8
        assert!((phi[0] - 1.2).abs() < 1e-12);
        assert_eq!(phi[1], 0.0);
    }

    #[test]
    fn test_and_game_is_symmetric() {
        let tree = XGBNode::Split {
            feature: 0,
            threshold: 0.5,
            cover: 4.0,
            left: leaf(0.0, 2.0),
            right: Box::new(XGBNode::Split {
                feature: 1,
                threshold: 0.5,
                cover: 2.0,
                left: leaf(0.0, 1.0),
                right: leaf(1.0, 1.0),
            }),
        };
        let mut phi = vec![0.0; 2];
        tree_shap(&tree, &array![1.0, 1.0].view(), 1.0, &mut phi);

        assert!((phi[0] - 0.375).abs() < 1e-12);
        assert!((phi[1] - 0.375).abs() < 1e-12);
    }

    #[test]
    fn test_repeated_feature_on_path() {
        let tree = XGBNode::Split {
            feature: 0,
            threshold: 0.5,
            cover: 8.0,
            left: leaf(-1.0, 4.0),
            right: Box::new(XGBNode::Split {
                feature: 0,
                threshold: 1.5,
                cover: 4.0,
                left: leaf(1.0, 2.0),
                right: leaf(3.0, 2.0),
            }),
        };
        let x = array![2.0];
        let mut phi = vec![0.0; 1];
        tree_shap(&tree, &x.view(), 1.0, &mut phi);

        // one feature owns the whole gap between f(x) = 3 and E[f] = 0.5
        assert!((phi[0] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_additivity_on_fitted_ensemble() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let n = 200;
        let x = Array2::from_shape_fn((n, 5), |_| rng.gen_range(-2.0..2.0));
        let y = Array1::from_iter((0..n).map(|i| {
            let row = x.row(i);
            if row[0] + 0.5 * row[1] * row[2] > 0.0 { 1.0 } else { 0.0 }
        }));

        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 20,
            max_depth: 4,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let margins = model.predict_margin(&x).unwrap();

        for i in 0..n {
            let (base, phi) = ensemble_shap(&model, &x.row(i)).unwrap();
            assert!((base + phi.sum() - margins[i]).abs() < 1e-6, "row {}", i);
        }
    }

    #[test]
    fn test_rejects_wrong_width_and_unfitted() {
        let model = XGBoostClassifier::new(XGBoostConfig::default());
        assert!(matches!(
            ensemble_shap(&model, &array![1.0].view()),
            Err(RiskError::ModelNotFitted)
        ));
    }
}
