//! Decision Trees
//!
//! Shared CART machinery for the two supervised tree ensembles:
//! - gini-impurity classification trees (random forest), leaves hold the
//!   anomaly-class fraction;
//! - gradient/hessian regression trees (gradient boosting), leaves hold the
//!   Newton step Σg / (Σh + λ).
//!
//! Trees are plain serializable node graphs; growing is deterministic for a
//! given RNG state.

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

// ============================================================================
// NODE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    /// Route a row to its leaf value. `<= threshold` goes left.
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        match self {
            TreeNode::Leaf { value } => *value,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.predict_row(row)
                } else {
                    right.predict_row(row)
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

// ============================================================================
// CLASSIFICATION (GINI)
// ============================================================================

pub struct ClassificationParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Features considered per split; None = all (forest passes √d).
    pub max_features: Option<usize>,
}

/// Grow a binary classification tree over the given row indices.
/// `y[i] == 1.0` is the anomaly class; leaves store its fraction.
pub fn grow_classification_tree(
    x: &Array2<f64>,
    y: &[f64],
    indices: &[usize],
    params: &ClassificationParams,
    rng: &mut StdRng,
) -> TreeNode {
    grow_gini(x, y, indices, 0, params, rng)
}

fn grow_gini(
    x: &Array2<f64>,
    y: &[f64],
    indices: &[usize],
    depth: usize,
    params: &ClassificationParams,
    rng: &mut StdRng,
) -> TreeNode {
    let n = indices.len();
    let positives = indices.iter().filter(|&&i| y[i] >= 0.5).count();
    let fraction = if n == 0 {
        0.0
    } else {
        positives as f64 / n as f64
    };

    if depth >= params.max_depth
        || n < params.min_samples_split
        || positives == 0
        || positives == n
    {
        return TreeNode::Leaf { value: fraction };
    }

    let candidates = candidate_features(x.ncols(), params.max_features, rng);
    let best = candidates
        .iter()
        .filter_map(|&f| best_gini_split(x, y, indices, f))
        .min_by(|a, b| a.impurity.total_cmp(&b.impurity));

    let split = match best {
        Some(s) => s,
        None => return TreeNode::Leaf { value: fraction },
    };

    let (left_idx, right_idx) = partition(x, indices, split.feature, split.threshold);
    if left_idx.is_empty() || right_idx.is_empty() {
        return TreeNode::Leaf { value: fraction };
    }

    TreeNode::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: Box::new(grow_gini(x, y, &left_idx, depth + 1, params, rng)),
        right: Box::new(grow_gini(x, y, &right_idx, depth + 1, params, rng)),
    }
}

struct GiniSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

fn best_gini_split(
    x: &Array2<f64>,
    y: &[f64],
    indices: &[usize],
    feature: usize,
) -> Option<GiniSplit> {
    let mut pairs: Vec<(f64, f64)> = indices
        .iter()
        .map(|&i| (x[[i, feature]], y[i]))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let n = pairs.len() as f64;
    let total_pos: f64 = pairs.iter().map(|p| p.1).sum();

    let mut best: Option<GiniSplit> = None;
    let mut left_n = 0.0;
    let mut left_pos = 0.0;

    for w in 0..pairs.len() - 1 {
        left_n += 1.0;
        left_pos += pairs[w].1;

        // Can't split between identical values.
        if pairs[w].0 == pairs[w + 1].0 {
            continue;
        }

        let right_n = n - left_n;
        let right_pos = total_pos - left_pos;
        let impurity =
            (left_n * gini(left_pos, left_n) + right_n * gini(right_pos, right_n)) / n;

        if best.as_ref().map_or(true, |b| impurity < b.impurity) {
            best = Some(GiniSplit {
                feature,
                threshold: (pairs[w].0 + pairs[w + 1].0) / 2.0,
                impurity,
            });
        }
    }
    best
}

fn gini(pos: f64, n: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    let p = pos / n;
    1.0 - p * p - (1.0 - p) * (1.0 - p)
}

// ============================================================================
// REGRESSION (GRADIENT / HESSIAN)
// ============================================================================

pub struct RegressionParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// L2 regularization on leaf weights.
    pub lambda: f64,
}

/// Grow a regression tree on gradients/hessians (one boosting round).
pub fn grow_regression_tree(
    x: &Array2<f64>,
    grad: &[f64],
    hess: &[f64],
    indices: &[usize],
    params: &RegressionParams,
) -> TreeNode {
    grow_newton(x, grad, hess, indices, 0, params)
}

fn leaf_weight(grad_sum: f64, hess_sum: f64, lambda: f64) -> f64 {
    grad_sum / (hess_sum + lambda)
}

fn grow_newton(
    x: &Array2<f64>,
    grad: &[f64],
    hess: &[f64],
    indices: &[usize],
    depth: usize,
    params: &RegressionParams,
) -> TreeNode {
    let grad_sum: f64 = indices.iter().map(|&i| grad[i]).sum();
    let hess_sum: f64 = indices.iter().map(|&i| hess[i]).sum();
    let leaf = TreeNode::Leaf {
        value: leaf_weight(grad_sum, hess_sum, params.lambda),
    };

    if depth >= params.max_depth || indices.len() < params.min_samples_split {
        return leaf;
    }

    let parent_score = grad_sum * grad_sum / (hess_sum + params.lambda);
    let mut best: Option<(usize, f64, f64)> = None; // (feature, threshold, gain)

    for feature in 0..x.ncols() {
        let mut rows: Vec<(f64, f64, f64)> = indices
            .iter()
            .map(|&i| (x[[i, feature]], grad[i], hess[i]))
            .collect();
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut gl = 0.0;
        let mut hl = 0.0;
        for w in 0..rows.len() - 1 {
            gl += rows[w].1;
            hl += rows[w].2;
            if rows[w].0 == rows[w + 1].0 {
                continue;
            }
            let gr = grad_sum - gl;
            let hr = hess_sum - hl;
            let gain = gl * gl / (hl + params.lambda) + gr * gr / (hr + params.lambda)
                - parent_score;
            if gain > 1e-12 && best.map_or(true, |b| gain > b.2) {
                best = Some((feature, (rows[w].0 + rows[w + 1].0) / 2.0, gain));
            }
        }
    }

    let (feature, threshold, _) = match best {
        Some(b) => b,
        None => return leaf,
    };

    let (left_idx, right_idx) = partition(x, indices, feature, threshold);
    if left_idx.is_empty() || right_idx.is_empty() {
        return leaf;
    }

    TreeNode::Split {
        feature,
        threshold,
        left: Box::new(grow_newton(x, grad, hess, &left_idx, depth + 1, params)),
        right: Box::new(grow_newton(x, grad, hess, &right_idx, depth + 1, params)),
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn partition(
    x: &Array2<f64>,
    indices: &[usize],
    feature: usize,
    threshold: f64,
) -> (Vec<usize>, Vec<usize>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for &i in indices {
        if x[[i, feature]] <= threshold {
            left.push(i);
        } else {
            right.push(i);
        }
    }
    (left, right)
}

fn candidate_features(d: usize, max_features: Option<usize>, rng: &mut StdRng) -> Vec<usize> {
    let mut all: Vec<usize> = (0..d).collect();
    match max_features {
        Some(k) if k < d => {
            all.shuffle(rng);
            all.truncate(k);
            all.sort_unstable();
            all
        }
        _ => all,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn toy() -> (Array2<f64>, Vec<f64>) {
        // Perfectly separable on feature 0 at 0.5.
        let x = array![[0.0, 9.0], [0.1, 3.0], [0.2, 7.0], [0.9, 1.0], [1.0, 5.0]];
        let y = vec![0.0, 0.0, 0.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_classification_tree_separates() {
        let (x, y) = toy();
        let indices: Vec<usize> = (0..x.nrows()).collect();
        let params = ClassificationParams {
            max_depth: 3,
            min_samples_split: 2,
            max_features: None,
        };
        let mut rng = StdRng::seed_from_u64(42);
        let tree = grow_classification_tree(&x, &y, &indices, &params, &mut rng);

        assert_eq!(tree.predict_row(array![0.05, 4.0].view()), 0.0);
        assert_eq!(tree.predict_row(array![0.95, 4.0].view()), 1.0);
    }

    #[test]
    fn test_pure_node_is_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = vec![1.0, 1.0, 1.0];
        let indices = vec![0, 1, 2];
        let params = ClassificationParams {
            max_depth: 5,
            min_samples_split: 2,
            max_features: None,
        };
        let mut rng = StdRng::seed_from_u64(42);
        let tree = grow_classification_tree(&x, &y, &indices, &params, &mut rng);
        assert!(matches!(tree, TreeNode::Leaf { value } if value == 1.0));
    }

    #[test]
    fn test_depth_limit() {
        let (x, y) = toy();
        let indices: Vec<usize> = (0..x.nrows()).collect();
        let params = ClassificationParams {
            max_depth: 1,
            min_samples_split: 2,
            max_features: None,
        };
        let mut rng = StdRng::seed_from_u64(42);
        let tree = grow_classification_tree(&x, &y, &indices, &params, &mut rng);
        assert!(tree.depth() <= 1);
    }

    #[test]
    fn test_regression_tree_fits_residuals() {
        let x = array![[0.0], [0.0], [1.0], [1.0]];
        let grad = vec![-0.5, -0.5, 0.5, 0.5];
        let hess = vec![0.25, 0.25, 0.25, 0.25];
        let indices = vec![0, 1, 2, 3];
        let params = RegressionParams {
            max_depth: 2,
            min_samples_split: 2,
            lambda: 0.0,
        };
        let tree = grow_regression_tree(&x, &grad, &hess, &indices, &params);
        // Leaf weight = Σg/Σh = -1.0/0.5 = -2 on the left, +2 on the right.
        assert!((tree.predict_row(array![0.0].view()) + 2.0).abs() < 1e-9);
        assert!((tree.predict_row(array![1.0].view()) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_serde_roundtrip() {
        let (x, y) = toy();
        let indices: Vec<usize> = (0..x.nrows()).collect();
        let params = ClassificationParams {
            max_depth: 3,
            min_samples_split: 2,
            max_features: None,
        };
        let mut rng = StdRng::seed_from_u64(42);
        let tree = grow_classification_tree(&x, &y, &indices, &params, &mut rng);
        let json = serde_json::to_string(&tree).unwrap();
        let back: TreeNode = serde_json::from_str(&json).unwrap();
        assert_eq!(
            tree.predict_row(array![0.05, 4.0].view()),
            back.predict_row(array![0.05, 4.0].view())
        );
    }
}
