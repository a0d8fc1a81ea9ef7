//! Isolation Forest
//!
//! Unsupervised outlier detector: anomalies isolate in fewer random splits.
//! Fit on normal rows only; the standard anomaly score is
//! `2^(-E[path] / c(ψ))` and `score_samples` returns its negation so that
//! higher = more normal (the ensemble min-max normalizes and inverts).

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::OutlierDetector;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForestParams {
    pub n_trees: usize,
    pub sample_size: usize,
    pub seed: u64,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            sample_size: 256,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum IsoNode {
    /// External node; `size` is how many training rows ended here.
    External {
        size: usize,
    },
    Internal {
        feature: usize,
        threshold: f64,
        left: Box<IsoNode>,
        right: Box<IsoNode>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    params: IsolationForestParams,
    trees: Vec<IsoNode>,
    /// Effective subsample size used at fit time.
    sample_size: usize,
}

/// Average unsuccessful-search path length in a BST of n nodes.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let nf = n as f64;
            let harmonic = (nf - 1.0).ln() + 0.577_215_664_901_532_9;
            2.0 * harmonic - 2.0 * (nf - 1.0) / nf
        }
    }
}

impl IsolationForest {
    pub fn fit(x: &Array2<f64>, params: IsolationForestParams) -> Self {
        let n = x.nrows();
        let sample_size = params.sample_size.min(n).max(1);
        let height_limit = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let mut trees = Vec::with_capacity(params.n_trees);
        for _ in 0..params.n_trees {
            let sample: Vec<usize> = if n <= sample_size {
                (0..n).collect()
            } else {
                // Subsample without replacement.
                rand::seq::index::sample(&mut rng, n, sample_size).into_vec()
            };
            trees.push(build_tree(x, &sample, 0, height_limit, &mut rng));
        }

        Self {
            params,
            trees,
            sample_size,
        }
    }

    fn path_length(node: &IsoNode, row: ArrayView1<f64>, depth: f64) -> f64 {
        match node {
            IsoNode::External { size } => depth + average_path_length(*size),
            IsoNode::Internal {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    Self::path_length(left, row, depth + 1.0)
                } else {
                    Self::path_length(right, row, depth + 1.0)
                }
            }
        }
    }

    /// Standard anomaly score in (0, 1]; higher = more anomalous.
    pub fn anomaly_score(&self, row: ArrayView1<f64>) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let mean_path: f64 = self
            .trees
            .iter()
            .map(|t| Self::path_length(t, row, 0.0))
            .sum::<f64>()
            / self.trees.len() as f64;
        let c = average_path_length(self.sample_size).max(1e-12);
        2f64.powf(-mean_path / c)
    }
}

fn build_tree(
    x: &Array2<f64>,
    indices: &[usize],
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> IsoNode {
    if depth >= height_limit || indices.len() <= 1 {
        return IsoNode::External {
            size: indices.len(),
        };
    }

    // Pick a feature with spread; give up after a few constant draws.
    let d = x.ncols();
    for _ in 0..d.max(4) {
        let feature = rng.gen_range(0..d);
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for &i in indices {
            lo = lo.min(x[[i, feature]]);
            hi = hi.max(x[[i, feature]]);
        }
        if hi <= lo {
            continue;
        }

        let threshold = rng.gen_range(lo..hi);
        let (left, right): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| x[[i, feature]] <= threshold);
        return IsoNode::Internal {
            feature,
            threshold,
            left: Box::new(build_tree(x, &left, depth + 1, height_limit, rng)),
            right: Box::new(build_tree(x, &right, depth + 1, height_limit, rng)),
        };
    }

    IsoNode::External {
        size: indices.len(),
    }
}

impl OutlierDetector for IsolationForest {
    fn score_samples(&self, x: &Array2<f64>) -> Vec<f64> {
        x.rows()
            .into_iter()
            .map(|row| -self.anomaly_score(row))
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn normal_cluster() -> Array2<f64> {
        let mut flat = Vec::new();
        for i in 0..64 {
            flat.extend([(i % 8) as f64 * 0.1, (i / 8) as f64 * 0.1]);
        }
        Array2::from_shape_vec((64, 2), flat).unwrap()
    }

    #[test]
    fn test_outlier_scores_lower_than_inlier() {
        let x = normal_cluster();
        let forest = IsolationForest::fit(
            &x,
            IsolationForestParams {
                n_trees: 50,
                ..Default::default()
            },
        );
        let probe = Array2::from_shape_vec((2, 2), vec![0.35, 0.35, 50.0, 50.0]).unwrap();
        let scores = forest.score_samples(&probe);
        // Higher = more normal: the far-away point must score lower.
        assert!(scores[1] < scores[0]);
    }

    #[test]
    fn test_anomaly_score_in_unit_interval() {
        let x = normal_cluster();
        let forest = IsolationForest::fit(&x, Default::default());
        for row in x.rows() {
            let s = forest.anomaly_score(row);
            assert!(s > 0.0 && s <= 1.0);
        }
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let x = normal_cluster();
        let a = IsolationForest::fit(&x, Default::default());
        let b = IsolationForest::fit(&x, Default::default());
        assert_eq!(a.score_samples(&x), b.score_samples(&x));
    }
}
