//! Random Forest Classifier
//!
//! Bagged gini trees with √d feature subsampling per split. Probability of
//! the anomaly class is the mean of the trees' leaf fractions.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tree::{grow_classification_tree, ClassificationParams, TreeNode};
use super::AnomalyClassifier;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        // Source training job: n_estimators=100, max_depth=10, random_state=42.
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    params: RandomForestParams,
    trees: Vec<TreeNode>,
}

impl RandomForest {
    /// Fit on the full labeled set; `y[i] == 1.0` marks the anomaly class.
    pub fn fit(x: &Array2<f64>, y: &[f64], params: RandomForestParams) -> Self {
        let n = x.nrows();
        let d = x.ncols();
        let max_features = ((d as f64).sqrt().round() as usize).clamp(1, d);
        let mut rng = StdRng::seed_from_u64(params.seed);

        let tree_params = ClassificationParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            max_features: Some(max_features),
        };

        let mut trees = Vec::with_capacity(params.n_trees);
        for _ in 0..params.n_trees {
            // Bootstrap sample with replacement.
            let indices: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            trees.push(grow_classification_tree(x, y, &indices, &tree_params, &mut rng));
        }

        Self { params, trees }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl AnomalyClassifier for RandomForest {
    fn predict_anomaly_probability(&self, x: &Array2<f64>) -> Vec<f64> {
        if self.trees.is_empty() {
            return vec![0.0; x.nrows()];
        }
        x.rows()
            .into_iter()
            .map(|row| {
                let sum: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
                sum / self.trees.len() as f64
            })
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

    fn separable() -> (Array2<f64>, Vec<f64>) {
        // Normals cluster near 0, anomalies near 10 on both features.
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let jitter = (i % 7) as f64 * 0.05;
            rows.push([jitter, 1.0 - jitter]);
            y.push(0.0);
        }
        for i in 0..10 {
            let jitter = (i % 5) as f64 * 0.05;
            rows.push([10.0 + jitter, 9.0 - jitter]);
            y.push(1.0);
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        (Array2::from_shape_vec((50, 2), flat).unwrap(), y)
    }

    fn small_params() -> RandomForestParams {
        RandomForestParams {
            n_trees: 15,
            max_depth: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_separates_clusters() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, small_params());
        let probe =
            Array2::from_shape_vec((2, 2), vec![0.1, 0.9, 10.0, 9.0]).unwrap();
        let probs = forest.predict_anomaly_probability(&probe);
        assert!(probs[0] < 0.3, "normal scored {}", probs[0]);
        assert!(probs[1] > 0.7, "anomaly scored {}", probs[1]);
    }

    #[test]
    fn test_probabilities_bounded() {
        let (x, y) = separable();
        let forest = RandomForest::fit(&x, &y, small_params());
        for p in forest.predict_anomaly_probability(&x) {
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let (x, y) = separable();
        let a = RandomForest::fit(&x, &y, small_params());
        let b = RandomForest::fit(&x, &y, small_params());
        assert_eq!(
            a.predict_anomaly_probability(&x),
            b.predict_anomaly_probability(&x)
        );
    }
}
