//! Logistic Regression
//!
//! Full-batch gradient descent with L2 regularization. Deterministic:
//! weights start at zero, no sampling involved.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::AnomalyClassifier;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegressionParams {
    pub max_iter: usize,
    pub learning_rate: f64,
    /// L2 regularization strength.
    pub l2: f64,
}

impl Default for LogisticRegressionParams {
    fn default() -> Self {
        // Source training job: max_iter=1000, C=1.0.
        Self {
            max_iter: 1000,
            learning_rate: 0.1,
            l2: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    weights: Vec<f64>,
    bias: f64,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticRegression {
    pub fn fit(x: &Array2<f64>, y: &[f64], params: LogisticRegressionParams) -> Self {
        let n = x.nrows();
        let d = x.ncols();
        let targets = Array1::from_iter(y.iter().copied());

        let mut weights = Array1::<f64>::zeros(d);
        let mut bias = 0.0_f64;

        if n == 0 {
            return Self {
                weights: weights.to_vec(),
                bias,
            };
        }

        let inv_n = 1.0 / n as f64;
        for _ in 0..params.max_iter {
            let margins = x.dot(&weights) + bias;
            let probs = margins.mapv(sigmoid);
            let residual = &probs - &targets;

            let grad_w = x.t().dot(&residual) * inv_n + &weights * (params.l2 * inv_n);
            let grad_b = residual.sum() * inv_n;

            weights = weights - grad_w * params.learning_rate;
            bias -= grad_b * params.learning_rate;
        }

        Self {
            weights: weights.to_vec(),
            bias,
        }
    }
}

impl AnomalyClassifier for LogisticRegression {
    fn predict_anomaly_probability(&self, x: &Array2<f64>) -> Vec<f64> {
        let w = Array1::from_iter(self.weights.iter().copied());
        (x.dot(&w) + self.bias).mapv(sigmoid).to_vec()
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
        let mut flat = Vec::new();
        let mut y = Vec::new();
        for i in 0..20 {
            flat.extend([-1.0 - (i % 4) as f64 * 0.1]);
            y.push(0.0);
        }
        for i in 0..20 {
            flat.extend([1.0 + (i % 4) as f64 * 0.1]);
            y.push(1.0);
        }
        (Array2::from_shape_vec((40, 1), flat).unwrap(), y)
    }

    #[test]
    fn test_separates() {
        let (x, y) = separable();
        let model = LogisticRegression::fit(&x, &y, Default::default());
        let probe = Array2::from_shape_vec((2, 1), vec![-1.2, 1.2]).unwrap();
        let probs = model.predict_anomaly_probability(&probe);
        assert!(probs[0] < 0.3);
        assert!(probs[1] > 0.7);
    }

    #[test]
    fn test_deterministic() {
        let (x, y) = separable();
        let a = LogisticRegression::fit(&x, &y, Default::default());
        let b = LogisticRegression::fit(&x, &y, Default::default());
        assert_eq!(
            a.predict_anomaly_probability(&x),
            b.predict_anomaly_probability(&x)
        );
    }

    #[test]
    fn test_empty_fit_predicts_half() {
        let x = Array2::<f64>::zeros((0, 3));
        let model = LogisticRegression::fit(&x, &[], Default::default());
        let probe = Array2::from_shape_vec((1, 3), vec![1.0, 2.0, 3.0]).unwrap();
        assert!((model.predict_anomaly_probability(&probe)[0] - 0.5).abs() < 1e-12);
    }
}
