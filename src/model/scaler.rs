//! Feature Scaler
//!
//! Standardizes columns to zero mean / unit variance. Fit once during
//! training; the statistics are persisted in the artifact and reused
//! verbatim at inference - never refit.

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-column standardization statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    /// Population std; zero-variance columns store 1.0 so they pass
    /// through centered instead of dividing by zero.
    pub std: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Self {
        let n = x.nrows().max(1) as f64;
        let d = x.ncols();
        let mut mean = vec![0.0; d];
        let mut std = vec![1.0; d];

        for (j, column) in x.axis_iter(Axis(1)).enumerate() {
            let m = column.sum() / n;
            let var = column.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
            mean[j] = m;
            let s = var.sqrt();
            std[j] = if s > 1e-12 { s } else { 1.0 };
        }

        Self { mean, std }
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.clone();
        for mut row in out.rows_mut() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = (*v - self.mean[j]) / self.std[j];
            }
        }
        out
    }

    pub fn fit_transform(x: &Array2<f64>) -> (Array2<f64>, Self) {
        let scaler = Self::fit(x);
        let scaled = scaler.transform(x);
        (scaled, scaler)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_zero_mean_unit_variance() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];
        let (scaled, _) = StandardScaler::fit_transform(&x);
        for j in 0..2 {
            let col: Vec<f64> = scaled.column(j).to_vec();
            let mean: f64 = col.iter().sum::<f64>() / 3.0;
            let var: f64 = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 3.0;
            assert!(mean.abs() < 1e-12);
            assert!((var - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_constant_column_passes_through() {
        let x = array![[5.0], [5.0], [5.0]];
        let (scaled, scaler) = StandardScaler::fit_transform(&x);
        assert_eq!(scaler.std[0], 1.0);
        assert!(scaled.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_stored_stats_reused() {
        let train = array![[0.0], [10.0]];
        let scaler = StandardScaler::fit(&train);
        let probe = array![[5.0]];
        let out = scaler.transform(&probe);
        // (5 - 5) / 5 = 0 against the trained stats.
        assert!(out[[0, 0]].abs() < 1e-12);
    }
}
