//! One-Class Boundary Detector
//!
//! Learns a hypersphere around normal behavior: center = mean of the
//! normal training rows, radius = the (1 - ν) quantile of their distances
//! to the center. `score_samples` is radius - distance, so rows inside the
//! boundary score positive (more normal) and rows outside score negative.

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::OutlierDetector;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneClassBoundaryParams {
    /// Expected fraction of training rows left outside the boundary.
    pub nu: f64,
}

impl Default for OneClassBoundaryParams {
    fn default() -> Self {
        Self { nu: 0.1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneClassBoundary {
    center: Vec<f64>,
    radius: f64,
}

impl OneClassBoundary {
    /// Fit on rows labeled normal only.
    pub fn fit(x: &Array2<f64>, params: OneClassBoundaryParams) -> Self {
        let n = x.nrows();
        let d = x.ncols();
        if n == 0 {
            return Self {
                center: vec![0.0; d],
                radius: 0.0,
            };
        }

        let mut center = vec![0.0; d];
        for row in x.rows() {
            for (c, v) in center.iter_mut().zip(row.iter()) {
                *c += v;
            }
        }
        for c in center.iter_mut() {
            *c /= n as f64;
        }

        let mut distances: Vec<f64> = x
            .rows()
            .into_iter()
            .map(|row| distance(&center, row))
            .collect();
        distances.sort_by(|a, b| a.total_cmp(b));

        let nu = params.nu.clamp(0.0, 1.0);
        let rank = (((1.0 - nu) * (n as f64 - 1.0)).round() as usize).min(n - 1);
        let radius = distances[rank];

        Self { center, radius }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }
}

fn distance(center: &[f64], row: ArrayView1<f64>) -> f64 {
    center
        .iter()
        .zip(row.iter())
        .map(|(c, v)| (v - c).powi(2))
        .sum::<f64>()
        .sqrt()
}

impl OutlierDetector for OneClassBoundary {
    fn score_samples(&self, x: &Array2<f64>) -> Vec<f64> {
        x.rows()
            .into_iter()
            .map(|row| self.radius - distance(&self.center, row))
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

    fn cluster() -> Array2<f64> {
        let mut flat = Vec::new();
        for i in 0..50 {
            flat.extend([((i % 10) as f64 - 4.5) * 0.1, ((i / 10) as f64 - 2.0) * 0.1]);
        }
        Array2::from_shape_vec((50, 2), flat).unwrap()
    }

    #[test]
    fn test_inside_positive_outside_negative() {
        let x = cluster();
        let model = OneClassBoundary::fit(&x, Default::default());
        let probe = Array2::from_shape_vec((2, 2), vec![0.0, 0.0, 25.0, 25.0]).unwrap();
        let scores = model.score_samples(&probe);
        assert!(scores[0] > 0.0);
        assert!(scores[1] < 0.0);
    }

    #[test]
    fn test_nu_controls_radius() {
        let x = cluster();
        let tight = OneClassBoundary::fit(&x, OneClassBoundaryParams { nu: 0.5 });
        let loose = OneClassBoundary::fit(&x, OneClassBoundaryParams { nu: 0.02 });
        assert!(tight.radius() < loose.radius());
    }

    #[test]
    fn test_empty_fit_is_degenerate() {
        let x = Array2::<f64>::zeros((0, 3));
        let model = OneClassBoundary::fit(&x, Default::default());
        let probe = Array2::from_shape_vec((1, 3), vec![1.0, 1.0, 1.0]).unwrap();
        assert!(model.score_samples(&probe)[0] < 0.0);
    }
}
