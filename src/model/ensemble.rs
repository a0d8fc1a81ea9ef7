//! Ensemble Anomaly Detector
//!
//! Five independently trained members under fixed consensus weights:
//! three supervised classifiers fit on the full labeled set, two
//! unsupervised outlier detectors fit on the normal-labeled subset only.
//!
//! The source labeling convention is `label == 1` for normal events; the
//! internal target is inverted so 1 = anomaly.

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::dataset::AccessEvent;
use crate::context::AccessContext;
use crate::error::{Error, Result};
use crate::features::{self, EncoderTables, FEATURE_LAYOUT};

use super::boosting::{GradientBoosting, GradientBoostingParams};
use super::boundary::{OneClassBoundary, OneClassBoundaryParams};
use super::forest::{RandomForest, RandomForestParams};
use super::isolation::{IsolationForest, IsolationForestParams};
use super::linear::{LogisticRegression, LogisticRegressionParams};
use super::scaler::StandardScaler;
use super::{AnomalyClassifier, OutlierDetector};

/// Denominator guard for min-max normalization over a constant batch.
const MINMAX_EPSILON: f64 = 1e-8;

// ============================================================================
// WEIGHTS
// ============================================================================

/// Fixed consensus weights. Must sum to 1.0 for any configuration - the
/// total score is only guaranteed to stay in [0, 1] under that invariant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleWeights {
    pub random_forest: f64,
    pub gradient_boosting: f64,
    pub logistic_regression: f64,
    pub isolation_forest: f64,
    pub boundary: f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            random_forest: 0.35,
            gradient_boosting: 0.35,
            logistic_regression: 0.20,
            isolation_forest: 0.05,
            boundary: 0.05,
        }
    }
}

impl EnsembleWeights {
    pub fn sum(&self) -> f64 {
        self.random_forest
            + self.gradient_boosting
            + self.logistic_regression
            + self.isolation_forest
            + self.boundary
    }

    pub fn validate(&self) -> Result<()> {
        let sum = self.sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(Error::InvalidWeights(sum));
        }
        Ok(())
    }
}

// ============================================================================
// TRAINING PARAMETERS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnsembleParams {
    pub forest: RandomForestParams,
    pub boosting: GradientBoostingParams,
    pub linear: LogisticRegressionParams,
    pub isolation: IsolationForestParams,
    pub boundary: OneClassBoundaryParams,
    pub weights: EnsembleWeights,
}

impl EnsembleParams {
    /// Small member sizes for tests and smoke training.
    pub fn fast() -> Self {
        Self {
            forest: RandomForestParams {
                n_trees: 10,
                max_depth: 5,
                ..Default::default()
            },
            boosting: GradientBoostingParams {
                n_estimators: 15,
                max_depth: 3,
                ..Default::default()
            },
            linear: LogisticRegressionParams {
                max_iter: 200,
                ..Default::default()
            },
            isolation: IsolationForestParams {
                n_trees: 20,
                sample_size: 64,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

// ============================================================================
// TRAINED ENSEMBLE
// ============================================================================

/// Immutable trained state: everything scoring needs, exactly as persisted
/// in the model artifact. Never mutated by the online path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedEnsemble {
    pub scaler: StandardScaler,
    pub forest: RandomForest,
    pub boosting: GradientBoosting,
    pub linear: LogisticRegression,
    pub isolation: IsolationForest,
    pub boundary: OneClassBoundary,
    pub weights: EnsembleWeights,
    pub encoders: EncoderTables,
    /// Ordered column names - part of the model contract.
    pub feature_columns: Vec<String>,
    /// Decision threshold selected by the training job, if any.
    pub trained_threshold: Option<f64>,
}

impl TrainedEnsemble {
    /// Offline training over a labeled batch.
    pub fn fit(events: &[AccessEvent], params: &EnsembleParams) -> Result<Self> {
        params.weights.validate()?;
        if events.is_empty() {
            return Err(Error::Training("empty training set".to_string()));
        }

        let contexts: Vec<AccessContext> =
            events.iter().map(|e| e.context.clone()).collect();
        let (x, encoders) = features::fit_transform(&contexts);

        // label 1 = normal in the source data; internal target 1 = anomaly.
        let y: Vec<f64> = events
            .iter()
            .map(|e| if e.label_or_normal() == 0 { 1.0 } else { 0.0 })
            .collect();

        let (x_scaled, scaler) = StandardScaler::fit_transform(&x);

        log::info!(
            "fitting ensemble on {} rows ({} anomalies)",
            events.len(),
            y.iter().filter(|&&v| v >= 0.5).count()
        );

        let forest = RandomForest::fit(&x_scaled, &y, params.forest.clone());
        let boosting = GradientBoosting::fit(&x_scaled, &y, params.boosting.clone());
        let linear = LogisticRegression::fit(&x_scaled, &y, params.linear.clone());

        // Unsupervised members learn the shape of normal behavior only.
        let normal_rows: Vec<usize> = y
            .iter()
            .enumerate()
            .filter(|(_, &v)| v < 0.5)
            .map(|(i, _)| i)
            .collect();
        if normal_rows.is_empty() {
            return Err(Error::Training(
                "no normal-labeled rows for unsupervised members".to_string(),
            ));
        }
        let x_normal = x_scaled.select(Axis(0), &normal_rows);
        let isolation = IsolationForest::fit(&x_normal, params.isolation.clone());
        let boundary = OneClassBoundary::fit(&x_normal, params.boundary.clone());

        Ok(Self {
            scaler,
            forest,
            boosting,
            linear,
            isolation,
            boundary,
            weights: params.weights,
            encoders,
            feature_columns: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
            trained_threshold: None,
        })
    }

    /// Score a batch of contexts; each result is in [0, 1], higher = more
    /// anomalous. Stateless against the immutable trained state.
    pub fn score(&self, contexts: &[AccessContext]) -> Vec<f64> {
        if contexts.is_empty() {
            return Vec::new();
        }

        let x = features::transform(contexts, &self.encoders);
        let x_scaled = self.scaler.transform(&x);
        self.score_matrix(&x_scaled)
    }

    fn score_matrix(&self, x_scaled: &Array2<f64>) -> Vec<f64> {
        let n = x_scaled.nrows();
        let mut scores = vec![0.0_f64; n];

        // Supervised contribution: weighted anomaly-class probabilities.
        for (weight, probs) in [
            (
                self.weights.random_forest,
                self.forest.predict_anomaly_probability(x_scaled),
            ),
            (
                self.weights.gradient_boosting,
                self.boosting.predict_anomaly_probability(x_scaled),
            ),
            (
                self.weights.logistic_regression,
                self.linear.predict_anomaly_probability(x_scaled),
            ),
        ] {
            for (s, p) in scores.iter_mut().zip(probs) {
                *s += weight * p;
            }
        }

        // Unsupervised contribution: raw scores min-max normalized within
        // the current batch and inverted (higher raw = more normal).
        for (weight, raw) in [
            (
                self.weights.isolation_forest,
                self.isolation.score_samples(x_scaled),
            ),
            (self.weights.boundary, self.boundary.score_samples(x_scaled)),
        ] {
            for (s, inv) in scores.iter_mut().zip(minmax_inverted(&raw)) {
                *s += weight * inv;
            }
        }

        for s in scores.iter_mut() {
            *s = s.clamp(0.0, 1.0);
        }
        scores
    }
}

/// Per-batch min-max normalization, inverted so higher = more anomalous.
///
/// Deliberate calibration quirk, preserved from the trained pipeline: the
/// statistics come from the scoring batch itself, so a batch of one has
/// min == max and the inverted value is exactly 1.0 - the detector's full
/// weight. Pinned by a test; do not "fix" silently.
pub(crate) fn minmax_inverted(raw: &[f64]) -> Vec<f64> {
    let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min + MINMAX_EPSILON;
    raw.iter().map(|v| 1.0 - (v - min) / span).collect()
}

// ============================================================================
// TESTS
// ============================================================================
