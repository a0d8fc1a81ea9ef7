//! Model Module - Ensemble Anomaly Detector
//!
//! Five independently trained members unified under one weighted consensus
//! score, plus the feature scaler, the versioned artifact format and the
//! process-wide scoring slot.
//!
//! Capability split (two sub-contracts, no duck typing):
//! - supervised members implement [`AnomalyClassifier`]
//! - unsupervised members implement [`OutlierDetector`]

pub mod artifact;
pub mod boosting;
pub mod boundary;
pub mod ensemble;
pub mod forest;
pub mod handle;
pub mod isolation;
pub mod linear;
pub mod scaler;
pub mod tree;

pub use artifact::{ModelArtifact, ARTIFACT_SCHEMA_VERSION};
pub use ensemble::{EnsembleParams, EnsembleWeights, TrainedEnsemble};
pub use handle::EnsembleHandle;
pub use scaler::StandardScaler;

use ndarray::Array2;

/// Supervised capability: per-row probability of the anomaly class.
pub trait AnomalyClassifier {
    fn predict_anomaly_probability(&self, x: &Array2<f64>) -> Vec<f64>;
}

/// Unsupervised capability: per-row raw score, higher = more normal.
/// The ensemble inverts after normalizing.
pub trait OutlierDetector {
    fn score_samples(&self, x: &Array2<f64>) -> Vec<f64>;
}
