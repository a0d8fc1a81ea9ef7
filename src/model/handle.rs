//! Shared model slot for the online scoring path.
//!
//! Training and artifact reloads swap a new `TrainedEnsemble` in atomically;
//! concurrent scorers keep whatever `Arc` they grabbed and are never torn
//! mid-batch.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::context::AccessContext;
use crate::error::{Error, Result};

use super::artifact::ModelArtifact;
use super::ensemble::TrainedEnsemble;

#[derive(Default)]
pub struct EnsembleHandle {
    slot: RwLock<Option<Arc<TrainedEnsemble>>>,
}

impl EnsembleHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(model: TrainedEnsemble) -> Self {
        Self {
            slot: RwLock::new(Some(Arc::new(model))),
        }
    }

    /// Replace the active model. In-flight scoring keeps the old `Arc`.
    pub fn swap(&self, model: TrainedEnsemble) {
        *self.slot.write() = Some(Arc::new(model));
        log::info!("ensemble model swapped");
    }

    /// Load, validate and install an artifact from disk.
    pub fn load_artifact(&self, path: &Path) -> Result<()> {
        let artifact = ModelArtifact::load(path)?;
        self.swap(artifact.model);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.read().is_some()
    }

    fn current(&self) -> Option<Arc<TrainedEnsemble>> {
        self.slot.read().clone()
    }

    /// Score a batch, failing with an error when no model is installed.
    pub fn try_score(&self, contexts: &[AccessContext]) -> Result<Vec<f64>> {
        match self.current() {
            Some(model) => Ok(model.score(contexts)),
            None => Err(Error::ModelUnavailable(
                "no trained ensemble installed".to_string(),
            )),
        }
    }

    /// Score a batch with the fail-open sentinel: when no model is
    /// installed every row scores 0.0 (fully normal) and a warning is
    /// logged. Callers that must fail closed use `try_score`.
    pub fn score(&self, contexts: &[AccessContext]) -> Vec<f64> {
        match self.current() {
            Some(model) => model.score(contexts),
            None => {
                log::warn!(
                    "scoring {} rows without a model, returning 0.0 for each",
                    contexts.len()
                );
                vec![0.0; contexts.len()]
            }
        }
    }

    /// Threshold chosen during training, if the active model carries one.
    pub fn trained_threshold(&self) -> Option<f64> {
        self.current().and_then(|m| m.trained_threshold)
    }
}
