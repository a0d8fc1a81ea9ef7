//! ContextGate - Authorization Decision Core
//!
//! Grants or denies access to protected files based on a per-request
//! security context (who, where, on what device, when).
//!
//! ## Architecture
//! - `policy/` - Declarative per-file context policy evaluation
//! - `features/` - Context row -> feature vector transform
//! - `model/` - Ensemble anomaly detector (train + score)
//! - `pipeline` - Policy -> detector -> threshold decision
//!
//! Collaborator seams (`audit`, `store`, `vault`) are specified at their
//! interface boundary; the decision core never blocks on them.

pub mod audit;
pub mod context;
pub mod dataset;
pub mod error;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod policy;
pub mod store;
pub mod training;
pub mod vault;

// Re-export common types
pub use context::AccessContext;
pub use error::{Error, Result};
pub use model::ensemble::{EnsembleWeights, TrainedEnsemble};
pub use model::handle::EnsembleHandle;
pub use pipeline::{AuthorizationPipeline, Decision, DecisionReason, FailMode, PipelineConfig};
pub use policy::types::{FilePolicy, TimeWindow};
