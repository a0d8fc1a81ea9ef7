//! Authorization pipeline.
//!
//! Two stages, strictly ordered: the deterministic policy gate first, the
//! anomaly detector second. A policy denial short-circuits - the detector
//! is never consulted and the decision carries no score.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audit::{AuditRecord, AuditSink};
use crate::context::AccessContext;
use crate::error::{Error, Result};
use crate::model::EnsembleHandle;
use crate::policy::{self, FilePolicy, PolicyReason, PolicyVerdict};

/// Fallback decision threshold when the model carries no trained one.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

// ============================================================================
// CONFIG
// ============================================================================

/// What to do when no model is available for scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailMode {
    /// Treat unscored requests as normal (score 0.0).
    Open,
    /// Deny requests that cannot be scored.
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub threshold: f64,
    pub fail_mode: FailMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            fail_mode: FailMode::Open,
        }
    }
}

// ============================================================================
// DECISION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    Authorized,
    AnomalyFlagged,
    LocationDenied,
    DeviceDenied,
    DepartmentDenied,
    TimeWindowDenied,
    ModelUnavailable,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authorized => "authorized",
            Self::AnomalyFlagged => "anomaly_flagged",
            Self::LocationDenied => "location_denied",
            Self::DeviceDenied => "device_denied",
            Self::DepartmentDenied => "department_denied",
            Self::TimeWindowDenied => "time_window_denied",
            Self::ModelUnavailable => "model_unavailable",
        }
    }
}

impl std::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<PolicyReason> for DecisionReason {
    fn from(reason: PolicyReason) -> Self {
        match reason {
            PolicyReason::NoPolicy | PolicyReason::Passed => Self::Authorized,
            PolicyReason::LocationDenied => Self::LocationDenied,
            PolicyReason::DeviceDenied => Self::DeviceDenied,
            PolicyReason::DepartmentDenied => Self::DepartmentDenied,
            PolicyReason::TimeWindowDenied => Self::TimeWindowDenied,
        }
    }
}

/// Outcome of one authorization request. `score` is `None` when the
/// detector was never consulted (policy denial) or could not run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    pub score: Option<f64>,
    pub reason: DecisionReason,
}

impl Decision {
    fn allow(score: Option<f64>) -> Self {
        Self {
            allowed: true,
            score,
            reason: DecisionReason::Authorized,
        }
    }

    fn deny(score: Option<f64>, reason: DecisionReason) -> Self {
        Self {
            allowed: false,
            score,
            reason,
        }
    }
}

// ============================================================================
// SCORER SEAM
// ============================================================================

/// Scoring backend for the pipeline. The production implementation is
/// `EnsembleHandle`; tests substitute spies.
pub trait Scorer: Send + Sync {
    fn try_score(&self, contexts: &[AccessContext]) -> Result<Vec<f64>>;
    fn trained_threshold(&self) -> Option<f64>;
}

impl Scorer for EnsembleHandle {
    fn try_score(&self, contexts: &[AccessContext]) -> Result<Vec<f64>> {
        EnsembleHandle::try_score(self, contexts)
    }

    fn trained_threshold(&self) -> Option<f64> {
        EnsembleHandle::trained_threshold(self)
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct AuthorizationPipeline {
    scorer: Arc<dyn Scorer>,
    config: PipelineConfig,
}

impl AuthorizationPipeline {
    pub fn new(scorer: Arc<dyn Scorer>, config: PipelineConfig) -> Self {
        Self { scorer, config }
    }

    /// Threshold used for the anomaly gate: a threshold selected during
    /// training wins over the configured default.
    pub fn effective_threshold(&self) -> f64 {
        self.scorer
            .trained_threshold()
            .unwrap_or(self.config.threshold)
    }

    /// Decide one access request.
    pub fn authorize(&self, context: &AccessContext, policy: Option<&FilePolicy>) -> Decision {
        let verdict = match policy {
            Some(p) => policy::evaluate(p, context),
            None => PolicyVerdict::allow(PolicyReason::NoPolicy),
        };
        if !verdict.allowed {
            return Decision::deny(None, verdict.reason.into());
        }

        let score = match self.scorer.try_score(std::slice::from_ref(context)) {
            Ok(scores) => scores.first().copied().unwrap_or(0.0),
            Err(Error::ModelUnavailable(_)) => match self.config.fail_mode {
                FailMode::Open => {
                    log::warn!(
                        "no model available, failing open for user {}",
                        context.username
                    );
                    0.0
                }
                FailMode::Closed => {
                    return Decision::deny(None, DecisionReason::ModelUnavailable);
                }
            },
            Err(err) => {
                log::error!("scoring failed: {err}");
                match self.config.fail_mode {
                    FailMode::Open => 0.0,
                    FailMode::Closed => {
                        return Decision::deny(None, DecisionReason::ModelUnavailable);
                    }
                }
            }
        };

        if score >= self.effective_threshold() {
            Decision::deny(Some(score), DecisionReason::AnomalyFlagged)
        } else {
            Decision::allow(Some(score))
        }
    }

    /// Decide and append an audit record. Audit failures never change the
    /// decision; the sink logs and swallows its own errors.
    pub fn authorize_recorded(
        &self,
        context: &AccessContext,
        policy: Option<&FilePolicy>,
        file_id: &str,
        action: &str,
        sink: &dyn AuditSink,
    ) -> Decision {
        let decision = self.authorize(context, policy);
        sink.record(&AuditRecord::from_decision(context, file_id, action, &decision));
        decision
    }
}

// ============================================================================
// TESTS
// ============================================================================
