//! Categorical Encoding Tables
//!
//! Label encodings are fit once on the training batch and persisted inside
//! the model artifact. Inference MUST reuse the stored tables - refitting
//! per call would renumber categories and make scores incomparable across
//! time. This is a correctness property of the model contract, not an
//! optimization.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

// ============================================================================
// LABEL TABLE
// ============================================================================

/// One categorical dimension: sorted unique classes -> dense code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelTable {
    /// Sorted for a deterministic class -> code assignment.
    classes: Vec<String>,
}

impl LabelTable {
    /// Fit from the training batch's values.
    pub fn fit<'a, I: IntoIterator<Item = &'a str>>(values: I) -> Self {
        let unique: BTreeSet<&str> = values.into_iter().collect();
        Self {
            classes: unique.into_iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Encode a value. A value never seen during training maps to one past
    /// the trained range, which keeps all trained codes stable.
    pub fn encode(&self, value: &str) -> f64 {
        match self.classes.binary_search_by(|c| c.as_str().cmp(value)) {
            Ok(idx) => idx as f64,
            Err(_) => self.classes.len() as f64,
        }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

// ============================================================================
// ENCODER TABLES
// ============================================================================

/// The three persisted categorical encoders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncoderTables {
    pub location: LabelTable,
    pub device: LabelTable,
    pub department: LabelTable,
}

// ============================================================================
// TESTS
// ============================================================================
