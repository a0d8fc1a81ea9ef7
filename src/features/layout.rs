//! Feature Layout - Centralized Column Definition
//!
//! The single source of truth for the feature schema. The trained scaler,
//! every model and the persisted artifact all assume this exact order.
//!
//! Rules:
//! 1. Add a column -> increment FEATURE_VERSION
//! 2. Change order -> increment FEATURE_VERSION
//! 3. Remove a column -> increment FEATURE_VERSION

use crc32fast::Hasher;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::Error;

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current feature layout version.
pub const FEATURE_VERSION: u8 = 1;

// ============================================================================
// FEATURE LAYOUT
// ============================================================================

/// Column names in the exact order the ensemble consumes them.
pub const FEATURE_LAYOUT: &[&str] = &[
    // === Time (0-4) ===
    "hour_sin",            // 0: sin(2π·hour/24), cyclical encoding
    "hour_cos",            // 1: cos(2π·hour/24)
    "is_weekend",          // 2: timestamp weekday >= saturday
    "is_night",            // 3: hour <= 6 or hour >= 22
    "is_business_hours",   // 4: 9 <= hour <= 17

    // === Encoded categoricals (5-7) ===
    "location_encoded",    // 5: trained label code for location
    "device_encoded",      // 6: trained label code for device
    "department_encoded",  // 7: trained label code for department

    // === Batch frequencies (8-9) ===
    "location_frequency",  // 8: empirical frequency within the batch
    "device_frequency",    // 9: empirical frequency within the batch

    // === Per-client history patterns (10-12) ===
    "location_pattern",    // 10: distinct locations seen for client_id
    "device_pattern",      // 11: distinct devices seen for client_id
    "hour_pattern",        // 12: std of hour for client_id
];

/// Total number of columns. Must match FEATURE_LAYOUT.len().
pub const FEATURE_COUNT: usize = 13;

// ============================================================================
// LAYOUT HASH
// ============================================================================

static LAYOUT_HASH: Lazy<u32> = Lazy::new(|| {
    let mut hasher = Hasher::new();
    hasher.update(&[FEATURE_VERSION]);
    for name in FEATURE_LAYOUT {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize()
});

/// CRC32 over version + ordered column names. Persisted blobs carry this so
/// a layout drift is caught at load time instead of silently skewing scores.
pub fn layout_hash() -> u32 {
    *LAYOUT_HASH
}

/// Validate that a persisted blob matches the current layout.
pub fn validate_layout(incoming_version: u8, incoming_hash: u32) -> Result<(), Error> {
    let current_hash = layout_hash();
    if incoming_version != FEATURE_VERSION || incoming_hash != current_hash {
        return Err(Error::LayoutMismatch {
            expected_version: FEATURE_VERSION,
            expected_hash: current_hash,
            actual_version: incoming_version,
            actual_hash: incoming_hash,
        });
    }
    Ok(())
}

/// Column index by name.
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_LAYOUT.iter().position(|&n| n == name)
}

/// Layout snapshot for logging and artifact metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
}

impl LayoutInfo {
    pub fn current() -> Self {
        Self {
            version: FEATURE_VERSION,
            hash: layout_hash(),
            feature_count: FEATURE_COUNT,
            feature_names: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
