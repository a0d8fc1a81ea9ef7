//! Model artifact persistence.
//!
//! Versioned JSON on disk with a SHA-256 sidecar. Loading verifies the
//! checksum when the sidecar is present, refuses unknown schema versions,
//! and validates the feature layout and ensemble weights before the model
//! is handed to the scoring path.

use std::fs;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::features::{layout_hash, validate_layout, FEATURE_VERSION};

use super::ensemble::TrainedEnsemble;

/// Current on-disk schema. Bump when the artifact shape changes.
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub schema_version: u32,
    pub created_at: String,
    pub feature_version: u8,
    pub layout_hash: u32,
    pub model: TrainedEnsemble,
}

impl ModelArtifact {
    pub fn new(model: TrainedEnsemble) -> Self {
        Self {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            created_at: Utc::now().to_rfc3339(),
            feature_version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            model,
        }
    }

    /// Write the artifact and its `<path>.sha256` sidecar.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, &json)?;
        fs::write(sidecar_path(path), digest_hex(json.as_bytes()))?;
        log::info!("saved model artifact to {}", path.display());
        Ok(())
    }

    /// Load and fully validate an artifact.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;

        let sidecar = sidecar_path(path);
        if sidecar.exists() {
            let expected = fs::read_to_string(&sidecar)?;
            if expected.trim() != digest_hex(&bytes) {
                return Err(Error::ChecksumMismatch {
                    path: path.display().to_string(),
                });
            }
        } else {
            log::warn!("no checksum sidecar for {}, skipping verification", path.display());
        }

        // Peek the schema version before committing to a full decode.
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        let schema = value
            .get("schema_version")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0) as u32;
        if schema != ARTIFACT_SCHEMA_VERSION {
            return Err(Error::UnsupportedSchema(schema));
        }

        let artifact: ModelArtifact = serde_json::from_value(value)?;
        artifact.validate()?;
        Ok(artifact)
    }

    fn validate(&self) -> Result<()> {
        validate_layout(self.feature_version, self.layout_hash)?;
        self.model.weights.validate()?;
        Ok(())
    }
}

fn sidecar_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".sha256");
    std::path::PathBuf::from(name)
}

fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
