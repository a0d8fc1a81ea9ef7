//! Error taxonomy
//!
//! Nothing here is fatal to the process: policy denials and anomaly flags
//! are ordinary `Decision`s, not errors. Errors cover the artifact
//! lifecycle, collaborator failures and training.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No model artifact is loaded in the scoring slot.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// Artifact schema version not known to this build.
    #[error("unsupported artifact schema version {0}")]
    UnsupportedSchema(u32),

    /// Artifact payload does not match its checksum sidecar.
    #[error("artifact checksum mismatch for {path}")]
    ChecksumMismatch { path: String },

    /// Feature layout in a persisted blob does not match this build.
    #[error("feature layout mismatch: expected v{expected_version} ({expected_hash:08x}), got v{actual_version} ({actual_hash:08x})")]
    LayoutMismatch {
        expected_version: u8,
        expected_hash: u32,
        actual_version: u8,
        actual_hash: u32,
    },

    /// Consensus weights must sum to 1.0.
    #[error("ensemble weights sum to {0}, expected 1.0")]
    InvalidWeights(f64),

    #[error("encryption failure: {0}")]
    EncryptionFailure(String),

    #[error("decryption failure: {0}")]
    DecryptionFailure(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
