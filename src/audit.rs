//! Audit trail.
//!
//! Append-only JSONL log of authorization decisions. Recording is
//! best-effort: a sink failure is logged and swallowed, it never changes
//! or delays a decision.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::context::AccessContext;
use crate::error::Result;
use crate::pipeline::Decision;

/// Rotate the active log once it grows past this size.
const MAX_LOG_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: String,
    pub username: String,
    pub file_id: String,
    pub action: String,
    pub granted: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl AuditRecord {
    pub fn from_decision(
        context: &AccessContext,
        file_id: &str,
        action: &str,
        decision: &Decision,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            username: context.username.clone(),
            file_id: file_id.to_string(),
            action: action.to_string(),
            granted: decision.allowed,
            reason: decision.reason.as_str().to_string(),
            score: decision.score,
        }
    }
}

/// Destination for audit records. Implementations must be safe to call
/// from concurrent authorization paths.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// Sink that drops everything. Useful when auditing is disabled.
#[derive(Debug, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _record: &AuditRecord) {}
}

// ============================================================================
// JSONL SINK
// ============================================================================

struct SinkState {
    writer: BufWriter<File>,
    written: u64,
}

pub struct JsonlAuditSink {
    path: PathBuf,
    state: Mutex<SinkState>,
}

impl JsonlAuditSink {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(SinkState {
                writer: BufWriter::new(file),
                written,
            }),
        })
    }

    fn append(&self, record: &AuditRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let mut state = self.state.lock();

        state.writer.write_all(line.as_bytes())?;
        state.writer.write_all(b"\n")?;
        // Decisions must hit disk promptly; a crashed process should lose
        // at most the record being written.
        state.writer.flush()?;
        state.written += line.len() as u64 + 1;

        if state.written >= MAX_LOG_BYTES {
            self.rotate(&mut state)?;
        }
        Ok(())
    }

    fn rotate(&self, state: &mut SinkState) -> Result<()> {
        let rotated = self.path.with_extension(format!(
            "{}.jsonl",
            Utc::now().format("%Y%m%dT%H%M%S")
        ));
        std::fs::rename(&self.path, &rotated)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        state.writer = BufWriter::new(file);
        state.written = 0;
        log::info!("rotated audit log to {}", rotated.display());
        Ok(())
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, record: &AuditRecord) {
        if let Err(err) = self.append(record) {
            log::error!("failed to write audit record: {err}");
        }
    }
}

/// Read every record from a JSONL audit file, skipping malformed lines.
pub fn read_records(path: &Path) -> Result<Vec<AuditRecord>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| match serde_json::from_str(l) {
            Ok(r) => Some(r),
            Err(err) => {
                log::warn!("skipping malformed audit line: {err}");
                None
            }
        })
        .collect())
}
