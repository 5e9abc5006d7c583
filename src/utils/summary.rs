use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::json;

use crate::constants::SESSION_RECORD_FILE_NAME;
use crate::session::AcquisitionSession;

/// Host name of the examiner's machine, `unknown` if it cannot be read
pub fn examiner_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Create a JSON record of the session.
///
/// The record documents the chain of custody: who acquired what, with which
/// tool version, when, and how every step ended. It is written into the
/// workspace so the manifest covers it.
///
/// # Example Output
///
/// ```json
/// {
///   "session_id": "550e8400-e29b-41d4-a716-446655440000",
///   "examiner_host": "forensics-lab-01",
///   "collector_version": "0.1.0",
///   "started_at": "2024-01-15T14:30:52Z",
///   "device": {"serial": "28031FDH2001AB", "model": "Pixel 7", ...},
///   "steps": [{"step": "backup", "outcome": {"status": "success"}, ...}]
/// }
/// ```
pub fn create_session_record(session: &AcquisitionSession, examiner_host: &str) -> Result<String> {
    let steps: Vec<_> = session
        .log()
        .iter()
        .map(|result| {
            json!({
                "step": result.step,
                "action": result.step.action(),
                "outcome": result.outcome,
                "artifacts": result.artifacts,
                "started_at": result.started_at,
                "finished_at": result.finished_at,
            })
        })
        .collect();

    let record = json!({
        "session_id": session.id().to_string(),
        "examiner_host": examiner_host,
        "host_os": std::env::consts::OS,
        "collector_version": env!("CARGO_PKG_VERSION"),
        "started_at": session.started_at(),
        "device": session.device(),
        "step_count": steps.len(),
        "failed_steps": session.failed_steps(),
        "steps": steps,
    });

    serde_json::to_string_pretty(&record).context("Failed to serialize session record to JSON")
}

/// Write the session record into the running session's workspace
pub fn write_session_record(session: &AcquisitionSession) -> Result<PathBuf> {
    let path = session.artifact_path(SESSION_RECORD_FILE_NAME)?;
    let record = create_session_record(session, &examiner_hostname())?;

    fs::write(&path, record).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
