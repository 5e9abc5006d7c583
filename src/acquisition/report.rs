use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::constants::EXIT_UNSEALED;
use crate::models::{DeviceInfo, StepResult};
use crate::session::{AcquisitionSession, SessionState};
use crate::storage::{SealOutcome, SealedArchive};
use crate::utils::manifest::Manifest;

/// Overall result of a run that reached finalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every step succeeded or was skipped, bundle sealed or sealing not requested
    Completed,
    /// Some steps failed, bundle sealed or sealing not requested
    CompletedWithWarnings,
    /// Sealing was requested and failed, the bundle is plaintext
    Unsealed,
}

/// Machine-readable outcome of a run, written beside the workspace
#[derive(Debug, Clone, Serialize)]
pub struct AcquisitionReport {
    pub session_id: Uuid,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub device: Option<DeviceInfo>,
    pub workspace: Option<PathBuf>,
    pub steps: Vec<StepResult>,
    pub failed_steps: usize,
    pub manifest_path: PathBuf,
    pub manifest_entries: usize,
    /// SHA-256 of the manifest itself
    pub manifest_sha256: String,
    pub seal_requested: bool,
    pub sealed: bool,
    pub sealed_archive: Option<SealedArchive>,
    pub seal_error: Option<String>,
    pub status: RunStatus,
}

impl AcquisitionReport {
    pub fn new(session: &AcquisitionSession, manifest: &Manifest, seal: &SealOutcome) -> Self {
        let failed_steps = session.failed_steps();
        let status = match seal {
            SealOutcome::Failed(_) => RunStatus::Unsealed,
            _ if failed_steps > 0 => RunStatus::CompletedWithWarnings,
            _ => RunStatus::Completed,
        };

        // The workspace is gone once sealing removed the plaintext
        let workspace = match seal.archive() {
            Some(archive) if !archive.plaintext_retained => None,
            _ => session.workspace().map(|w| w.root().to_path_buf()),
        };

        Self {
            session_id: session.id(),
            state: session.state(),
            started_at: session.started_at(),
            completed_at: session.completed_at(),
            device: session.device().cloned(),
            workspace,
            steps: session.log().to_vec(),
            failed_steps,
            manifest_path: manifest.path.clone(),
            manifest_entries: manifest.len(),
            manifest_sha256: manifest.digest().to_string(),
            seal_requested: !matches!(seal, SealOutcome::NotRequested),
            sealed: seal.is_sealed(),
            sealed_archive: seal.archive().cloned(),
            seal_error: seal.error().map(str::to_string),
            status,
        }
    }

    /// Process exit code for this run
    pub fn exit_code(&self, allow_unsealed: bool) -> i32 {
        match self.status {
            RunStatus::Unsealed if !allow_unsealed => EXIT_UNSEALED,
            _ => 0,
        }
    }

    /// Where the report of a session is written
    pub fn path_for(output_dir: &Path, session_id: &Uuid) -> PathBuf {
        output_dir.join(format!("{}.report.json", session_id))
    }

    /// Write the report next to the workspace
    pub fn write(&self, output_dir: &Path) -> Result<PathBuf> {
        let path = Self::path_for(output_dir, &self.session_id);
        let json = serde_json::to_string_pretty(self).context("Failed to serialize acquisition report")?;
        fs::write(&path, json).with_context(|| format!("Failed to write report {}", path.display()))?;
        Ok(path)
    }
}
