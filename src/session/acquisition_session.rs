use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use uuid::Uuid;

use crate::constants::STEP_JOURNAL_FILE_NAME;
use crate::device::{read_device_info, DeviceBridge, DeviceHandle};
use crate::models::{DeviceInfo, StepResult};
use crate::session::journal::StepJournal;
use crate::session::state::{SessionError, SessionState};
use crate::session::workspace::Workspace;
use crate::storage::SealedArchive;
use crate::utils::manifest::Manifest;

/// One acquisition run against one device
#[derive(Debug)]
pub struct AcquisitionSession {
    id: Uuid,
    output_dir: PathBuf,
    state: SessionState,
    workspace: Option<Workspace>,
    journal: Option<StepJournal>,
    device: Option<DeviceInfo>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    log: Vec<StepResult>,
    manifest_path: Option<PathBuf>,
    sealed_archive: Option<SealedArchive>,
    failure: Option<String>,
}

impl AcquisitionSession {
    /// New session with a fresh id. Nothing touches the filesystem yet.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            output_dir: output_dir.into(),
            state: SessionState::Created,
            workspace: None,
            journal: None,
            device: None,
            started_at: Utc::now(),
            completed_at: None,
            log: Vec::new(),
            manifest_path: None,
            sealed_archive: None,
            failure: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn workspace(&self) -> Option<&Workspace> {
        self.workspace.as_ref()
    }

    pub fn device(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Step outcomes in the order they were recorded
    pub fn log(&self) -> &[StepResult] {
        &self.log
    }

    pub fn failed_steps(&self) -> usize {
        self.log.iter().filter(|r| r.outcome.is_failed()).count()
    }

    pub fn manifest_path(&self) -> Option<&Path> {
        self.manifest_path.as_deref()
    }

    pub fn sealed_archive(&self) -> Option<&SealedArchive> {
        self.sealed_archive.as_ref()
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        info!("Session {} {} -> {}", self.id, self.state, next);
        self.state = next;
        Ok(())
    }

    /// Create the workspace and capture the device identity. Any failure
    /// moves the session to `Failed`: without a workspace nothing can be kept.
    pub async fn initialize(&mut self, bridge: &dyn DeviceBridge, device: &DeviceHandle) -> Result<(), SessionError> {
        if !self.state.can_transition_to(SessionState::Initialized) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: SessionState::Initialized,
            });
        }

        match self.prepare(bridge, device).await {
            Ok(()) => self.transition(SessionState::Initialized),
            Err(e) => {
                error!("Session {} failed to initialize: {}", self.id, e);
                self.failure = Some(describe(&e));
                self.transition(SessionState::Failed)?;
                Err(e)
            }
        }
    }

    async fn prepare(&mut self, bridge: &dyn DeviceBridge, device: &DeviceHandle) -> Result<(), SessionError> {
        let workspace = Workspace::create(&self.output_dir, &self.id).map_err(|source| SessionError::Workspace {
            path: self.output_dir.join(self.id.to_string()),
            source,
        })?;
        info!("Workspace created at {}", workspace.root().display());

        let journal = StepJournal::open(&workspace.root().join(STEP_JOURNAL_FILE_NAME))
            .map_err(SessionError::Journal)?;

        self.workspace = Some(workspace);
        self.journal = Some(journal);

        let info = read_device_info(bridge, device)
            .await
            .map_err(SessionError::DeviceIdentity)?;
        info!(
            "Acquiring {} {} (Android {}), serial {}",
            info.manufacturer.as_deref().unwrap_or("unknown"),
            info.model.as_deref().unwrap_or("device"),
            info.android_version.as_deref().unwrap_or("?"),
            info.serial
        );
        self.device = Some(info);

        Ok(())
    }

    /// Enter `Running`; pipeline steps may now write artifacts
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Running)
    }

    /// Workspace handle for collectors, only while running
    pub fn running_workspace(&self) -> Result<&Workspace, SessionError> {
        match (&self.workspace, self.state) {
            (Some(workspace), SessionState::Running) => Ok(workspace),
            _ => Err(SessionError::ArtifactsFrozen(self.state)),
        }
    }

    /// Absolute path for a new artifact, only while running
    pub fn artifact_path(&self, relative: impl AsRef<Path>) -> Result<PathBuf, SessionError> {
        self.running_workspace()?.resolve(relative)
    }

    /// Append a step outcome to the session log and the on-disk journal
    pub fn record(&mut self, result: StepResult) -> Result<(), SessionError> {
        if self.state != SessionState::Running {
            return Err(SessionError::ArtifactsFrozen(self.state));
        }

        if let Some(journal) = self.journal.as_mut() {
            if let Err(e) = journal.append(&result) {
                warn!("Failed to journal outcome of step {}: {}", result.step, e);
            }
        }

        self.log.push(result);
        Ok(())
    }

    /// Freeze the workspace once its manifest exists. Stamps `completed_at`.
    pub fn complete(&mut self, manifest: &Manifest) -> Result<(), SessionError> {
        self.transition(SessionState::Finalized)?;
        self.completed_at = Some(Utc::now());
        self.manifest_path = Some(manifest.path.clone());
        self.journal = None;
        Ok(())
    }

    /// Record the sealed archive produced from the finalized workspace
    pub fn seal(&mut self, archive: SealedArchive) -> Result<(), SessionError> {
        self.transition(SessionState::Sealed)?;
        self.sealed_archive = Some(archive);
        Ok(())
    }
}

/// Error text followed by its chain of causes
fn describe(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
