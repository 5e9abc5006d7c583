use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info, warn};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::acquisition::report::AcquisitionReport;
use crate::config::AcquisitionConfig;
use crate::constants::EXIT_RUN_FAILED;
use crate::device::{DeviceBridge, DeviceDiscovery, DiscoveryError};
use crate::pipeline::{default_pipeline, Step, StepRunner};
use crate::session::{AcquisitionSession, SessionError};
use crate::storage::{EnvelopeStorage, SealOutcome, SecureStorage};
use crate::utils::manifest::{Finalizer, Manifest};
use crate::utils::summary::write_session_record;

/// Fatal outcomes of a run
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("device discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("failed to initialize acquisition: {0}")]
    Initialization(#[source] SessionError),
    #[error("failed to generate file hashes: {0:#}")]
    Finalization(anyhow::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl AcquisitionError {
    pub fn exit_code(&self) -> i32 {
        EXIT_RUN_FAILED
    }
}

/// One end-to-end acquisition: discovery, session, pipeline, hashing, sealing
pub struct Acquisition {
    config: AcquisitionConfig,
    bridge: Arc<dyn DeviceBridge>,
    storage: Option<Arc<dyn SecureStorage>>,
    steps: Option<Vec<Step>>,
}

impl Acquisition {
    /// Acquisition with the default pipeline and envelope sealing when a key
    /// is configured
    pub fn new(config: AcquisitionConfig, bridge: Arc<dyn DeviceBridge>) -> Self {
        let storage = EnvelopeStorage::from_config(&config.storage)
            .map(|storage| Arc::new(storage) as Arc<dyn SecureStorage>);

        Self {
            config,
            bridge,
            storage,
            steps: None,
        }
    }

    pub fn with_storage(mut self, storage: Option<Arc<dyn SecureStorage>>) -> Self {
        self.storage = storage;
        self
    }

    /// Replace the default pipeline
    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = Some(steps);
        self
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    fn runner(&self) -> StepRunner {
        let steps = match &self.steps {
            Some(steps) => steps.clone(),
            None => default_pipeline(Arc::clone(&self.bridge), &self.config),
        };
        StepRunner::new(steps).with_disabled(self.config.disabled_steps.iter().copied())
    }

    /// Run the acquisition to the end.
    ///
    /// Step failures never abort the run. Initialization and hashing
    /// failures do. A sealing failure leaves the plaintext bundle in place
    /// and is reported through [`AcquisitionReport::status`].
    pub async fn run(&self, cancel: &CancellationToken) -> Result<AcquisitionReport, AcquisitionError> {
        let discovery = DeviceDiscovery::new(Arc::clone(&self.bridge), self.config.discovery_retry_delay())
            .with_serial(self.config.device_serial.clone());
        let device = discovery.wait_for_device(cancel).await?;

        let mut session = AcquisitionSession::new(&self.config.output_dir);
        info!("Started new acquisition {}", session.id());

        session
            .initialize(self.bridge.as_ref(), &device)
            .await
            .map_err(AcquisitionError::Initialization)?;
        session.start()?;

        let runner = self.runner();
        runner.run(&mut session, &device).await?;

        if let Err(e) = write_session_record(&session) {
            error!("Failed to write session record: {:#}", e);
        }

        let workspace = session.running_workspace()?.root().to_path_buf();
        let manifest = hash_workspace(workspace.clone()).await.map_err(|e| {
            error!("Failed to generate file hashes: {:#}", e);
            AcquisitionError::Finalization(e)
        })?;
        session.complete(&manifest)?;
        info!("Acquisition {} finalized, {} file(s) hashed", session.id(), manifest.len());

        if let Err(e) = self.bridge.kill_server().await {
            warn!("Failed to stop the adb server: {:#}", e);
        }

        let seal = self.seal(&mut session, workspace).await?;
        let report = AcquisitionReport::new(&session, &manifest, &seal);

        match report.write(&self.config.output_dir) {
            Ok(path) => info!("Acquisition report written to {}", path.display()),
            Err(e) => error!("Failed to write acquisition report: {:#}", e),
        }

        Ok(report)
    }

    async fn seal(&self, session: &mut AcquisitionSession, workspace: PathBuf) -> Result<SealOutcome, SessionError> {
        let storage = match &self.storage {
            Some(storage) => Arc::clone(storage),
            None => {
                warn!(
                    "No public key configured, the acquisition folder {} is stored unencrypted",
                    workspace.display()
                );
                return Ok(SealOutcome::NotRequested);
            }
        };

        let stored = tokio::task::spawn_blocking(move || storage.store(&workspace))
            .await
            .map_err(anyhow::Error::new)
            .and_then(|result| result);

        match stored {
            Ok(archive) => {
                session.seal(archive.clone())?;
                info!("Acquisition sealed into {}", archive.path.display());
                Ok(SealOutcome::Sealed(archive))
            }
            Err(e) => {
                error!("WARNING: The secure storage of the acquisition folder failed! The data is unencrypted!");
                error!("{:#}", e);
                Ok(SealOutcome::Failed(format!("{:#}", e)))
            }
        }
    }
}

/// Hash the frozen workspace off the async runtime
async fn hash_workspace(workspace: PathBuf) -> anyhow::Result<Manifest> {
    tokio::task::spawn_blocking(move || Finalizer::hash_files(&workspace))
        .await
        .map_err(anyhow::Error::new)?
}
