use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};

use crate::collectors::collector::{list_artifacts, Collected, EvidenceCollector, PartialCollection};
use crate::constants::{DEVICE_TMP_FOLDER, SYSTEM_LOG_PATHS};
use crate::device::{DeviceBridge, DeviceHandle};
use crate::session::Workspace;

/// Copies remote files or folders into one workspace directory.
///
/// With `require_all` unset, unreadable paths are warnings as long as
/// something was copied.
pub struct PullCollector {
    bridge: Arc<dyn DeviceBridge>,
    remote_paths: Vec<String>,
    local_dir: String,
    require_all: bool,
}

impl PullCollector {
    pub fn new(bridge: Arc<dyn DeviceBridge>, remote_paths: Vec<String>, local_dir: impl Into<String>) -> Self {
        Self {
            bridge,
            remote_paths,
            local_dir: local_dir.into(),
            require_all: true,
        }
    }

    pub fn system_logs(bridge: Arc<dyn DeviceBridge>) -> Self {
        let mut collector = Self::new(
            bridge,
            SYSTEM_LOG_PATHS.iter().map(|p| p.to_string()).collect(),
            "logs",
        );
        collector.require_all = false;
        collector
    }

    pub fn temp_folder(bridge: Arc<dyn DeviceBridge>) -> Self {
        Self::new(bridge, vec![DEVICE_TMP_FOLDER.to_string()], "tmp")
    }
}

#[async_trait]
impl EvidenceCollector for PullCollector {
    async fn collect(&self, device: &DeviceHandle, workspace: &Workspace) -> Result<Collected> {
        let local = workspace.create_dir(&self.local_dir)?;
        let mut failures = Vec::new();

        for remote in &self.remote_paths {
            let result = self
                .bridge
                .pull(device, remote, &local)
                .await
                .with_context(|| format!("Failed to pull {}", remote))
                .and_then(|output| output.into_stdout(&format!("adb pull {}", remote)));

            match result {
                Ok(_) => debug!("Pulled {} into {}", remote, self.local_dir),
                Err(e) if self.require_all => {
                    let written = list_artifacts(workspace, &local);
                    return Err(PartialCollection::new(format!("{:#}", e), written).into());
                }
                Err(e) => {
                    warn!("Skipping {}: {:#}", remote, e);
                    failures.push(remote.as_str());
                }
            }
        }

        let artifacts = list_artifacts(workspace, &local);
        if artifacts.is_empty() && !failures.is_empty() {
            bail!("none of {} could be pulled", failures.join(", "));
        }

        info!("Copied {} file(s) into {}", artifacts.len(), self.local_dir);
        Ok(Collected::Artifacts(artifacts))
    }
}
