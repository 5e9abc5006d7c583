use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use thiserror::Error;
use walkdir::WalkDir;

use crate::device::{DeviceBridge, DeviceHandle};
use crate::session::Workspace;

/// What a collector left in the workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collected {
    /// Workspace-relative paths of the files written
    Artifacts(Vec<PathBuf>),
    /// Nothing to do for this device or configuration
    Skipped(String),
}

/// A collection that failed after writing some files. The runner keeps
/// those files on the failed step so every workspace file belongs to a step.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct PartialCollection {
    pub reason: String,
    /// Workspace-relative paths of the files written before the failure
    pub artifacts: Vec<PathBuf>,
}

impl PartialCollection {
    pub fn new(reason: impl Into<String>, artifacts: Vec<PathBuf>) -> Self {
        Self {
            reason: reason.into(),
            artifacts,
        }
    }
}

/// Files a failed collector still left in the workspace
pub fn partial_artifacts(error: &anyhow::Error) -> Vec<PathBuf> {
    error
        .downcast_ref::<PartialCollection>()
        .map(|partial| partial.artifacts.clone())
        .unwrap_or_default()
}

/// One evidence collection capability, run once per acquisition
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EvidenceCollector: Send + Sync {
    async fn collect(&self, device: &DeviceHandle, workspace: &Workspace) -> Result<Collected>;
}

/// Run a shell command and store its stdout as a workspace artifact
pub async fn capture_shell(
    bridge: &dyn DeviceBridge,
    device: &DeviceHandle,
    workspace: &Workspace,
    command: &str,
    file_name: &str,
) -> Result<PathBuf> {
    let stdout = bridge
        .shell(device, command)
        .await
        .with_context(|| format!("Failed to run `{}`", command))?
        .into_stdout(command)?;

    workspace
        .write_artifact(file_name, &stdout)
        .with_context(|| format!("Failed to store output of `{}`", command))
}

/// Every file under `dir`, relative to the workspace root
pub fn list_artifacts(workspace: &Workspace, dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| workspace.relative(entry.path()))
        .collect();

    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::bridge::{CommandOutput, MockDeviceBridge};
    use std::fs;
    use tempfile::TempDir;
    use uuid::Uuid;

    #[test]
    fn test_partial_artifacts_survive_context() {
        let error = anyhow::Error::new(PartialCollection::new(
            "settings list global: Permission denied",
            vec![PathBuf::from("settings_system.txt")],
        ))
        .context("settings step");

        assert_eq!(partial_artifacts(&error), vec![PathBuf::from("settings_system.txt")]);
        assert!(format!("{:#}", error).contains("Permission denied"));
        assert!(partial_artifacts(&anyhow::anyhow!("plain failure")).is_empty());
    }

    #[tokio::test]
    async fn test_capture_shell_writes_stdout() {
        let output = TempDir::new().unwrap();
        let workspace = Workspace::create(output.path(), &Uuid::new_v4()).unwrap();

        let mut bridge = MockDeviceBridge::new();
        bridge
            .expect_shell()
            .withf(|_, command| command == "service list")
            .returning(|_, _| Ok(CommandOutput::ok("Found 2 services:\n")));

        let device = DeviceHandle::new("abc");
        let artifact = capture_shell(&bridge, &device, &workspace, "service list", "services.txt")
            .await
            .unwrap();

        assert_eq!(artifact, PathBuf::from("services.txt"));
        assert_eq!(fs::read_to_string(workspace.root().join("services.txt")).unwrap(), "Found 2 services:\n");
    }

    #[tokio::test]
    async fn test_capture_shell_failure_writes_nothing() {
        let output = TempDir::new().unwrap();
        let workspace = Workspace::create(output.path(), &Uuid::new_v4()).unwrap();

        let mut bridge = MockDeviceBridge::new();
        bridge
            .expect_shell()
            .returning(|_, _| Ok(CommandOutput::failed("/system/bin/sh: env: Permission denied")));

        let device = DeviceHandle::new("abc");
        let err = capture_shell(&bridge, &device, &workspace, "env", "env.txt").await.unwrap_err();

        assert!(format!("{:#}", err).contains("Permission denied"));
        assert!(!workspace.root().join("env.txt").exists());
    }

    #[test]
    fn test_list_artifacts_is_relative_and_sorted() {
        let output = TempDir::new().unwrap();
        let workspace = Workspace::create(output.path(), &Uuid::new_v4()).unwrap();
        workspace.write_artifact("logs/b.txt", b"b").unwrap();
        workspace.write_artifact("logs/anr/a.txt", b"a").unwrap();

        let files = list_artifacts(&workspace, &workspace.root().join("logs"));
        assert_eq!(files, vec![PathBuf::from("logs/anr/a.txt"), PathBuf::from("logs/b.txt")]);
    }
}
