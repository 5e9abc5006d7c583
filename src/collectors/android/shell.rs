use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, warn};

use crate::collectors::collector::{Collected, EvidenceCollector, PartialCollection};
use crate::constants::SETTINGS_NAMESPACES;
use crate::device::{DeviceBridge, DeviceHandle};
use crate::session::Workspace;

/// One shell command whose output becomes one artifact
#[derive(Debug, Clone)]
pub struct ShellCapture {
    pub file_name: String,
    /// Tried in order until one succeeds
    pub commands: Vec<String>,
    /// Accept a non-zero exit when output was produced (`find` over unreadable dirs)
    pub lenient: bool,
}

impl ShellCapture {
    pub fn new(file_name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            commands: vec![command.into()],
            lenient: false,
        }
    }

    pub fn fallback(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    pub fn lenient(mut self) -> Self {
        self.lenient = true;
        self
    }
}

/// Stores the output of one or more shell commands
pub struct ShellCommandCollector {
    bridge: Arc<dyn DeviceBridge>,
    captures: Vec<ShellCapture>,
}

impl ShellCommandCollector {
    pub fn new(bridge: Arc<dyn DeviceBridge>, captures: Vec<ShellCapture>) -> Self {
        Self { bridge, captures }
    }

    pub fn properties(bridge: Arc<dyn DeviceBridge>) -> Self {
        Self::new(bridge, vec![ShellCapture::new("getprop.txt", "getprop")])
    }

    pub fn settings(bridge: Arc<dyn DeviceBridge>) -> Self {
        let captures = SETTINGS_NAMESPACES
            .iter()
            .map(|ns| ShellCapture::new(format!("settings_{}.txt", ns), format!("settings list {}", ns)))
            .collect();
        Self::new(bridge, captures)
    }

    pub fn processes(bridge: Arc<dyn DeviceBridge>) -> Self {
        Self::new(bridge, vec![ShellCapture::new("ps.txt", "ps -A").fallback("ps")])
    }

    pub fn environment(bridge: Arc<dyn DeviceBridge>) -> Self {
        Self::new(bridge, vec![ShellCapture::new("env.txt", "env")])
    }

    pub fn services(bridge: Arc<dyn DeviceBridge>) -> Self {
        Self::new(bridge, vec![ShellCapture::new("services.txt", "service list")])
    }

    pub fn logcat(bridge: Arc<dyn DeviceBridge>) -> Self {
        Self::new(
            bridge,
            vec![ShellCapture::new("logcat.txt", "logcat -d -b all \"*:V\"").fallback("logcat -d")],
        )
    }

    pub fn dumpsys(bridge: Arc<dyn DeviceBridge>) -> Self {
        Self::new(bridge, vec![ShellCapture::new("dumpsys.txt", "dumpsys")])
    }

    pub fn file_listing(bridge: Arc<dyn DeviceBridge>) -> Self {
        Self::new(
            bridge,
            vec![ShellCapture::new(
                "files.txt",
                "find / -type f -printf '%T@ %m %s %u %g %p\\n' 2>/dev/null",
            )
            .fallback("find / -type f 2>/dev/null")
            .lenient()],
        )
    }

    async fn run_capture(&self, device: &DeviceHandle, workspace: &Workspace, capture: &ShellCapture) -> Result<PathBuf> {
        let mut last_error = None;

        for command in &capture.commands {
            let output = match self.bridge.shell(device, command).await {
                Ok(output) => output,
                Err(e) => {
                    debug!("`{}` could not be run: {:#}", command, e);
                    last_error = Some(e);
                    continue;
                }
            };

            if capture.lenient && !output.success && !output.stdout.is_empty() {
                warn!("`{}` exited with an error, keeping its partial output", command);
                return workspace.write_artifact(&capture.file_name, &output.stdout);
            }

            match output.into_stdout(command) {
                Ok(stdout) => return workspace.write_artifact(&capture.file_name, &stdout),
                Err(e) => {
                    debug!("{:#}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("no command configured for {}", capture.file_name)))
    }
}

#[async_trait]
impl EvidenceCollector for ShellCommandCollector {
    async fn collect(&self, device: &DeviceHandle, workspace: &Workspace) -> Result<Collected> {
        let mut artifacts = Vec::new();
        let mut errors = Vec::new();

        for capture in &self.captures {
            match self.run_capture(device, workspace, capture).await {
                Ok(path) => artifacts.push(path),
                Err(e) => errors.push(format!("{:#}", e)),
            }
        }

        if !errors.is_empty() {
            return Err(PartialCollection::new(errors.join("; "), artifacts).into());
        }

        Ok(Collected::Artifacts(artifacts))
    }
}
