use std::fmt;
use std::path::Path;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque handle to the one authorized, connected device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceHandle {
    serial: String,
}

impl DeviceHandle {
    pub fn new(serial: impl Into<String>) -> Self {
        Self { serial: serial.into() }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.serial)
    }
}

/// One line of the bridge's device list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub serial: String,
    pub state: String,
    pub model: Option<String>,
}

impl DeviceEntry {
    pub fn new(serial: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            state: state.into(),
            model: None,
        }
    }
}

/// Captured result of a bridge command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Stdout of a successful command, or an error carrying the device's complaint
    pub fn into_stdout(self, what: &str) -> Result<Vec<u8>> {
        if self.success {
            return Ok(self.stdout);
        }

        let reason = if self.stderr.trim().is_empty() {
            self.stdout_string().trim().to_string()
        } else {
            self.stderr.trim().to_string()
        };

        if reason.is_empty() {
            Err(anyhow!("{} failed", what))
        } else {
            Err(anyhow!("{} failed: {}", what, reason))
        }
    }
}

/// Transport to the device. The acquisition core only talks to the device
/// through this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceBridge: Send + Sync {
    /// List every attached device with its state
    async fn devices(&self) -> Result<Vec<DeviceEntry>>;

    /// Run a shell command on the device
    async fn shell(&self, device: &DeviceHandle, command: &str) -> Result<CommandOutput>;

    /// Copy a remote file or folder into a local path
    async fn pull(&self, device: &DeviceHandle, remote: &str, local: &Path) -> Result<CommandOutput>;

    /// Take a backup into `destination`. Blocks until the operator confirms
    /// or declines on the device.
    async fn backup(&self, device: &DeviceHandle, destination: &Path, args: &[String]) -> Result<CommandOutput>;

    /// Release the transport once the acquisition is over
    async fn kill_server(&self) -> Result<()>;
}
