use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use tokio::process::Command;

use crate::device::bridge::{CommandOutput, DeviceBridge, DeviceEntry, DeviceHandle};

/// Device bridge backed by the `adb` executable
pub struct AdbBridge {
    adb_path: PathBuf,
}

impl AdbBridge {
    pub fn new(adb_path: impl Into<PathBuf>) -> Self {
        Self { adb_path: adb_path.into() }
    }

    /// Run adb with the given arguments and capture its output
    async fn run<I, S>(&self, args: I) -> Result<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        debug!("Running {} {:?}", self.adb_path.display(), args);

        let output = Command::new(&self.adb_path)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.adb_path.display()))?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[async_trait]
impl DeviceBridge for AdbBridge {
    async fn devices(&self) -> Result<Vec<DeviceEntry>> {
        let output = self.run(["devices", "-l"]).await?;
        let stdout = output.into_stdout("adb devices")?;
        Ok(parse_device_list(&String::from_utf8_lossy(&stdout)))
    }

    async fn shell(&self, device: &DeviceHandle, command: &str) -> Result<CommandOutput> {
        self.run(["-s", device.serial(), "shell", command]).await
    }

    async fn pull(&self, device: &DeviceHandle, remote: &str, local: &Path) -> Result<CommandOutput> {
        let args: Vec<&OsStr> = vec![
            OsStr::new("-s"),
            OsStr::new(device.serial()),
            OsStr::new("pull"),
            OsStr::new(remote),
            local.as_os_str(),
        ];
        self.run(args).await
    }

    async fn backup(&self, device: &DeviceHandle, destination: &Path, args: &[String]) -> Result<CommandOutput> {
        let mut command: Vec<&OsStr> = vec![
            OsStr::new("-s"),
            OsStr::new(device.serial()),
            OsStr::new("backup"),
            OsStr::new("-f"),
            destination.as_os_str(),
        ];
        command.extend(args.iter().map(OsStr::new));
        self.run(command).await
    }

    async fn kill_server(&self) -> Result<()> {
        let output = self.run(["kill-server"]).await?;
        if !output.success {
            warn!("adb kill-server reported an error: {}", output.stderr.trim());
        }
        Ok(())
    }
}

/// Parse the output of `adb devices -l`
pub fn parse_device_list(output: &str) -> Vec<DeviceEntry> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with("List of devices") && !line.starts_with('*'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let serial = fields.next()?;
            let state = fields.next()?;
            let model = fields
                .find_map(|field| field.strip_prefix("model:"))
                .map(|model| model.replace('_', " "));

            Some(DeviceEntry {
                serial: serial.to_string(),
                state: state.to_string(),
                model,
            })
        })
        .collect()
}
