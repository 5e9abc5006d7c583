//! Shared helpers for the integration tests: a scripted device and
//! collectors with fixed behavior.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use android_collector::collectors::{Collected, EvidenceCollector};
use android_collector::config::AcquisitionConfig;
use android_collector::device::{CommandOutput, DeviceBridge, DeviceEntry, DeviceHandle};
use android_collector::session::Workspace;

pub const SERIAL: &str = "28031FDH2001AB";

pub const GETPROP: &str = "[ro.build.fingerprint]: [google/panther/panther:14/UQ1A/1234:user/release-keys]\n\
                           [ro.build.version.release]: [14]\n\
                           [ro.build.version.sdk]: [34]\n\
                           [ro.product.manufacturer]: [Google]\n\
                           [ro.product.model]: [Pixel 7]\n\
                           [ro.serialno]: [28031FDH2001AB]\n";

pub const PACKAGES: &str = "package:/data/app/~~Xy==/com.example.chat-Ab==/base.apk=com.example.chat installer=com.android.vending uid:10201\n\
                            package:/system/app/Bluetooth/Bluetooth.apk=com.android.bluetooth installer=null uid:1002\n";

/// A device answering adb commands from a script.
///
/// Each shell command maps to a queue of answers; the last answer repeats.
/// Unscripted commands succeed with a one-line output naming the command.
pub struct FakeBridge {
    devices: Mutex<Vec<Vec<DeviceEntry>>>,
    shell: Mutex<HashMap<String, Vec<CommandOutput>>>,
    unreadable: HashSet<String>,
    pub shell_calls: Mutex<Vec<String>>,
    pub kill_server_calls: AtomicUsize,
}

impl FakeBridge {
    /// One authorized device with a readable identity
    pub fn connected() -> Self {
        Self {
            devices: Mutex::new(vec![vec![DeviceEntry::new(SERIAL, "device")]]),
            shell: Mutex::new(HashMap::new()),
            unreadable: HashSet::new(),
            shell_calls: Mutex::new(Vec::new()),
            kill_server_calls: AtomicUsize::new(0),
        }
        .answer("getprop", vec![CommandOutput::ok(GETPROP)])
        .answer("pm list packages -f -i -U -u", vec![CommandOutput::ok(PACKAGES)])
    }

    /// Device lists returned by successive discovery attempts
    pub fn with_device_lists(self, lists: Vec<Vec<DeviceEntry>>) -> Self {
        *self.devices.lock().unwrap() = lists;
        self
    }

    pub fn answer(self, command: &str, answers: Vec<CommandOutput>) -> Self {
        self.shell.lock().unwrap().insert(command.to_string(), answers);
        self
    }

    /// Remote paths that `pull` refuses with a permission error
    pub fn unreadable(mut self, remote: &str) -> Self {
        self.unreadable.insert(remote.to_string());
        self
    }

    pub fn shell_call_count(&self, command: &str) -> usize {
        self.shell_calls.lock().unwrap().iter().filter(|c| *c == command).count()
    }
}

#[async_trait]
impl DeviceBridge for FakeBridge {
    async fn devices(&self) -> Result<Vec<DeviceEntry>> {
        let mut lists = self.devices.lock().unwrap();
        if lists.len() > 1 {
            Ok(lists.remove(0))
        } else {
            Ok(lists.first().cloned().unwrap_or_default())
        }
    }

    async fn shell(&self, _device: &DeviceHandle, command: &str) -> Result<CommandOutput> {
        self.shell_calls.lock().unwrap().push(command.to_string());

        let mut scripted = self.shell.lock().unwrap();
        match scripted.get_mut(command) {
            Some(answers) if answers.len() > 1 => Ok(answers.remove(0)),
            Some(answers) => answers.first().cloned().ok_or_else(|| anyhow!("no answer for {}", command)),
            None => Ok(CommandOutput::ok(format!("output of {}\n", command))),
        }
    }

    async fn pull(&self, _device: &DeviceHandle, remote: &str, local: &Path) -> Result<CommandOutput> {
        if self.unreadable.contains(remote) {
            return Ok(CommandOutput::failed(format!(
                "adb: error: failed to stat remote object '{}': Permission denied",
                remote
            )));
        }

        let name = remote.trim_end_matches('/').rsplit('/').next().unwrap_or("pulled");
        let target: PathBuf = if local.is_dir() { local.join(name) } else { local.to_path_buf() };

        if remote.ends_with('/') {
            fs::create_dir_all(&target)?;
            fs::write(target.join("content.bin"), format!("contents of {}", remote))?;
        } else {
            fs::write(&target, format!("contents of {}", remote))?;
        }
        Ok(CommandOutput::ok("1 file pulled"))
    }

    async fn backup(&self, _device: &DeviceHandle, destination: &Path, _args: &[String]) -> Result<CommandOutput> {
        fs::write(destination, b"ANDROID BACKUP\n5\n0\nnone\n")?;
        Ok(CommandOutput::ok(""))
    }

    async fn kill_server(&self) -> Result<()> {
        self.kill_server_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Collector with a fixed outcome, writing one artifact on success
pub struct FixedCollector {
    pub file: String,
    pub fail_with: Option<String>,
}

impl FixedCollector {
    pub fn succeeding(file: &str) -> Self {
        Self {
            file: file.to_string(),
            fail_with: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            file: String::new(),
            fail_with: Some(reason.to_string()),
        }
    }
}

#[async_trait]
impl EvidenceCollector for FixedCollector {
    async fn collect(&self, _device: &DeviceHandle, workspace: &Workspace) -> Result<Collected> {
        if let Some(reason) = &self.fail_with {
            return Err(anyhow!("{}", reason));
        }
        let path = workspace.write_artifact(&self.file, self.file.as_bytes())?;
        Ok(Collected::Artifacts(vec![path]))
    }
}

/// Configuration writing into `output`
pub fn config_for(output: &Path) -> AcquisitionConfig {
    AcquisitionConfig {
        output_dir: output.to_path_buf(),
        discovery_retry_secs: 1,
        ..AcquisitionConfig::default()
    }
}

/// The single session workspace under `output`
pub fn only_workspace(output: &Path) -> PathBuf {
    let dirs: Vec<PathBuf> = fs::read_dir(output)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_dir())
        .collect();
    assert_eq!(dirs.len(), 1, "expected exactly one workspace, found {:?}", dirs);
    dirs.into_iter().next().unwrap()
}
