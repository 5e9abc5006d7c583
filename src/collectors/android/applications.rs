use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::collectors::collector::{partial_artifacts, Collected, EvidenceCollector, PartialCollection};
use crate::config::ApkDownloadPolicy;
use crate::constants::SYSTEM_PACKAGE_PREFIXES;
use crate::device::{DeviceBridge, DeviceHandle};
use crate::session::Workspace;

const PACKAGE_LIST_COMMAND: &str = "pm list packages -f -i -U -u";
const PACKAGES_FILE_NAME: &str = "packages.json";
const APK_DIR: &str = "apks";

lazy_static! {
    /// `package:/data/app/~~x==/com.example-y==/base.apk=com.example installer=com.android.vending uid:10123`
    static ref PACKAGE_LINE: Regex = Regex::new(r"^package:(?P<path>\S+)=(?P<name>[^\s=]+)(?P<rest>.*)$").unwrap();
    static ref INSTALLER_FIELD: Regex = Regex::new(r"installer=(\S+)").unwrap();
    static ref UID_FIELD: Regex = Regex::new(r"uid:(\d+)").unwrap();
}

/// Whether the APKs of a package were copied into the workspace
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ApkDownload {
    #[default]
    NotRequested,
    Pulled,
    Failed(String),
}

/// One installed (or uninstalled but retained) package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub path: String,
    pub installer: Option<String>,
    pub uid: Option<u32>,
    pub system: bool,
    /// Every APK file of the package, split APKs included
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub apk: ApkDownload,
}

/// Parse the output of `pm list packages -f -i -U -u`
pub fn parse_package_list(output: &str) -> Vec<PackageInfo> {
    output
        .lines()
        .filter_map(|line| PACKAGE_LINE.captures(line.trim()))
        .map(|caps| {
            let path = caps["path"].to_string();
            let rest = &caps["rest"];
            let installer = INSTALLER_FIELD
                .captures(rest)
                .map(|c| c[1].to_string())
                .filter(|i| i != "null");

            PackageInfo {
                name: caps["name"].to_string(),
                system: SYSTEM_PACKAGE_PREFIXES.iter().any(|prefix| path.starts_with(prefix)),
                installer,
                uid: UID_FIELD.captures(rest).and_then(|c| c[1].parse().ok()),
                files: Vec::new(),
                apk: ApkDownload::NotRequested,
                path,
            }
        })
        .collect()
}

/// Parse `pm path <package>` output into APK paths
fn parse_package_paths(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .map(str::to_string)
        .collect()
}

/// Lists installed packages and pulls their APKs
pub struct ApplicationsCollector {
    bridge: Arc<dyn DeviceBridge>,
    policy: ApkDownloadPolicy,
}

impl ApplicationsCollector {
    pub fn new(bridge: Arc<dyn DeviceBridge>, policy: ApkDownloadPolicy) -> Self {
        Self { bridge, policy }
    }

    fn wants(&self, package: &PackageInfo) -> bool {
        match self.policy {
            ApkDownloadPolicy::All => true,
            ApkDownloadPolicy::NonSystem => !package.system,
            ApkDownloadPolicy::None => false,
        }
    }

    /// APK files of a package, falling back to the listed base APK
    async fn package_files(&self, device: &DeviceHandle, package: &PackageInfo) -> Vec<String> {
        let command = format!("pm path {}", package.name);
        match self.bridge.shell(device, &command).await {
            Ok(output) if output.success => {
                let paths = parse_package_paths(&output.stdout_string());
                if !paths.is_empty() {
                    return paths;
                }
            }
            Ok(output) => debug!("`{}` failed: {}", command, output.stderr.trim()),
            Err(e) => debug!("`{}` failed: {:#}", command, e),
        }
        vec![package.path.clone()]
    }

    async fn download(&self, device: &DeviceHandle, workspace: &Workspace, package: &PackageInfo) -> Result<Vec<PathBuf>> {
        let dir = workspace.create_dir(PathBuf::from(APK_DIR).join(&package.name))?;
        let mut pulled = Vec::new();

        for remote in &package.files {
            let file_name = remote.rsplit('/').next().unwrap_or("base.apk");
            let local = dir.join(file_name);

            let result = self
                .bridge
                .pull(device, remote, &local)
                .await
                .with_context(|| format!("Failed to pull {}", remote))
                .and_then(|output| output.into_stdout("adb pull"));

            if let Err(e) = result {
                // Split APKs pulled before the failure stay with the step
                return Err(PartialCollection::new(format!("{:#}", e), pulled).into());
            }
            pulled.push(workspace.relative(&local));
        }

        Ok(pulled)
    }
}

#[async_trait]
impl EvidenceCollector for ApplicationsCollector {
    async fn collect(&self, device: &DeviceHandle, workspace: &Workspace) -> Result<Collected> {
        let stdout = self
            .bridge
            .shell(device, PACKAGE_LIST_COMMAND)
            .await
            .context("Failed to list packages")?
            .into_stdout("pm list packages")?;

        let mut packages = parse_package_list(&String::from_utf8_lossy(&stdout));
        info!(
            "Found {} package(s), {} not part of the system image",
            packages.len(),
            packages.iter().filter(|p| !p.system).count()
        );

        for package in packages.iter_mut() {
            package.files = self.package_files(device, package).await;
        }

        let mut apks = Vec::new();
        let mut wanted = 0;
        let mut failed = 0;
        for package in packages.iter_mut().filter(|p| self.wants(p)) {
            wanted += 1;
            match self.download(device, workspace, package).await {
                Ok(pulled) => {
                    apks.extend(pulled);
                    package.apk = ApkDownload::Pulled;
                }
                Err(e) => {
                    failed += 1;
                    warn!("Failed to download APK of {}: {:#}", package.name, e);
                    apks.extend(partial_artifacts(&e));
                    package.apk = ApkDownload::Failed(format!("{:#}", e));
                }
            }
        }

        let listing = serde_json::to_vec_pretty(&packages).context("Failed to serialize package list")?;
        let mut artifacts = vec![workspace.write_artifact(PACKAGES_FILE_NAME, &listing)?];
        artifacts.extend(apks);

        if failed > 0 && failed == wanted {
            let reason = format!("none of the {} wanted APK(s) could be downloaded", wanted);
            return Err(PartialCollection::new(reason, artifacts).into());
        }
        if failed > 0 {
            warn!("{} of {} package(s) could not be downloaded, see {}", failed, wanted, PACKAGES_FILE_NAME);
        }

        Ok(Collected::Artifacts(artifacts))
    }
}
