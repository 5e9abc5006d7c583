use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::info;

use crate::collectors::collector::{Collected, EvidenceCollector};
use crate::config::BackupScope;
use crate::constants::SMS_PROVIDER_PACKAGE;
use crate::device::{DeviceBridge, DeviceHandle};
use crate::session::Workspace;

const BACKUP_FILE_NAME: &str = "backup.ab";

/// `adb backup` of SMS or of everything the device lets us back up
pub struct BackupCollector {
    bridge: Arc<dyn DeviceBridge>,
    scope: BackupScope,
}

impl BackupCollector {
    pub fn new(bridge: Arc<dyn DeviceBridge>, scope: BackupScope) -> Self {
        Self { bridge, scope }
    }

    fn backup_args(&self) -> Option<Vec<String>> {
        match self.scope {
            BackupScope::Sms => Some(vec!["-nocompress".into(), SMS_PROVIDER_PACKAGE.into()]),
            BackupScope::Everything => Some(vec!["-all".into()]),
            BackupScope::None => None,
        }
    }
}

#[async_trait]
impl EvidenceCollector for BackupCollector {
    async fn collect(&self, device: &DeviceHandle, workspace: &Workspace) -> Result<Collected> {
        let args = match self.backup_args() {
            Some(args) => args,
            None => return Ok(Collected::Skipped("backup disabled by configuration".into())),
        };

        let destination = workspace.resolve(BACKUP_FILE_NAME)?;
        info!("Check the device screen and confirm the backup, without setting a password");

        self.bridge
            .backup(device, &destination, &args)
            .await
            .context("Failed to start backup")?
            .into_stdout("adb backup")?;

        // A declined prompt still exits 0 but leaves an empty or missing file
        let size = fs::metadata(&destination).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            let _ = fs::remove_file(&destination);
            bail!("backup produced no data, was it declined on the device?");
        }

        info!("Backup of {} bytes stored in {}", size, BACKUP_FILE_NAME);
        Ok(Collected::Artifacts(vec![PathBuf::from(BACKUP_FILE_NAME)]))
    }
}
