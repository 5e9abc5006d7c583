use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Acquisition steps, one per evidence collector
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Backup,
    Applications,
    Properties,
    Settings,
    Processes,
    Environment,
    Services,
    Logcat,
    SystemLogs,
    SystemDumps,
    FileListing,
    TempFolder,
}

impl StepKind {
    /// Fixed pipeline order. Steps that wait on the operator come first so the
    /// automated steps are never blocked behind a prompt on the device.
    pub const ORDERED: [StepKind; 12] = [
        StepKind::Backup,
        StepKind::Applications,
        StepKind::Properties,
        StepKind::Settings,
        StepKind::Processes,
        StepKind::Environment,
        StepKind::Services,
        StepKind::Logcat,
        StepKind::SystemLogs,
        StepKind::SystemDumps,
        StepKind::FileListing,
        StepKind::TempFolder,
    ];

    /// Stable identifier used in config files, logs and reports
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Backup => "backup",
            StepKind::Applications => "applications",
            StepKind::Properties => "properties",
            StepKind::Settings => "settings",
            StepKind::Processes => "processes",
            StepKind::Environment => "environment",
            StepKind::Services => "services",
            StepKind::Logcat => "logcat",
            StepKind::SystemLogs => "system_logs",
            StepKind::SystemDumps => "system_dumps",
            StepKind::FileListing => "file_listing",
            StepKind::TempFolder => "temp_folder",
        }
    }

    /// Operator-facing description of the step's action
    pub fn action(&self) -> &'static str {
        match self {
            StepKind::Backup => "create backup",
            StepKind::Applications => "download APKs",
            StepKind::Properties => "get device properties",
            StepKind::Settings => "get device settings",
            StepKind::Processes => "get list of running processes",
            StepKind::Environment => "get list of environment variables",
            StepKind::Services => "get list of running services",
            StepKind::Logcat => "get logcat from device",
            StepKind::SystemLogs => "download logs from device",
            StepKind::SystemDumps => "get output of dumpsys",
            StepKind::FileListing => "get a list of files",
            StepKind::TempFolder => "get files in tmp folder",
        }
    }

    /// Whether the step may wait for someone to confirm a prompt on the device
    pub fn requires_interaction(&self) -> bool {
        matches!(self, StepKind::Backup | StepKind::Applications)
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for StepKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        StepKind::ORDERED
            .iter()
            .copied()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| anyhow::anyhow!("Unknown acquisition step: {}", s))
    }
}

/// What the backup step asks the device to back up
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BackupScope {
    /// Only the SMS/MMS provider
    #[default]
    Sms,
    /// Every package that allows backup
    Everything,
    /// Do not take a backup
    None,
}

/// Which installed applications get their APKs pulled
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ApkDownloadPolicy {
    /// Every installed package
    All,
    /// Only packages outside the system image
    #[default]
    NonSystem,
    /// Only list packages, do not pull APKs
    None,
}
