//! Collectors for Android devices reached through a [`DeviceBridge`](crate::device::DeviceBridge)

pub mod applications;
pub mod backup;
pub mod pull;
pub mod shell;

pub use applications::{parse_package_list, ApkDownload, ApplicationsCollector, PackageInfo};
pub use backup::BackupCollector;
pub use pull::PullCollector;
pub use shell::{ShellCapture, ShellCommandCollector};
