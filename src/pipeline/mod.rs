//! The fixed acquisition pipeline.
//!
//! The pipeline is a declarative, ordered list of [`Step`]s. Steps that need
//! the operator to confirm something on the device run first.

use std::sync::Arc;

use crate::collectors::android::{ApplicationsCollector, BackupCollector, PullCollector, ShellCommandCollector};
use crate::collectors::EvidenceCollector;
use crate::config::{AcquisitionConfig, StepKind};
use crate::device::DeviceBridge;

pub mod runner;
pub mod step;

pub use runner::StepRunner;
pub use step::Step;

/// Collector backing a step
pub fn collector_for(
    kind: StepKind,
    bridge: Arc<dyn DeviceBridge>,
    config: &AcquisitionConfig,
) -> Arc<dyn EvidenceCollector> {
    match kind {
        StepKind::Backup => Arc::new(BackupCollector::new(bridge, config.backup)),
        StepKind::Applications => Arc::new(ApplicationsCollector::new(bridge, config.applications)),
        StepKind::Properties => Arc::new(ShellCommandCollector::properties(bridge)),
        StepKind::Settings => Arc::new(ShellCommandCollector::settings(bridge)),
        StepKind::Processes => Arc::new(ShellCommandCollector::processes(bridge)),
        StepKind::Environment => Arc::new(ShellCommandCollector::environment(bridge)),
        StepKind::Services => Arc::new(ShellCommandCollector::services(bridge)),
        StepKind::Logcat => Arc::new(ShellCommandCollector::logcat(bridge)),
        StepKind::SystemLogs => Arc::new(PullCollector::system_logs(bridge)),
        StepKind::SystemDumps => Arc::new(ShellCommandCollector::dumpsys(bridge)),
        StepKind::FileListing => Arc::new(ShellCommandCollector::file_listing(bridge)),
        StepKind::TempFolder => Arc::new(PullCollector::temp_folder(bridge)),
    }
}

/// Every step in pipeline order
pub fn default_pipeline(bridge: Arc<dyn DeviceBridge>, config: &AcquisitionConfig) -> Vec<Step> {
    StepKind::ORDERED
        .iter()
        .map(|&kind| Step::new(kind, collector_for(kind, Arc::clone(&bridge), config)))
        .collect()
}

/// Runner for the default pipeline with the configured steps disabled
pub fn default_runner(bridge: Arc<dyn DeviceBridge>, config: &AcquisitionConfig) -> StepRunner {
    StepRunner::new(default_pipeline(bridge, config)).with_disabled(config.disabled_steps.iter().copied())
}
