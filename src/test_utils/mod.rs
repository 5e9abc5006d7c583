//! Test utilities for android_collector
//!
//! Mock devices, collectors and configurations shared by unit tests.

#![cfg(test)]

use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;

use crate::collectors::collector::MockEvidenceCollector;
use crate::collectors::Collected;
use crate::config::{AcquisitionConfig, StepKind};
use crate::device::bridge::{CommandOutput, DeviceEntry, MockDeviceBridge};
use crate::pipeline::Step;

pub const TEST_SERIAL: &str = "28031FDH2001AB";

pub const TEST_GETPROP: &str = "[ro.build.version.release]: [14]\n\
                                [ro.build.version.sdk]: [34]\n\
                                [ro.product.manufacturer]: [Google]\n\
                                [ro.product.model]: [Pixel 7]\n\
                                [ro.serialno]: [28031FDH2001AB]\n";

/// A bridge with one authorized device that answers `getprop`
pub fn connected_bridge() -> MockDeviceBridge {
    let mut bridge = MockDeviceBridge::new();
    bridge
        .expect_devices()
        .returning(|| Ok(vec![DeviceEntry::new(TEST_SERIAL, "device")]));
    bridge
        .expect_shell()
        .returning(|_, _| Ok(CommandOutput::ok(TEST_GETPROP)));
    bridge.expect_kill_server().returning(|| Ok(()));
    bridge
}

/// A bridge whose device is attached but refuses every shell command
pub fn refusing_bridge() -> MockDeviceBridge {
    let mut bridge = MockDeviceBridge::new();
    bridge
        .expect_devices()
        .returning(|| Ok(vec![DeviceEntry::new(TEST_SERIAL, "device")]));
    bridge
        .expect_shell()
        .returning(|_, _| Ok(CommandOutput::failed("error: closed")));
    bridge.expect_kill_server().returning(|| Ok(()));
    bridge
}

/// Collector writing one artifact with fixed content
pub fn writing_collector(file: &'static str, content: &'static str) -> Arc<MockEvidenceCollector> {
    let mut collector = MockEvidenceCollector::new();
    collector.expect_collect().times(1).returning(move |_, workspace| {
        let path = workspace.write_artifact(file, content.as_bytes())?;
        Ok(Collected::Artifacts(vec![path]))
    });
    Arc::new(collector)
}

/// Collector that always fails with `reason`
pub fn failing_collector(reason: &'static str) -> Arc<MockEvidenceCollector> {
    let mut collector = MockEvidenceCollector::new();
    collector
        .expect_collect()
        .times(1)
        .returning(move |_, _| Err(anyhow!(reason)));
    Arc::new(collector)
}

/// Collector that must never be invoked
pub fn unused_collector() -> Arc<MockEvidenceCollector> {
    let mut collector = MockEvidenceCollector::new();
    collector.expect_collect().times(0);
    Arc::new(collector)
}

/// Three-step pipeline whose middle step fails
pub fn small_pipeline() -> Vec<Step> {
    vec![
        Step::new(StepKind::Properties, writing_collector("getprop.txt", TEST_GETPROP)),
        Step::new(StepKind::Processes, failing_collector("ps: Permission denied")),
        Step::new(StepKind::Services, writing_collector("services.txt", "Found 0 services:\n")),
    ]
}

/// Configuration writing into `output` with a fast discovery retry
pub fn test_config(output: &Path) -> AcquisitionConfig {
    AcquisitionConfig {
        output_dir: output.to_path_buf(),
        discovery_retry_secs: 1,
        ..AcquisitionConfig::default()
    }
}
