//! Permission error tracking and reporting
//!
//! Steps refused by the device (SELinux, missing root, a locked screen or a
//! revoked USB debugging authorization) are remembered so the operator gets
//! one summary with guidance once the pipeline is over.

use log::warn;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::StepKind;

/// Markers of a permission refusal in device or adb output
const PERMISSION_MARKERS: &[&str] = &[
    "Permission denied",
    "not permitted",
    "SecurityException",
    "unauthorized",
];

/// Tracks steps that failed due to permission errors
#[derive(Debug, Clone, Default)]
pub struct PermissionTracker {
    failed_steps: Arc<Mutex<BTreeSet<StepKind>>>,
}

impl PermissionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a permission failure for a step
    pub async fn record_permission_failure(&self, step: StepKind) {
        let mut failures = self.failed_steps.lock().await;
        failures.insert(step);
    }

    /// Check if an error message indicates a permission problem
    pub fn is_permission_error(error_msg: &str) -> bool {
        PERMISSION_MARKERS.iter().any(|marker| error_msg.contains(marker))
    }

    pub async fn failure_count(&self) -> usize {
        self.failed_steps.lock().await.len()
    }

    pub async fn failed_steps(&self) -> Vec<StepKind> {
        self.failed_steps.lock().await.iter().copied().collect()
    }

    /// Report permission failures and provide guidance
    pub async fn report_failures(&self) {
        let failures = self.failed_steps.lock().await;

        if failures.is_empty() {
            return;
        }

        warn!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        warn!("⚠️  Permission Issues Summary");
        warn!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        warn!("");
        warn!(
            "The following {} step(s) were refused by the device:",
            failures.len()
        );
        warn!("");

        for step in failures.iter() {
            warn!("  • {} ({})", step, step.action());
        }

        warn!("");
        warn!("To collect this evidence, try the following:");
        warn!("");
        warn!("  1. Keep the device unlocked and accept the USB debugging prompt");
        warn!("  2. Re-authorize this computer if the prompt was dismissed: adb kill-server, then reconnect");
        warn!("  3. Paths protected by SELinux can only be read on a rooted device");
        warn!("");
        warn!("Note: Acquisition continued for accessible evidence.");
        warn!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_permission_tracker() {
        let tracker = PermissionTracker::new();

        assert_eq!(tracker.failure_count().await, 0);

        tracker.record_permission_failure(StepKind::SystemLogs).await;
        assert_eq!(tracker.failure_count().await, 1);

        // Duplicate failures only counted once
        tracker.record_permission_failure(StepKind::SystemLogs).await;
        assert_eq!(tracker.failure_count().await, 1);

        tracker.record_permission_failure(StepKind::Backup).await;
        assert_eq!(
            tracker.failed_steps().await,
            vec![StepKind::Backup, StepKind::SystemLogs]
        );

        tracker.report_failures().await;
    }

    #[test]
    fn test_permission_error_detection() {
        assert!(PermissionTracker::is_permission_error(
            "adb: error: failed to stat remote object '/proc/kmsg': Permission denied"
        ));
        assert!(PermissionTracker::is_permission_error(
            "java.lang.SecurityException: Permission Denial: can't dump"
        ));
        assert!(PermissionTracker::is_permission_error("Operation not permitted"));
        assert!(PermissionTracker::is_permission_error("error: device unauthorized."));
        assert!(!PermissionTracker::is_permission_error("No such file or directory"));
        assert!(!PermissionTracker::is_permission_error("error: closed"));
    }
}
