//! Evidence collectors.
//!
//! Every acquisition step is backed by one [`EvidenceCollector`]. Collectors
//! are independent of each other: each one talks to the device through the
//! bridge, writes into the session workspace and reports what it left there.
//! A failing collector never stops the ones after it.
//!
//! ## Collector Types
//!
//! - **Backup**: `adb backup` of SMS or the whole device
//! - **Applications**: package listing and APK download
//! - **Shell captures**: properties, settings, processes, environment,
//!   services, logcat, dumpsys and the file listing
//! - **Pulls**: system logs and the temporary folder

/// Core collector trait and shared helpers
pub mod collector;

/// Android collectors, one per acquisition step
pub mod android;

/// Permission refusal tracking
pub mod permission_tracker;

pub use collector::{partial_artifacts, Collected, EvidenceCollector, PartialCollection};
pub use permission_tracker::PermissionTracker;
