use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StepKind;

/// How a single pipeline step ended
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    Failed(String),
    Skipped(String),
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Success)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StepOutcome::Skipped(_))
    }
}

/// Outcome record of one pipeline step, kept for every step exactly once
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StepResult {
    pub step: StepKind,
    pub outcome: StepOutcome,
    /// Files produced by the step, relative to the workspace
    pub artifacts: Vec<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Identity of the acquired device, read when the session is initialized
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    pub serial: String,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub android_version: Option<String>,
    pub sdk_version: Option<String>,
    pub build_fingerprint: Option<String>,
}
