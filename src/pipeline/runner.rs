use std::collections::HashSet;

use chrono::Utc;
use log::{error, info};

use crate::collectors::{partial_artifacts, Collected, PermissionTracker};
use crate::config::StepKind;
use crate::device::DeviceHandle;
use crate::models::{StepOutcome, StepResult};
use crate::pipeline::step::Step;
use crate::session::{AcquisitionSession, SessionError};

/// Runs the pipeline against a running session, one step at a time.
///
/// A failing step is recorded and reported, then the next step runs. Every
/// step ends up with exactly one [`StepResult`] in the session log.
pub struct StepRunner {
    steps: Vec<Step>,
    disabled: HashSet<StepKind>,
    permissions: PermissionTracker,
}

impl StepRunner {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            disabled: HashSet::new(),
            permissions: PermissionTracker::new(),
        }
    }

    pub fn with_disabled(mut self, disabled: impl IntoIterator<Item = StepKind>) -> Self {
        self.disabled.extend(disabled);
        self
    }

    pub fn steps(&self) -> impl Iterator<Item = StepKind> + '_ {
        self.steps.iter().map(|step| step.kind)
    }

    pub fn permissions(&self) -> &PermissionTracker {
        &self.permissions
    }

    /// Run every step. Only session protocol errors abort the run.
    pub async fn run(
        &self,
        session: &mut AcquisitionSession,
        device: &DeviceHandle,
    ) -> Result<Vec<StepResult>, SessionError> {
        let total = self.steps.len();
        let mut results = Vec::with_capacity(total);

        for (index, step) in self.steps.iter().enumerate() {
            let workspace = session.running_workspace()?.clone();
            let started_at = Utc::now();

            let (outcome, artifacts) = if self.disabled.contains(&step.kind) {
                info!("[{}/{}] Skipping {} (disabled)", index + 1, total, step.kind);
                (StepOutcome::Skipped("disabled by configuration".into()), Vec::new())
            } else {
                info!("[{}/{}] Trying to {}...", index + 1, total, step.kind.action());

                match step.collector.collect(device, &workspace).await {
                    Ok(Collected::Artifacts(artifacts)) => (StepOutcome::Success, artifacts),
                    Ok(Collected::Skipped(reason)) => {
                        info!("Skipped {}: {}", step.kind, reason);
                        (StepOutcome::Skipped(reason), Vec::new())
                    }
                    Err(e) => {
                        let reason = format!("{:#}", e);
                        error!("Failed to {}: {}", step.kind.action(), reason);

                        if PermissionTracker::is_permission_error(&reason) {
                            self.permissions.record_permission_failure(step.kind).await;
                        }
                        (StepOutcome::Failed(reason), partial_artifacts(&e))
                    }
                }
            };

            let result = StepResult {
                step: step.kind,
                outcome,
                artifacts,
                started_at,
                finished_at: Utc::now(),
            };
            session.record(result.clone())?;
            results.push(result);
        }

        let failed = results.iter().filter(|r| r.outcome.is_failed()).count();
        if failed > 0 {
            info!("Pipeline finished, {} of {} step(s) failed", failed, total);
        } else {
            info!("Pipeline finished, all {} step(s) completed", total);
        }
        self.permissions.report_failures().await;

        Ok(results)
    }
}
