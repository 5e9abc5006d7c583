use std::fmt;
use std::sync::Arc;

use crate::collectors::EvidenceCollector;
use crate::config::StepKind;

/// A named pipeline entry
#[derive(Clone)]
pub struct Step {
    pub kind: StepKind,
    pub collector: Arc<dyn EvidenceCollector>,
}

impl Step {
    pub fn new(kind: StepKind, collector: Arc<dyn EvidenceCollector>) -> Self {
        Self { kind, collector }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").field("kind", &self.kind).finish_non_exhaustive()
    }
}
