//! Property checks of the step runner: every step is recorded exactly once,
//! in order, whatever mix of steps fails.

mod common;

use std::fs;
use std::sync::Arc;

use proptest::prelude::*;
use tempfile::TempDir;

use android_collector::collectors::EvidenceCollector;
use android_collector::config::StepKind;
use android_collector::constants::STEP_JOURNAL_FILE_NAME;
use android_collector::device::DeviceHandle;
use android_collector::models::StepResult;
use android_collector::pipeline::{Step, StepRunner};
use android_collector::session::{AcquisitionSession, SessionState};

use common::{FakeBridge, FixedCollector, SERIAL};

fn pipeline(failures: &[bool]) -> Vec<Step> {
    failures
        .iter()
        .zip(StepKind::ORDERED.iter())
        .map(|(fails, kind)| {
            let collector: Arc<dyn EvidenceCollector> = if *fails {
                Arc::new(FixedCollector::failing("/system/bin/sh: Permission denied"))
            } else {
                Arc::new(FixedCollector::succeeding(&format!("{}.txt", kind.name())))
            };
            Step::new(*kind, collector)
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_step_is_recorded_once_in_order(failures in prop::collection::vec(any::<bool>(), 1..=12)) {
        let output = TempDir::new().unwrap();
        let bridge = FakeBridge::connected();
        let device = DeviceHandle::new(SERIAL);
        let steps = pipeline(&failures);
        let expected: Vec<StepKind> = steps.iter().map(|s| s.kind).collect();

        let mut session = AcquisitionSession::new(output.path());
        let results = tokio_test::block_on(async {
            session.initialize(&bridge, &device).await.unwrap();
            session.start().unwrap();
            StepRunner::new(steps).run(&mut session, &device).await.unwrap()
        });

        let kinds: Vec<StepKind> = results.iter().map(|r| r.step).collect();
        prop_assert_eq!(&kinds, &expected);

        let failed = failures.iter().filter(|f| **f).count();
        prop_assert_eq!(session.failed_steps(), failed);
        prop_assert_eq!(results.iter().filter(|r| r.outcome.is_failed()).count(), failed);
        prop_assert_eq!(session.state(), SessionState::Running);

        for (result, fails) in results.iter().zip(&failures) {
            prop_assert_eq!(result.outcome.is_success(), !*fails);
            prop_assert!(result.started_at <= result.finished_at);
            if *fails {
                prop_assert!(result.artifacts.is_empty());
            }
        }

        let workspace = session.workspace().unwrap().root().to_path_buf();
        let journal = fs::read_to_string(workspace.join(STEP_JOURNAL_FILE_NAME)).unwrap();
        let journaled: Vec<StepKind> = journal
            .lines()
            .map(|line| serde_json::from_str::<StepResult>(line).unwrap().step)
            .collect();
        prop_assert_eq!(journaled, expected);
    }
}
