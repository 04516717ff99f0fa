//! Property-based tests for dispatch and sequential runs.

mod common;

use common::*;
use proptest::prelude::*;
use remote_multicommand::executor::{Dispatcher, RunOptions, Sequencer};

fn commands(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("cmd{}", i)).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Every host gets exactly one outcome, whatever the concurrency
    #[test]
    fn dispatch_covers_every_host(host_count in 1usize..12, concurrency in 1usize..16) {
        let state = MockState::new();
        let targets = hosts(host_count);

        let report = tokio_test::block_on(async {
            Dispatcher::new(state.prototype())
                .dispatch("uptime", &targets, &RunOptions::new(concurrency))
                .await
        })
        .unwrap();

        prop_assert_eq!(report.len(), host_count);
        let keys: Vec<String> = report.iter().map(|(h, _)| h.to_string()).collect();
        prop_assert_eq!(keys, targets);
        prop_assert!(state.instances() <= concurrency.min(host_count));
    }

    /// A host's history stops right after its first failed command
    #[test]
    fn history_ends_at_first_failure(
        failures in prop::collection::vec(prop::option::of(0usize..6), 1..6),
        command_count in 1usize..6,
        concurrency in 1usize..4,
    ) {
        let state = MockState::new();
        let targets = hosts(failures.len());
        let script = commands(command_count);
        for (host, failure) in targets.iter().zip(&failures) {
            if let Some(index) = failure {
                if *index < command_count {
                    state.fail_command(host, &script[*index]);
                }
            }
        }

        let report = tokio_test::block_on(async {
            Sequencer::new(state.prototype())
                .run_sequence(script.clone(), &targets, &RunOptions::new(concurrency))
                .await
        })
        .unwrap();

        prop_assert_eq!(report.len(), targets.len());
        for (host, failure) in targets.iter().zip(&failures) {
            let expected_len = match failure {
                Some(index) if *index < command_count => index + 1,
                _ => command_count,
            };
            let history = report.get(host).unwrap();
            prop_assert_eq!(history.len(), expected_len);

            let (last, earlier) = history.outcomes().split_last().unwrap();
            prop_assert!(earlier.iter().all(|o| o.succeeded));
            let fails = matches!(failure, Some(i) if *i < command_count);
            prop_assert_eq!(last.succeeded, !fails);

            let issued: Vec<String> = history.outcomes().iter().map(|o| o.command.clone()).collect();
            prop_assert_eq!(&issued[..], &script[..expected_len]);
            prop_assert_eq!(state.executed_on(host), issued);
        }
    }
}
