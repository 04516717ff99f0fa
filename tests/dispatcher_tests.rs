//! Tests for single-command dispatch: batching, clamping, transport renewal
//! and per-host failure isolation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use pretty_assertions::assert_eq;
use remote_multicommand::connection::LogLevel;
use remote_multicommand::error::{Error, InputError};
use remote_multicommand::executor::{Dispatcher, RunOptions};

// ============================================================================
// Result shape
// ============================================================================

#[tokio::test]
async fn test_one_outcome_per_host_in_input_order() {
    let state = MockState::new();
    let mut dispatcher = Dispatcher::new(state.prototype());
    let targets = hosts(7);

    let report = dispatcher
        .dispatch("uptime", &targets, &RunOptions::new(3))
        .await
        .unwrap();

    assert_eq!(report.len(), 7);
    let keys: Vec<_> = report.iter().map(|(h, _)| h.to_string()).collect();
    assert_eq!(keys, targets);
    for (host, outcome) in report.iter() {
        assert!(outcome.access_granted);
        assert!(outcome.succeeded);
        assert_eq!(outcome.command, "uptime");
        assert_eq!(outcome.output, format!("uptime on {}", host));
    }
}

#[tokio::test]
async fn test_failures_are_recorded_per_host() {
    let state = MockState::new();
    state.fail_command("host1", "id");
    state.fail_connect("host2", ConnectFailure::Refused);
    let mut dispatcher = Dispatcher::new(state.prototype());

    let report = dispatcher
        .dispatch("id", &hosts(4), &RunOptions::new(2))
        .await
        .unwrap();

    let failed = report.get("host1").unwrap();
    assert!(failed.access_granted);
    assert!(!failed.succeeded);
    assert_eq!(failed.output, "id failed on host1");

    let unreachable = report.get("host2").unwrap();
    assert!(!unreachable.access_granted);
    assert!(!unreachable.succeeded);
    assert!(unreachable.output.contains("refused the connection"));

    assert!(report.get("host0").unwrap().succeeded);
    assert!(report.get("host3").unwrap().succeeded);
    assert_eq!(report.failed_hosts().collect::<Vec<_>>(), vec!["host1", "host2"]);
}

#[tokio::test]
async fn test_every_session_is_closed() {
    let state = MockState::new();
    let mut dispatcher = Dispatcher::new(state.prototype());

    dispatcher
        .dispatch("ls", &hosts(3), &RunOptions::new(3))
        .await
        .unwrap();

    for host in hosts(3) {
        let calls: Vec<_> = state
            .calls()
            .into_iter()
            .filter(|call| match call {
                Call::Connect { host: h, .. } => *h == host,
                Call::Execute { host: h, .. } | Call::Close { host: h } => *h == host,
            })
            .collect();
        assert_eq!(calls.len(), 3, "connect, execute and close for {}", host);
        assert!(matches!(calls[2], Call::Close { .. }));
    }
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn test_workers_clamped_to_host_count() {
    let state = MockState::new();
    state.set_delay(Duration::from_millis(50));
    let callback = RecordingCallback::new();
    let mut dispatcher = Dispatcher::new(state.prototype()).with_callback(callback.clone());

    dispatcher
        .dispatch("uptime", &hosts(3), &RunOptions::new(10))
        .await
        .unwrap();

    assert_eq!(dispatcher.worker_count(), 3);
    assert_eq!(state.instances(), 3);
    assert_eq!(state.peak_concurrency(), 3);

    let batches: Vec<_> = callback
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::BatchStart { .. }))
        .collect();
    assert_eq!(batches.len(), 1);
}

#[tokio::test]
async fn test_batches_never_exceed_max_concurrency() {
    let state = MockState::new();
    state.set_delay(Duration::from_millis(20));
    let callback = RecordingCallback::new();
    let mut dispatcher = Dispatcher::new(state.prototype()).with_callback(callback.clone());

    let report = dispatcher
        .dispatch("uptime", &hosts(10), &RunOptions::new(4))
        .await
        .unwrap();

    assert_eq!(report.len(), 10);
    assert_eq!(state.peak_concurrency(), 4);
    assert_eq!(dispatcher.worker_count(), 4);

    let events = callback.events();
    assert_eq!(
        events[0],
        Event::DispatchStart {
            command: "uptime".into(),
            hosts: 10,
            batches: 3,
        }
    );
    let batch_sizes: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::BatchStart { hosts, .. } => Some(hosts.len()),
            _ => None,
        })
        .collect();
    assert_eq!(batch_sizes, vec![4, 4, 2]);
    assert_eq!(
        events.last().unwrap(),
        &Event::DispatchComplete {
            command: "uptime".into()
        }
    );
}

#[tokio::test]
async fn test_clamping_matches_exact_concurrency() {
    let clamped_state = MockState::new();
    let exact_state = MockState::new();
    let targets = hosts(4);

    let clamped = Dispatcher::new(clamped_state.prototype())
        .dispatch("hostname", &targets, &RunOptions::new(100))
        .await
        .unwrap();
    let exact = Dispatcher::new(exact_state.prototype())
        .dispatch("hostname", &targets, &RunOptions::new(4))
        .await
        .unwrap();

    assert_eq!(clamped, exact);
    assert_eq!(clamped_state.instances(), exact_state.instances());
}

// ============================================================================
// Transport renewal
// ============================================================================

#[tokio::test]
async fn test_identity_mismatch_keeps_transport() {
    let state = MockState::new();
    state.fail_connect("host0", ConnectFailure::Identity);
    let mut dispatcher = Dispatcher::new(state.prototype());

    let options = RunOptions::new(1);
    let report = dispatcher.dispatch("id", &["host0"], &options).await.unwrap();
    let outcome = report.get("host0").unwrap();
    assert!(!outcome.access_granted);
    assert!(outcome.output.contains("not registered in DNS domain"));

    dispatcher.dispatch("id", &["host0"], &options).await.unwrap();
    assert_eq!(state.instances(), 1);
    assert_eq!(state.connect_instances("host0"), vec![1, 1]);
}

#[tokio::test]
async fn test_other_connect_failures_renew_transport() {
    let state = MockState::new();
    state.fail_connect("host0", ConnectFailure::Refused);
    let mut dispatcher = Dispatcher::new(state.prototype());

    let options = RunOptions::new(1);
    let report = dispatcher.dispatch("id", &["host0"], &options).await.unwrap();
    assert!(!report.get("host0").unwrap().access_granted);

    dispatcher.dispatch("id", &["host0"], &options).await.unwrap();
    assert_eq!(state.instances(), 3);
    assert_eq!(state.connect_instances("host0"), vec![1, 2]);
    assert_eq!(dispatcher.worker_count(), 1);
}

#[tokio::test]
async fn test_renewed_slot_serves_the_next_batch() {
    let state = MockState::new();
    state.fail_connect("host0", ConnectFailure::Refused);
    let mut dispatcher = Dispatcher::new(state.prototype());

    let report = dispatcher
        .dispatch("id", &["host0", "host1"], &RunOptions::new(1))
        .await
        .unwrap();

    assert!(report.get("host1").unwrap().succeeded);
    assert_eq!(state.connect_instances("host0"), vec![1]);
    assert_eq!(state.connect_instances("host1"), vec![2]);
}

#[tokio::test]
async fn test_log_level_forwarded_to_transports() {
    let state = MockState::new();
    let mut dispatcher = Dispatcher::new(state.prototype());

    dispatcher
        .dispatch(
            "id",
            &hosts(2),
            &RunOptions::new(2).log_level(LogLevel::Debug),
        )
        .await
        .unwrap();

    let levels = state.log_levels();
    assert!(!levels.is_empty());
    assert!(levels.iter().all(|l| *l == LogLevel::Debug));
}

// ============================================================================
// Robustness
// ============================================================================

#[tokio::test]
async fn test_worker_panic_is_isolated() {
    let state = MockState::new();
    state.panic_on("host1");
    let mut dispatcher = Dispatcher::new(state.prototype());

    let report = dispatcher
        .dispatch("id", &hosts(3), &RunOptions::new(3))
        .await
        .unwrap();

    assert_eq!(report.len(), 3);
    assert!(!report.get("host1").unwrap().succeeded);
    assert!(report.get("host0").unwrap().succeeded);
    assert!(report.get("host2").unwrap().succeeded);
    // The lost slot is refilled
    assert_eq!(dispatcher.worker_count(), 3);
    assert_eq!(state.instances(), 4);
}

#[tokio::test]
async fn test_repeated_dispatch_is_idempotent() {
    let state = MockState::new();
    let mut dispatcher = Dispatcher::new(state.prototype());
    let targets = hosts(5);
    let options = RunOptions::new(2);

    let first = dispatcher.dispatch("date +%Y", &targets, &options).await.unwrap();
    let second = dispatcher.dispatch("date +%Y", &targets, &options).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(state.instances(), 2);
}

// ============================================================================
// Input validation
// ============================================================================

#[tokio::test]
async fn test_empty_host_list_is_rejected_without_calls() {
    let state = MockState::new();
    let mut dispatcher = Dispatcher::new(state.prototype());

    let err = dispatcher
        .dispatch::<String>("id", &[], &RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MalformedInput(InputError::EmptyHostList)));
    assert_eq!(state.call_count(), 0);
    assert_eq!(state.instances(), 0);
}

#[tokio::test]
async fn test_duplicate_hosts_and_zero_concurrency_are_rejected() {
    let state = MockState::new();
    let callback = RecordingCallback::new();
    let mut dispatcher =
        Dispatcher::new(state.prototype()).with_callback(Arc::clone(&callback) as _);

    let err = dispatcher
        .dispatch("id", &["a", "b", "a"], &RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::MalformedInput(InputError::DuplicateHost(ref h)) if h == "a"
    ));

    let err = dispatcher
        .dispatch("id", &["a"], &RunOptions::new(0))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedInput(InputError::ZeroConcurrency)));

    assert_eq!(state.call_count(), 0);
    assert!(callback.events().is_empty());
}
