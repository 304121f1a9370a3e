//! Failover scenarios driven by a scripted probe.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{endpoints, scripted_coordinator, settings};
use endpoint_failover::config::CoordinatorConfig;
use endpoint_failover::failover::CoordinatorState;
use endpoint_failover::{FailbackPolicy, FailoverError, FailoverKind};

#[tokio::test]
async fn primary_failure_switches_to_backup_after_threshold() {
    let eps = endpoints(2);
    let (coordinator, probe, recorder) =
        scripted_coordinator(eps.clone(), 3, settings(FailbackPolicy::Manual));
    probe.set_healthy(&eps[0], false);

    coordinator.run_health_check().await;
    coordinator.run_health_check().await;
    assert_eq!(coordinator.active_index(), 0);
    assert!(recorder.events().is_empty());

    coordinator.run_health_check().await;
    assert_eq!(coordinator.active_index(), 1);
    assert_eq!(coordinator.active_endpoint(), &eps[1]);
    assert_eq!(coordinator.state(), CoordinatorState::FailedOver);

    let events = recorder.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), FailoverKind::Failover);
    assert_eq!(events[0].from_endpoint(), &eps[0]);
    assert_eq!(events[0].to_endpoint(), Some(&eps[1]));
    assert_eq!(recorder.resets(), 1);
}

#[tokio::test]
async fn total_outage_reports_once_and_keeps_selection() {
    let eps = endpoints(2);
    let (coordinator, probe, recorder) =
        scripted_coordinator(eps.clone(), 3, settings(FailbackPolicy::Manual));
    probe.set_healthy(&eps[0], false);
    probe.set_healthy(&eps[1], false);

    for _ in 0..8 {
        coordinator.run_health_check().await;
    }

    assert_eq!(recorder.kinds(), vec![FailoverKind::AllEndpointsDown]);
    assert_eq!(recorder.events()[0].to_endpoint(), None);
    assert_eq!(recorder.resets(), 0);
    assert_eq!(coordinator.active_index(), 0);
    assert_eq!(coordinator.state(), CoordinatorState::AllDown);
    assert!(coordinator.health_status().all_down);

    probe.set_healthy(&eps[0], true);
    coordinator.run_health_check().await;
    assert_eq!(coordinator.state(), CoordinatorState::OnPrimary);
    assert_eq!(coordinator.health_status().consecutive_failures, 0);
    assert_eq!(recorder.events().len(), 1);
}

#[tokio::test]
async fn outage_after_recovery_is_reported_again() {
    let eps = endpoints(2);
    let (coordinator, probe, recorder) =
        scripted_coordinator(eps.clone(), 1, settings(FailbackPolicy::Manual));
    probe.set_healthy(&eps[0], false);
    probe.set_healthy(&eps[1], false);

    coordinator.run_health_check().await;
    coordinator.run_health_check().await;
    probe.set_healthy(&eps[0], true);
    coordinator.run_health_check().await;
    probe.set_healthy(&eps[0], false);
    coordinator.run_health_check().await;

    assert_eq!(
        recorder.kinds(),
        vec![FailoverKind::AllEndpointsDown, FailoverKind::AllEndpointsDown]
    );
}

#[tokio::test]
async fn single_endpoint_can_only_report_outage() {
    let eps = endpoints(1);
    let (coordinator, probe, recorder) =
        scripted_coordinator(eps.clone(), 2, settings(FailbackPolicy::Manual));
    probe.set_healthy(&eps[0], false);

    coordinator.run_health_check().await;
    coordinator.run_health_check().await;

    assert_eq!(recorder.kinds(), vec![FailoverKind::AllEndpointsDown]);
    assert_eq!(coordinator.active_endpoint(), &eps[0]);
    assert_eq!(recorder.resets(), 0);
}

#[tokio::test]
async fn scan_follows_ring_order_and_wraps() {
    let eps = endpoints(4);
    let (coordinator, probe, recorder) =
        scripted_coordinator(eps.clone(), 1, settings(FailbackPolicy::Manual));

    probe.set_healthy(&eps[0], false);
    probe.set_healthy(&eps[1], false);
    coordinator.run_health_check().await;
    assert_eq!(coordinator.active_index(), 2);

    // From index 2 the scan visits 3, then wraps to 0.
    probe.set_healthy(&eps[0], true);
    probe.set_healthy(&eps[2], false);
    probe.set_healthy(&eps[3], false);
    coordinator.run_health_check().await;
    assert_eq!(coordinator.active_index(), 0);
    assert_eq!(probe.probe_count(&eps[1]), 1);

    let events = recorder.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].kind(), FailoverKind::Failover);
    assert_eq!(events[1].from_endpoint(), &eps[2]);
    assert_eq!(events[1].to_endpoint(), Some(&eps[0]));
}

#[tokio::test]
async fn new_active_endpoint_starts_with_clean_history() {
    let eps = endpoints(3);
    let (coordinator, probe, recorder) =
        scripted_coordinator(eps.clone(), 3, settings(FailbackPolicy::Manual));
    probe.set_healthy(&eps[0], false);
    for _ in 0..3 {
        coordinator.run_health_check().await;
    }
    assert_eq!(coordinator.active_index(), 1);
    assert_eq!(coordinator.health_status().consecutive_failures, 0);
    assert!(coordinator.health_status().healthy);

    probe.set_healthy(&eps[1], false);
    coordinator.run_health_check().await;
    coordinator.run_health_check().await;
    assert_eq!(coordinator.active_index(), 1);
    assert_eq!(coordinator.health_status().consecutive_failures, 2);

    coordinator.run_health_check().await;
    assert_eq!(coordinator.active_index(), 2);
    assert_eq!(recorder.kinds(), vec![FailoverKind::Failover, FailoverKind::Failover]);
}

#[tokio::test]
async fn recovery_check_reports_without_failing_back() {
    let eps = endpoints(2);
    let (coordinator, probe, recorder) =
        scripted_coordinator(eps.clone(), 1, settings(FailbackPolicy::Manual));
    probe.set_healthy(&eps[0], false);
    coordinator.run_health_check().await;
    assert_eq!(coordinator.active_index(), 1);

    coordinator.run_recovery_check().await;
    assert_eq!(recorder.kinds(), vec![FailoverKind::Failover]);

    probe.set_healthy(&eps[0], true);
    coordinator.run_recovery_check().await;
    coordinator.run_recovery_check().await;

    assert_eq!(coordinator.active_index(), 1);
    let events = recorder.events();
    assert_eq!(
        recorder.kinds(),
        vec![
            FailoverKind::Failover,
            FailoverKind::PrimaryRecovered,
            FailoverKind::PrimaryRecovered
        ]
    );
    assert_eq!(events[1].from_endpoint(), &eps[1]);
    assert_eq!(events[1].to_endpoint(), Some(&eps[0]));
    assert_eq!(recorder.resets(), 1);
}

#[tokio::test]
async fn recovery_check_is_idle_on_primary() {
    let eps = endpoints(2);
    let (coordinator, probe, recorder) =
        scripted_coordinator(eps.clone(), 1, settings(FailbackPolicy::Manual));

    coordinator.run_recovery_check().await;

    assert_eq!(probe.probe_count(&eps[0]), 0);
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn automatic_failback_waits_for_stable_checks() {
    let eps = endpoints(2);
    let (coordinator, probe, recorder) = scripted_coordinator(
        eps.clone(),
        1,
        settings(FailbackPolicy::Automatic { stable_checks: 2 }),
    );
    probe.set_healthy(&eps[0], false);
    coordinator.run_health_check().await;

    // A failed check in between restarts the streak.
    probe.set_healthy(&eps[0], true);
    coordinator.run_recovery_check().await;
    probe.set_healthy(&eps[0], false);
    coordinator.run_recovery_check().await;
    probe.set_healthy(&eps[0], true);
    coordinator.run_recovery_check().await;
    assert_eq!(coordinator.active_index(), 1);

    coordinator.run_recovery_check().await;
    assert_eq!(coordinator.active_index(), 0);
    assert_eq!(
        recorder.kinds(),
        vec![
            FailoverKind::Failover,
            FailoverKind::PrimaryRecovered,
            FailoverKind::PrimaryRecovered,
            FailoverKind::PrimaryRecovered,
            FailoverKind::Failback
        ]
    );
    assert_eq!(recorder.resets(), 2);
}

#[tokio::test]
async fn explicit_failback_requires_healthy_primary() {
    let eps = endpoints(2);
    let (coordinator, probe, recorder) =
        scripted_coordinator(eps.clone(), 1, settings(FailbackPolicy::Manual));
    probe.set_healthy(&eps[0], false);
    coordinator.run_health_check().await;

    let err = coordinator.failback_to_primary().await.unwrap_err();
    assert!(matches!(err, FailoverError::PrimaryUnhealthy(ref ep) if ep == &eps[0]));
    assert_eq!(coordinator.active_index(), 1);

    probe.set_healthy(&eps[0], true);
    coordinator.failback_to_primary().await.unwrap();
    assert!(coordinator.is_on_primary());
    assert_eq!(coordinator.health_status().consecutive_failures, 0);

    let events = recorder.events();
    assert_eq!(events.last().unwrap().kind(), FailoverKind::Failback);
    assert_eq!(events.last().unwrap().from_endpoint(), &eps[1]);
    assert_eq!(recorder.resets(), 2);
}

#[tokio::test]
async fn slow_failure_of_old_endpoint_does_not_count_against_primary() {
    let eps = endpoints(2);
    let (coordinator, probe, recorder) =
        scripted_coordinator(eps.clone(), 3, settings(FailbackPolicy::Manual));
    probe.set_healthy(&eps[0], false);
    for _ in 0..3 {
        coordinator.run_health_check().await;
    }
    assert_eq!(coordinator.active_index(), 1);

    // The check on the backup is still running when the failback commits.
    probe.set_healthy(&eps[0], true);
    probe.set_healthy(&eps[1], false);
    probe.set_delay(&eps[1], Duration::from_millis(200));
    let (_, failback) = tokio::join!(coordinator.run_health_check(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        coordinator.failback_to_primary().await
    });

    failback.unwrap();
    assert!(coordinator.is_on_primary());
    assert_eq!(coordinator.health_status().consecutive_failures, 0);
    assert_eq!(recorder.kinds(), vec![FailoverKind::Failover, FailoverKind::Failback]);

    // The primary still needs a full threshold of its own failures.
    probe.set_healthy(&eps[0], false);
    probe.set_delay(&eps[1], Duration::ZERO);
    probe.set_healthy(&eps[1], true);
    coordinator.run_health_check().await;
    coordinator.run_health_check().await;
    assert!(coordinator.is_on_primary());
    coordinator.run_health_check().await;
    assert_eq!(coordinator.active_index(), 1);
}

#[tokio::test]
async fn panicking_listener_does_not_stop_transitions() {
    let eps = endpoints(3);
    let (coordinator, probe, recorder) =
        scripted_coordinator(eps.clone(), 1, settings(FailbackPolicy::Manual));
    coordinator.set_failover_listener(|_| panic!("listener failure"));
    let mut rx = coordinator.subscribe();

    probe.set_healthy(&eps[0], false);
    coordinator.run_health_check().await;
    probe.set_healthy(&eps[1], false);
    coordinator.run_health_check().await;

    assert_eq!(coordinator.active_index(), 2);
    assert_eq!(recorder.resets(), 2);
    assert_eq!(rx.try_recv().unwrap().kind(), FailoverKind::Failover);
    assert_eq!(rx.try_recv().unwrap().to_endpoint(), Some(&eps[2]));
}

#[tokio::test]
async fn last_registered_reset_callback_wins() {
    let eps = endpoints(2);
    let (coordinator, probe, recorder) =
        scripted_coordinator(eps.clone(), 1, settings(FailbackPolicy::Manual));
    let replaced = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&replaced);
    coordinator.set_connection_reset_callback(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    probe.set_healthy(&eps[0], false);
    coordinator.run_health_check().await;

    assert_eq!(replaced.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.resets(), 0);
}

#[tokio::test]
async fn periodic_tasks_fail_over_and_stop_cleanly() {
    let eps = endpoints(3);
    let config = CoordinatorConfig {
        health_check_interval_ms: 10,
        recovery_check_interval_ms: 10,
        shutdown_grace_ms: 1000,
        failback: FailbackPolicy::Manual,
    };
    let (coordinator, probe, recorder) = scripted_coordinator(eps.clone(), 2, config);
    probe.set_healthy(&eps[0], false);

    coordinator.start().unwrap();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while coordinator.active_index() != 1 {
        assert!(tokio::time::Instant::now() < deadline, "failover did not happen");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    coordinator.stop().await;
    assert!(!coordinator.is_running());
    let seen = recorder.events().len();
    let probed: Vec<usize> = eps.iter().map(|ep| probe.probe_count(ep)).collect();

    // Nothing moves once stopped, even with the active endpoint down.
    probe.set_healthy(&eps[0], true);
    probe.set_healthy(&eps[1], false);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(coordinator.active_index(), 1);
    assert_eq!(recorder.events().len(), seen);
    let probed_later: Vec<usize> = eps.iter().map(|ep| probe.probe_count(ep)).collect();
    assert_eq!(probed_later, probed, "endpoints probed after stop");
}

#[tokio::test]
async fn restart_after_stop_resumes_checks() {
    let eps = endpoints(2);
    let config = CoordinatorConfig {
        health_check_interval_ms: 10,
        recovery_check_interval_ms: 1000,
        shutdown_grace_ms: 1000,
        failback: FailbackPolicy::Manual,
    };
    let (coordinator, probe, _recorder) = scripted_coordinator(eps.clone(), 1, config);

    coordinator.start().unwrap();
    coordinator.stop().await;
    probe.set_healthy(&eps[0], false);
    coordinator.start().unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while coordinator.is_on_primary() {
        assert!(tokio::time::Instant::now() < deadline, "failover did not happen");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    coordinator.stop().await;
    assert_eq!(coordinator.active_endpoint(), &eps[1]);
}
