use std::{sync::atomic::Ordering, time::Duration};

use daqlink_shared::CriticalError;
use daqlink_test::{wait_until, Harness};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test]
async fn start_sampling_activates_the_hardware_exactly_once() {
    init_logs();
    let harness = Harness::tracked("AT0");
    harness.connect().await;

    harness.remote_gate.start_sampling();
    harness.remote_gate.start_sampling();
    wait_until("sampling echo", || harness.remote_gate.is_transceiving()).await;
    assert_eq!(harness.driver.start_count(), 1);

    harness.remote_gate.stop_transceiving();
    wait_until("idle echo", || !harness.remote_gate.is_transceiving()).await;
    assert_eq!(harness.driver.stop_count(), 1);
}

#[tokio::test]
async fn stop_while_idle_does_not_touch_the_hardware() {
    init_logs();
    let harness = Harness::tracked("AT0");
    harness.connect().await;

    harness.remote_gate.stop_transceiving();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.driver.stop_count(), 0);
    assert!(!harness.remote_gate.is_transceiving());
}

#[tokio::test]
async fn failed_activation_reaches_the_remote_and_allows_retry() {
    init_logs();
    let harness = Harness::tracked("AT0");
    let mut critical = harness.host_critical.subscribe();
    harness.connect().await;
    let mut failures = harness.remote_gate.failures();

    harness.driver.fail_next_start.store(true, Ordering::SeqCst);
    harness.remote_gate.start_sampling();

    let failure = failures.next().await;
    assert_eq!(failure.uid, "AT0");
    assert!(matches!(
        critical.recv().await.unwrap(),
        CriticalError::FailedMajorCommand { .. }
    ));
    assert!(!harness.remote_gate.is_transceiving());
    assert_eq!(harness.driver.start_count(), 0);

    // the scripted fault was one-shot; a retry activates normally
    harness.remote_gate.start_sampling();
    wait_until("sampling echo after retry", || {
        harness.remote_gate.is_transceiving()
    })
    .await;
    assert_eq!(harness.driver.start_count(), 1);
}

#[tokio::test]
async fn commands_issued_before_the_session_are_dropped() {
    init_logs();
    let harness = Harness::tracked("AT0");
    harness.remote_gate.start_sampling();
    harness.connect().await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.driver.start_count(), 0);
    assert!(!harness.remote_gate.is_transceiving());
}
