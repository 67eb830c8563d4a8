use std::time::Duration;

use daqlink_shared::{ConnectionStatus, CriticalError, ReconnectError};
use daqlink_test::{wait_until, Harness};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test]
async fn peer_loss_raises_a_critical_error_and_reconnect_recovers() {
    init_logs();
    let harness = Harness::tracked("AT0");
    let mut critical = harness.remote_critical.subscribe();
    harness.connect().await;
    assert_eq!(harness.remote.status(), ConnectionStatus::Connected);

    harness.host_gate.offer(1.5);
    let mut values = harness.remote_gate.value_updates();
    assert_eq!(values.next().await, 1.5);

    // host goes away without the remote asking for it
    harness.host.connection().disconnect();
    assert!(matches!(
        critical.recv().await.unwrap(),
        CriticalError::TerminalConnectionDisruption { .. }
    ));
    wait_until("remote observes disconnection", || {
        harness.remote.status() == ConnectionStatus::Disconnected
    })
    .await;
    // the mirrored state outlives the session
    assert_eq!(harness.remote_gate.latest_value(), Some(1.5));

    let (served, reconnected) = tokio::join!(
        harness.host.serve(),
        harness.remote.reconnect(Duration::from_secs(2))
    );
    served.unwrap();
    reconnected.unwrap();
    assert_eq!(harness.remote.status(), ConnectionStatus::Connected);

    harness.host_gate.offer(2.5);
    wait_until("value after reconnect", || {
        harness.remote_gate.latest_value() == Some(2.5)
    })
    .await;
}

#[tokio::test]
async fn new_session_reannounces_the_latest_state() {
    init_logs();
    let harness = Harness::tracked("AT0");
    harness.connect().await;
    harness.host_gate.offer(5.0);
    wait_until("first sync", || harness.remote_gate.latest_value() == Some(5.0)).await;

    harness.remote.disconnect();
    let (served, reconnected) = tokio::join!(
        harness.host.serve(),
        harness.remote.reconnect(Duration::from_secs(2))
    );
    served.unwrap();
    reconnected.unwrap();

    // nothing was offered since; the fresh session replays the latest value
    let mut values = harness.remote_gate.value_updates();
    assert_eq!(values.next().await, 5.0);
}

#[tokio::test]
async fn reconnect_against_an_absent_peer_times_out() {
    init_logs();
    let harness = Harness::tracked("AT0");
    harness.connect().await;
    harness.remote.disconnect();
    let mut critical = harness.remote_critical.subscribe();

    let started = tokio::time::Instant::now();
    let err = harness
        .remote
        .reconnect(Duration::from_millis(300))
        .await
        .unwrap_err();
    assert_eq!(err, ReconnectError::TimedOut { timeout_millis: 300 });
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(harness.remote.status(), ConnectionStatus::ReconnectFailed);
    assert!(matches!(
        critical.recv().await.unwrap(),
        CriticalError::FailedToReinitialize { .. }
    ));
}
