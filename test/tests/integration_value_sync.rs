use daqlink_shared::{transport::Transport, Path, WireFrame};
use daqlink_test::{remote_with_raw_peer, wait_until, Harness};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test]
async fn late_subscriber_observes_only_the_latest_value() {
    init_logs();
    let harness = Harness::tracked("AT0");

    // both offered before any session exists; the second supersedes the first
    harness.host_gate.offer(0.0);
    harness.host_gate.offer(5.0);
    harness.connect().await;

    let mut values = harness.remote_gate.value_updates();
    assert_eq!(values.next().await, 5.0);

    harness.host_gate.offer(7.5);
    assert_eq!(values.next().await, 7.5);
    assert_eq!(harness.remote_gate.latest_value(), Some(7.5));
}

#[tokio::test]
async fn multiple_remote_subscribers_observe_the_same_stream() {
    init_logs();
    let harness = Harness::tracked("AT0");
    harness.connect().await;

    let mut first = harness.remote_gate.value_updates();
    let mut second = harness.remote_gate.value_updates();
    harness.host_gate.offer(3.25);
    assert_eq!(first.next().await, 3.25);
    assert_eq!(second.next().await, 3.25);
}

#[tokio::test]
async fn decode_failure_on_one_frame_does_not_stop_the_session() {
    init_logs();
    let (remote, gate, raw_end) = remote_with_raw_peer("AT0");
    let (connected, peer) = tokio::join!(remote.connect(), raw_end.open());
    connected.unwrap();
    let mut peer = peer.unwrap();
    let mut errors = remote.message_errors().subscribe();

    let value_path = Path::new(["daqc_gate", "AT0", "value"]).unwrap();
    peer.sink
        .send(WireFrame::value(&value_path, b"certainly not json".to_vec()))
        .await
        .unwrap();
    peer.sink
        .send(WireFrame::value(&value_path, b"3.25".to_vec()))
        .await
        .unwrap();

    let mut values = gate.value_updates();
    assert_eq!(values.next().await, 3.25);

    let event = errors.recv().await.unwrap();
    assert_eq!(event.path, Some(value_path));
}

#[tokio::test]
async fn tracked_update_rate_becomes_observable_on_the_remote() {
    init_logs();
    let harness = Harness::tracked("AT0");
    harness.connect().await;

    for i in 0..5 {
        harness.host_gate.offer(f64::from(i));
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    wait_until("remote rate estimate", || {
        harness.remote_gate.update_rate().is_some()
    })
    .await;
}
