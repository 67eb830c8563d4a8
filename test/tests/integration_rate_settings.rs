use std::time::Duration;

use daqlink_shared::{SettingResult, UnviableReason};
use daqlink_test::{wait_until, Harness};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test]
async fn commanded_rate_follows_the_confirmation_cycle() {
    init_logs();
    let harness = Harness::configured("AT0", 10.0, None);
    harness.connect().await;
    let setting = harness.remote_gate.update_rate_setting().unwrap();
    wait_until("initial rate echo", || setting.value() == Some(10.0)).await;

    assert!(setting.set(25.0).is_viable());
    wait_until("confirmed rate", || setting.value() == Some(25.0)).await;
    assert_eq!(harness.remote_gate.update_rate(), Some(25.0));
    assert_eq!(harness.driver.applied_rates.lock().as_slice(), &[25.0]);
}

#[tokio::test]
async fn host_rejected_rate_leaves_the_confirmed_value_untouched() {
    init_logs();
    let harness = Harness::configured("AT0", 10.0, None);
    harness.connect().await;
    let setting = harness.remote_gate.update_rate_setting().unwrap();
    wait_until("initial rate echo", || setting.value() == Some(10.0)).await;
    let mut failures = harness.remote_gate.failures();

    // viable locally (no remote-side range), rejected by the hardware
    assert!(setting.set(500.0).is_viable());
    let failure = failures.next().await;
    assert_eq!(failure.uid, "AT0");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(setting.value(), Some(10.0));
    assert!(harness.driver.applied_rates.lock().is_empty());
}

#[tokio::test]
async fn remote_side_range_rejects_without_transmitting() {
    init_logs();
    let harness = Harness::configured("AT0", 10.0, Some((1.0, 100.0)));
    harness.connect().await;
    let setting = harness.remote_gate.update_rate_setting().unwrap();
    wait_until("initial rate echo", || setting.value() == Some(10.0)).await;

    assert_eq!(
        setting.set(500.0),
        SettingResult::Unviable(UnviableReason::SettingOutOfRange)
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(setting.value(), Some(10.0));
    assert!(harness.driver.applied_rates.lock().is_empty());
}

#[tokio::test]
async fn set_before_connecting_is_unviable() {
    init_logs();
    let harness = Harness::configured("AT0", 10.0, None);
    let setting = harness.remote_gate.update_rate_setting().unwrap();
    assert_eq!(
        setting.set(25.0),
        SettingResult::Unviable(UnviableReason::ConnectionUnavailable)
    );
}
