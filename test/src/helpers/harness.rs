use std::{sync::Arc, time::Duration};

use daqlink_host::{HostDevice, HostGate};
use daqlink_remote::{RemoteDevice, RemoteGate};
use daqlink_shared::{
    transport::channel::{link, ChannelTransport},
    CriticalErrorBus, JsonCodec,
};

use super::scripted_driver::ScriptedDriver;

/// A linked host/remote pair sharing one `f64` gate over the in-memory
/// transport.
pub struct Harness {
    pub host: HostDevice,
    pub remote: RemoteDevice,
    pub host_gate: HostGate<f64>,
    pub remote_gate: RemoteGate<f64>,
    pub driver: Arc<ScriptedDriver>,
    pub host_critical: CriticalErrorBus,
    pub remote_critical: CriticalErrorBus,
}

impl Harness {
    /// Gate with an observed (tracked) update rate.
    pub fn tracked(uid: &str) -> Self {
        Self::build(uid, None)
    }

    /// Gate with a commanded update rate, initialised to `initial_hz`.
    /// `remote_range`, when given, is enforced locally on the remote side.
    pub fn configured(uid: &str, initial_hz: f64, remote_range: Option<(f64, f64)>) -> Self {
        Self::build(uid, Some((initial_hz, remote_range)))
    }

    fn build(uid: &str, configured: Option<(f64, Option<(f64, f64)>)>) -> Self {
        let (host_end, remote_end) = link();
        let driver = Arc::new(ScriptedDriver::new());

        let host_critical = CriticalErrorBus::new();
        let host_gate = match &configured {
            None => HostGate::new(uid, JsonCodec::new(), driver.clone(), host_critical.clone()),
            Some((initial_hz, _)) => HostGate::with_configured_rate(
                uid,
                JsonCodec::new(),
                driver.clone(),
                *initial_hz,
                host_critical.clone(),
            ),
        };
        let host = HostDevice::builder(host_critical.clone())
            .add_gate(&host_gate)
            .unwrap()
            .build(Arc::new(host_end))
            .unwrap();

        let remote_critical = CriticalErrorBus::new();
        let builder = RemoteDevice::builder(remote_critical.clone());
        let remote_gate = match &configured {
            None => RemoteGate::new(uid, JsonCodec::new()),
            Some((_, range)) => RemoteGate::with_configured_rate(
                uid,
                JsonCodec::new(),
                builder.status_slot(),
                *range,
            ),
        };
        let remote = builder
            .add_gate(&remote_gate)
            .unwrap()
            .build(Arc::new(remote_end))
            .unwrap();

        Self {
            host,
            remote,
            host_gate,
            remote_gate,
            driver,
            host_critical,
            remote_critical,
        }
    }

    /// Brings both ends up; the in-memory transport rendezvouses in the
    /// middle.
    pub async fn connect(&self) {
        let (host, remote) = tokio::join!(self.host.serve(), self.remote.connect());
        host.expect("host serve");
        remote.expect("remote connect");
    }
}

/// A remote device wired to a raw transport end, for tests that need to
/// hand-craft host-side frames.
pub fn remote_with_raw_peer(uid: &str) -> (RemoteDevice, RemoteGate<f64>, ChannelTransport) {
    let (raw_end, remote_end) = link();
    let critical = CriticalErrorBus::new();
    let builder = RemoteDevice::builder(critical);
    let gate = RemoteGate::new(uid, JsonCodec::new());
    let remote = builder
        .add_gate(&gate)
        .unwrap()
        .build(Arc::new(remote_end))
        .unwrap();
    (remote, gate, raw_end)
}

/// Polls `condition` until it holds, failing the test after two seconds.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for: {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
