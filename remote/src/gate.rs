use std::{sync::Arc, time::Instant};

use parking_lot::Mutex;

use daqlink_shared::{
    Codec, Conflated, ConflatedReceiver, ConfigError, ConnectionStatus, GateFailure, GatePaths,
    JsonCodec, RateTracker, RouteRegistry, Signal,
};

use crate::setting::ConfirmedSetting;

enum RateBehavior {
    /// Estimated locally as a running average over received values; explicit
    /// observations published by the host on `update_rate` take precedence
    /// (latest wins).
    Tracked {
        tracker: Mutex<RateTracker>,
        estimate: Conflated<f64>,
    },
    /// Commanded through a confirmed setting; the observable value moves
    /// only on the host's echo.
    Configured(ConfirmedSetting<f64>),
}

/// Remote-side mirror of one of the device's gates.
///
/// Commands issued here are translated to outbound Pings and do not flip
/// local state; the sampling-state projection changes only when the host
/// echoes `is_transceiving`. Cheap to clone; clones share the same gate.
pub struct RemoteGate<T> {
    inner: Arc<GateInner<T>>,
}

struct GateInner<T> {
    uid: String,
    paths: GatePaths,
    codec: Arc<dyn Codec<T>>,
    value: Conflated<T>,
    is_transceiving: Conflated<bool>,
    failure: Conflated<GateFailure>,
    start_sampling: Signal,
    stop_transceiving: Signal,
    rate: RateBehavior,
}

impl<T> Clone for RemoteGate<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> RemoteGate<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Mirrors a gate whose update rate is observed, not commanded.
    pub fn new(uid: &str, codec: impl Codec<T> + 'static) -> Self {
        Self::build(
            uid,
            codec,
            RateBehavior::Tracked {
                tracker: Mutex::new(RateTracker::new()),
                estimate: Conflated::new(),
            },
        )
    }

    /// Mirrors a gate with a commanded update rate. `status` is the owning
    /// connection's status slot (see `RemoteDeviceBuilder::status_slot`);
    /// `range`, when given, rejects out-of-range requests locally.
    pub fn with_configured_rate(
        uid: &str,
        codec: impl Codec<T> + 'static,
        status: Conflated<ConnectionStatus>,
        range: Option<(f64, f64)>,
    ) -> Self {
        Self::build(
            uid,
            codec,
            RateBehavior::Configured(ConfirmedSetting::new(status, range)),
        )
    }

    fn build(uid: &str, codec: impl Codec<T> + 'static, rate: RateBehavior) -> Self {
        Self {
            inner: Arc::new(GateInner {
                uid: uid.to_string(),
                paths: GatePaths::new(uid),
                codec: Arc::new(codec),
                value: Conflated::new(),
                is_transceiving: Conflated::new(),
                failure: Conflated::new(),
                start_sampling: Signal::new(),
                stop_transceiving: Signal::new(),
                rate,
            }),
        }
    }

    pub fn uid(&self) -> &str {
        &self.inner.uid
    }

    /// Stream of values received from the host. A fresh receiver first
    /// observes the latest value already mirrored, if any.
    pub fn value_updates(&self) -> ConflatedReceiver<T> {
        self.inner.value.subscribe()
    }

    pub fn latest_value(&self) -> Option<T> {
        self.inner.value.latest()
    }

    /// Requests sampling start. Sends a Ping; local state is untouched until
    /// the host echoes `is_transceiving`. Rapid repeats may conflate.
    pub fn start_sampling(&self) {
        self.inner.start_sampling.signal();
    }

    /// Requests sampling stop. Same command semantics as
    /// [`start_sampling`](RemoteGate::start_sampling).
    pub fn stop_transceiving(&self) {
        self.inner.stop_transceiving.signal();
    }

    /// The host's last echoed sampling-state projection.
    pub fn is_transceiving(&self) -> bool {
        self.inner.is_transceiving.latest().unwrap_or(false)
    }

    pub fn transceiving_updates(&self) -> ConflatedReceiver<bool> {
        self.inner.is_transceiving.subscribe()
    }

    /// Current update-rate estimate in Hz: the confirmed commanded rate, or
    /// the observed estimate for tracked gates.
    pub fn update_rate(&self) -> Option<f64> {
        match &self.inner.rate {
            RateBehavior::Tracked { estimate, .. } => estimate.latest(),
            RateBehavior::Configured(setting) => setting.value(),
        }
    }

    /// Handle for commanding the update rate. `None` for tracked-rate gates,
    /// whose rate is observed and cannot be set.
    pub fn update_rate_setting(&self) -> Option<ConfirmedSetting<f64>> {
        match &self.inner.rate {
            RateBehavior::Tracked { .. } => None,
            RateBehavior::Configured(setting) => Some(setting.clone()),
        }
    }

    /// Stream of fault notices raised on the host.
    pub fn failures(&self) -> ConflatedReceiver<GateFailure> {
        self.inner.failure.subscribe()
    }

    /// Binds this gate's routes into the remote-side registry.
    pub fn register_routes(&self, registry: &mut RouteRegistry) -> Result<(), ConfigError> {
        let paths = &self.inner.paths;

        {
            let inner = self.inner.clone();
            registry
                .route(paths.value.clone())?
                .receive_value(self.inner.codec.clone(), move |value: T| {
                    inner.value.offer(value);
                    if let RateBehavior::Tracked { tracker, estimate } = &inner.rate {
                        let mut tracker = tracker.lock();
                        tracker.observe(Instant::now());
                        if let Some(hz) = tracker.hz() {
                            estimate.offer(hz);
                        }
                    }
                });
        }

        registry
            .route(paths.start_sampling.clone())?
            .send_ping(&self.inner.start_sampling);
        registry
            .route(paths.stop_transceiving.clone())?
            .send_ping(&self.inner.stop_transceiving);

        {
            let slot = self.inner.is_transceiving.clone();
            registry
                .route(paths.is_transceiving.clone())?
                .receive_value(JsonCodec::new(), move |active: bool| slot.offer(active));
        }
        {
            let slot = self.inner.failure.clone();
            registry
                .route(paths.failure.clone())?
                .receive_value(JsonCodec::new(), move |failure: GateFailure| {
                    slot.offer(failure)
                });
        }

        let update_rate = registry.route(paths.update_rate.clone())?;
        match &self.inner.rate {
            RateBehavior::Tracked { estimate, .. } => {
                let estimate = estimate.clone();
                update_rate.receive_value(JsonCodec::new(), move |hz: f64| estimate.offer(hz));
            }
            RateBehavior::Configured(setting) => {
                let confirm = setting.clone();
                update_rate
                    .send_value(JsonCodec::new(), setting.request_slot())
                    .receive_value(JsonCodec::new(), move |hz: f64| confirm.confirm(hz));
            }
        }
        Ok(())
    }
}
